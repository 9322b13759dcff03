//! Query-string codec for [`SearchFilters`].
//!
//! The location form omits defaults so a fresh search surface has an empty
//! query string. The request form always carries paging and sort.

use super::state::{
    DEFAULT_SORT_FIELD, FilterCategory, MAX_PAGE_SIZE, SearchFilters, SortDirection, TagLogic,
};
use url::form_urlencoded;

pub const PARAM_QUERY: &str = "q";
pub const PARAM_REQUIRED: &str = "requiredIngredient";
pub const PARAM_OPTIONAL: &str = "optionalIngredient";
pub const PARAM_AVOID: &str = "avoid";
pub const PARAM_TAG_LOGIC: &str = "tagLogic";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_SORT_FIELD: &str = "sortField";
pub const PARAM_SORT_DIRECTION: &str = "sortDirection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    /// Shareable location: defaults omitted, page size never written.
    Location,
    /// Outbound HTTP request: every paging and sort field written.
    Request,
}

pub fn to_query_string(filters: &SearchFilters, scope: QueryScope) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    let full = scope == QueryScope::Request;

    let query = filters.query.trim();
    if !query.is_empty() {
        out.append_pair(PARAM_QUERY, query);
    }
    for (key, values) in [
        (PARAM_REQUIRED, &filters.required_ingredients),
        (PARAM_OPTIONAL, &filters.optional_ingredients),
        (PARAM_AVOID, &filters.avoid_ingredients),
    ] {
        for value in values {
            out.append_pair(key, value);
        }
    }
    for category in FilterCategory::ALL {
        for value in filters.category(category) {
            out.append_pair(category.param_name(), value);
        }
    }
    if full || filters.tag_logic != TagLogic::default() {
        out.append_pair(PARAM_TAG_LOGIC, filters.tag_logic.as_param());
    }
    if full || filters.page > 1 {
        out.append_pair(PARAM_PAGE, &filters.page.max(1).to_string());
    }
    if full {
        out.append_pair(PARAM_LIMIT, &filters.limit.to_string());
    }
    if full || filters.sort_field != DEFAULT_SORT_FIELD {
        out.append_pair(PARAM_SORT_FIELD, &filters.sort_field);
    }
    if full || filters.sort_direction != SortDirection::default() {
        out.append_pair(PARAM_SORT_DIRECTION, filters.sort_direction.as_param());
    }
    out.finish()
}

/// Parse a query string (leading `?` optional). Unknown keys and values
/// that fail to parse are ignored and leave the default in place.
pub fn from_query_string(raw: &str) -> SearchFilters {
    merge_query_string(SearchFilters::default(), raw)
}

/// Like [`from_query_string`] but layered over `filters`. Scalars in the query
/// replace its values and list parameters append to its lists.
pub fn merge_query_string(mut filters: SearchFilters, raw: &str) -> SearchFilters {
    let raw = raw.trim().trim_start_matches('?');

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            PARAM_QUERY => filters.query = value.to_string(),
            PARAM_REQUIRED => filters.required_ingredients.push(value.to_string()),
            PARAM_OPTIONAL => filters.optional_ingredients.push(value.to_string()),
            PARAM_AVOID => filters.avoid_ingredients.push(value.to_string()),
            "cuisine" => filters.cuisines.push(value.to_string()),
            "flavor" => filters.flavors.push(value.to_string()),
            "difficulty" => filters.difficulties.push(value.to_string()),
            "dietary" => filters.dietary_restrictions.push(value.to_string()),
            PARAM_TAG_LOGIC => {
                if let Some(logic) = TagLogic::parse(value) {
                    filters.tag_logic = logic;
                }
            }
            PARAM_PAGE => {
                if let Ok(page) = value.parse::<u32>() {
                    filters.page = page.max(1);
                }
            }
            PARAM_LIMIT => {
                if let Ok(limit) = value.parse::<u32>() {
                    filters.limit = limit.clamp(1, MAX_PAGE_SIZE);
                }
            }
            PARAM_SORT_FIELD => filters.sort_field = value.to_string(),
            PARAM_SORT_DIRECTION => {
                if let Some(direction) = SortDirection::parse(value) {
                    filters.sort_direction = direction;
                }
            }
            _ => {}
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::state::{SearchState, Tag};

    #[test]
    fn default_filters_produce_an_empty_location() {
        assert_eq!(
            to_query_string(&SearchFilters::default(), QueryScope::Location),
            ""
        );
    }

    #[test]
    fn request_scope_always_carries_paging_and_sort() {
        let encoded = to_query_string(&SearchFilters::default(), QueryScope::Request);
        assert_eq!(
            encoded,
            "tagLogic=AND&page=1&limit=12&sortField=relevance&sortDirection=desc"
        );
    }

    #[test]
    fn location_round_trips_the_searchable_subset() {
        let mut state = SearchState::default();
        state.search_query = "mapo tofu & rice".to_string();
        state.add_required_ingredient(Tag::ingredient("tofu"));
        state.add_required_ingredient(Tag::ingredient("chili bean paste"));
        state.add_optional_ingredient(Tag::seasoning("sichuan pepper"));
        state.add_avoid_ingredient(Tag::ingredient("peanuts"));
        state.toggle_filter(FilterCategory::Cuisine, "sichuan");
        state.toggle_filter(FilterCategory::Dietary, "vegetarian");
        state.tag_logic = TagLogic::Or;
        state.page = 3;
        state.sort_field = "rating".to_string();
        state.sort_direction = SortDirection::Asc;
        let filters = state.filters();

        let encoded = to_query_string(&filters, QueryScope::Location);
        let decoded = from_query_string(&format!("?{encoded}"));

        assert_eq!(decoded, filters);
        assert_eq!(SearchState::from_filters(&decoded).filters(), filters);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let decoded = from_query_string(
            "page=zero&tagLogic=XOR&sortDirection=sideways&limit=-4&unknown=1&cuisine=",
        );
        assert_eq!(decoded, SearchFilters::default());
    }

    #[test]
    fn merge_keeps_base_values_the_query_does_not_mention() {
        let base = SearchFilters {
            limit: 30,
            cuisines: vec!["thai".to_string()],
            ..SearchFilters::default()
        };
        let merged = merge_query_string(base, "q=curry&flavor=spicy&page=2");
        assert_eq!(merged.query, "curry");
        assert_eq!(merged.page, 2);
        assert_eq!(merged.limit, 30);
        assert_eq!(merged.cuisines, vec!["thai".to_string()]);
        assert_eq!(merged.flavors, vec!["spicy".to_string()]);
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let decoded = from_query_string("page=0&limit=5000&tagLogic=or");
        assert_eq!(decoded.page, 1);
        assert_eq!(decoded.limit, MAX_PAGE_SIZE);
        assert_eq!(decoded.tag_logic, TagLogic::Or);
    }
}
