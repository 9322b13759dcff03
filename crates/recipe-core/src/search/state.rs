use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use ts_rs::TS;

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SORT_FIELD: &str = "relevance";

const CACHE_KEY_REV: &str = "recipe-search-v1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TagKind {
    #[default]
    Ingredient,
    Seasoning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub text: String,
    pub kind: TagKind,
}

impl Tag {
    pub fn new(text: impl Into<String>, kind: TagKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into().trim().to_string(),
            kind,
        }
    }

    pub fn ingredient(text: impl Into<String>) -> Self {
        Self::new(text, TagKind::Ingredient)
    }

    pub fn seasoning(text: impl Into<String>) -> Self {
        Self::new(text, TagKind::Seasoning)
    }

    fn same_text(&self, text: &str) -> bool {
        self.text.to_lowercase() == text.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, TS)]
#[ts(export)]
pub enum TagLogic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl TagLogic {
    pub fn as_param(self) -> &'static str {
        match self {
            TagLogic::And => "AND",
            TagLogic::Or => "OR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(TagLogic::And),
            "OR" => Some(TagLogic::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_param(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Single-select filter categories.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FilterCategory {
    Cuisine,
    Flavor,
    Difficulty,
    Dietary,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 4] = [
        FilterCategory::Cuisine,
        FilterCategory::Flavor,
        FilterCategory::Difficulty,
        FilterCategory::Dietary,
    ];

    pub fn param_name(self) -> &'static str {
        match self {
            FilterCategory::Cuisine => "cuisine",
            FilterCategory::Flavor => "flavor",
            FilterCategory::Difficulty => "difficulty",
            FilterCategory::Dietary => "dietary",
        }
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.param_name())
    }
}

/// `(category, value)` pair in the derived applied-filter set.
pub type AppliedFilter = (FilterCategory, String);

/// The searchable subset of [`SearchState`]: tag texts instead of tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
pub struct SearchFilters {
    pub query: String,
    pub required_ingredients: Vec<String>,
    pub optional_ingredients: Vec<String>,
    pub avoid_ingredients: Vec<String>,
    pub cuisines: Vec<String>,
    pub flavors: Vec<String>,
    pub difficulties: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub tag_logic: TagLogic,
    pub page: u32,
    pub limit: u32,
    pub sort_field: String,
    pub sort_direction: SortDirection,
}

impl Default for SearchFilters {
    fn default() -> Self {
        SearchState::default().filters()
    }
}

impl SearchFilters {
    pub fn category(&self, category: FilterCategory) -> &[String] {
        match category {
            FilterCategory::Cuisine => &self.cuisines,
            FilterCategory::Flavor => &self.flavors,
            FilterCategory::Difficulty => &self.difficulties,
            FilterCategory::Dietary => &self.dietary_restrictions,
        }
    }

    /// Stable digest of every field. Two filter sets share a key iff they
    /// would produce the same request.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_KEY_REV.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.query.as_bytes());
        hasher.update([0u8]);
        let lists: [&[String]; 7] = [
            &self.required_ingredients,
            &self.optional_ingredients,
            &self.avoid_ingredients,
            &self.cuisines,
            &self.flavors,
            &self.difficulties,
            &self.dietary_restrictions,
        ];
        for list in lists {
            hasher.update((list.len() as u64).to_le_bytes());
            for value in list {
                hasher.update(value.as_bytes());
                hasher.update([0u8]);
            }
        }
        hasher.update(self.tag_logic.as_param().as_bytes());
        hasher.update(self.page.to_le_bytes());
        hasher.update(self.limit.to_le_bytes());
        hasher.update(self.sort_field.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.sort_direction.as_param().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Canonical filter, pagination, and sort state of one search surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub search_query: String,
    pub required_ingredients: Vec<Tag>,
    pub optional_ingredients: Vec<Tag>,
    pub avoid_ingredients: Vec<Tag>,
    pub cuisines: Vec<String>,
    pub flavors: Vec<String>,
    pub difficulties: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub tag_logic: TagLogic,
    pub page: u32,
    pub limit: u32,
    pub sort_field: String,
    pub sort_direction: SortDirection,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            required_ingredients: Vec::new(),
            optional_ingredients: Vec::new(),
            avoid_ingredients: Vec::new(),
            cuisines: Vec::new(),
            flavors: Vec::new(),
            difficulties: Vec::new(),
            dietary_restrictions: Vec::new(),
            tag_logic: TagLogic::And,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_direction: SortDirection::Desc,
        }
    }
}

impl SearchState {
    /// Rebuild state from a filter snapshot. Tags get fresh ids; duplicates
    /// and required/optional collisions are dropped the same way the add
    /// operations drop them.
    /// Tags are rebuilt from their texts with fresh ids and
    /// [`TagKind::Ingredient`], since [`SearchFilters`] carries text only.
    /// Use [`SearchState::adopt_filters`] to keep existing tags.
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let mut state = Self {
            search_query: filters.query.clone(),
            tag_logic: filters.tag_logic,
            page: filters.page.max(1),
            limit: filters.limit.clamp(1, MAX_PAGE_SIZE),
            sort_field: if filters.sort_field.trim().is_empty() {
                DEFAULT_SORT_FIELD.to_string()
            } else {
                filters.sort_field.clone()
            },
            sort_direction: filters.sort_direction,
            ..Self::default()
        };
        for text in &filters.required_ingredients {
            state.add_required_ingredient(Tag::ingredient(text.as_str()));
        }
        for text in &filters.optional_ingredients {
            state.add_optional_ingredient(Tag::ingredient(text.as_str()));
        }
        for text in &filters.avoid_ingredients {
            state.add_avoid_ingredient(Tag::ingredient(text.as_str()));
        }
        for category in FilterCategory::ALL {
            let selection = state.category_mut(category);
            for value in filters.category(category) {
                let value = value.trim();
                if !value.is_empty() && !selection.iter().any(|v| v == value) {
                    selection.push(value.to_string());
                }
            }
        }
        state
    }

    /// Like [`SearchState::from_filters`], but a tag whose text is already in
    /// the same list here keeps its id and kind.
    pub fn adopt_filters(&self, filters: &SearchFilters) -> Self {
        let mut next = Self::from_filters(filters);
        for (tags, previous) in [
            (&mut next.required_ingredients, &self.required_ingredients),
            (&mut next.optional_ingredients, &self.optional_ingredients),
            (&mut next.avoid_ingredients, &self.avoid_ingredients),
        ] {
            for tag in tags.iter_mut() {
                if let Some(known) = previous.iter().find(|known| known.same_text(&tag.text)) {
                    *tag = known.clone();
                }
            }
        }
        next
    }

    pub fn filters(&self) -> SearchFilters {
        let texts = |tags: &[Tag]| tags.iter().map(|tag| tag.text.clone()).collect();
        SearchFilters {
            query: self.search_query.clone(),
            required_ingredients: texts(&self.required_ingredients),
            optional_ingredients: texts(&self.optional_ingredients),
            avoid_ingredients: texts(&self.avoid_ingredients),
            cuisines: self.cuisines.clone(),
            flavors: self.flavors.clone(),
            difficulties: self.difficulties.clone(),
            dietary_restrictions: self.dietary_restrictions.clone(),
            tag_logic: self.tag_logic,
            page: self.page,
            limit: self.limit,
            sort_field: self.sort_field.clone(),
            sort_direction: self.sort_direction,
        }
    }

    pub fn category(&self, category: FilterCategory) -> &[String] {
        match category {
            FilterCategory::Cuisine => &self.cuisines,
            FilterCategory::Flavor => &self.flavors,
            FilterCategory::Difficulty => &self.difficulties,
            FilterCategory::Dietary => &self.dietary_restrictions,
        }
    }

    fn category_mut(&mut self, category: FilterCategory) -> &mut Vec<String> {
        match category {
            FilterCategory::Cuisine => &mut self.cuisines,
            FilterCategory::Flavor => &mut self.flavors,
            FilterCategory::Difficulty => &mut self.difficulties,
            FilterCategory::Dietary => &mut self.dietary_restrictions,
        }
    }

    fn in_required_or_optional(&self, text: &str) -> bool {
        self.required_ingredients
            .iter()
            .chain(self.optional_ingredients.iter())
            .any(|tag| tag.same_text(text))
    }

    /// Returns false when the text is empty or already required or optional.
    pub fn add_required_ingredient(&mut self, tag: Tag) -> bool {
        if tag.text.is_empty() || self.in_required_or_optional(&tag.text) {
            return false;
        }
        self.required_ingredients.push(tag);
        true
    }

    pub fn add_optional_ingredient(&mut self, tag: Tag) -> bool {
        if tag.text.is_empty() || self.in_required_or_optional(&tag.text) {
            return false;
        }
        self.optional_ingredients.push(tag);
        true
    }

    pub fn add_avoid_ingredient(&mut self, tag: Tag) -> bool {
        if tag.text.is_empty()
            || self
                .avoid_ingredients
                .iter()
                .any(|existing| existing.same_text(&tag.text))
        {
            return false;
        }
        self.avoid_ingredients.push(tag);
        true
    }

    pub fn remove_required_ingredient(&mut self, id: &str) -> bool {
        remove_by_id(&mut self.required_ingredients, id)
    }

    pub fn remove_optional_ingredient(&mut self, id: &str) -> bool {
        remove_by_id(&mut self.optional_ingredients, id)
    }

    pub fn remove_avoid_ingredient(&mut self, id: &str) -> bool {
        remove_by_id(&mut self.avoid_ingredients, id)
    }

    /// Single-select toggle: the selected value deselects, any other value
    /// replaces the category's whole selection. Returns whether `value` is
    /// selected afterwards.
    pub fn toggle_filter(&mut self, category: FilterCategory, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let selection = self.category_mut(category);
        if selection.iter().any(|selected| selected == value) {
            selection.clear();
            false
        } else {
            selection.clear();
            selection.push(value.to_string());
            true
        }
    }

    pub fn applied_filters(&self) -> BTreeSet<AppliedFilter> {
        FilterCategory::ALL
            .into_iter()
            .flat_map(|category| {
                self.category(category)
                    .iter()
                    .map(move |value| (category, value.clone()))
            })
            .collect()
    }

    /// Reset query, tags, categories, logic and page. Page size and sort
    /// survive.
    pub fn clear_filters(&mut self) {
        *self = Self {
            limit: self.limit,
            sort_field: std::mem::take(&mut self.sort_field),
            sort_direction: self.sort_direction,
            ..Self::default()
        };
    }
}

fn remove_by_id(tags: &mut Vec<Tag>, id: &str) -> bool {
    let before = tags.len();
    tags.retain(|tag| tag.id != id);
    tags.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_is_single_select_per_category() {
        let mut state = SearchState::default();
        assert!(state.cuisines.is_empty());

        assert!(state.toggle_filter(FilterCategory::Cuisine, "sichuan"));
        assert_eq!(state.cuisines, vec!["sichuan".to_string()]);

        assert!(!state.toggle_filter(FilterCategory::Cuisine, "sichuan"));
        assert!(state.cuisines.is_empty());

        state.toggle_filter(FilterCategory::Cuisine, "sichuan");
        state.toggle_filter(FilterCategory::Cuisine, "cantonese");
        assert_eq!(state.cuisines, vec!["cantonese".to_string()]);
    }

    #[test]
    fn toggling_one_category_leaves_the_others_alone() {
        let mut state = SearchState::default();
        state.toggle_filter(FilterCategory::Flavor, "spicy");
        state.toggle_filter(FilterCategory::Difficulty, "easy");
        state.toggle_filter(FilterCategory::Flavor, "sweet");

        assert_eq!(state.flavors, vec!["sweet".to_string()]);
        assert_eq!(state.difficulties, vec!["easy".to_string()]);
        assert_eq!(
            state.applied_filters().into_iter().collect::<Vec<_>>(),
            vec![
                (FilterCategory::Flavor, "sweet".to_string()),
                (FilterCategory::Difficulty, "easy".to_string()),
            ]
        );
    }

    #[test]
    fn required_and_optional_reject_case_insensitive_duplicates() {
        let mut state = SearchState::default();
        assert!(state.add_required_ingredient(Tag::ingredient("Garlic")));
        assert!(!state.add_required_ingredient(Tag::ingredient("garlic")));
        assert!(!state.add_optional_ingredient(Tag::seasoning("GARLIC ")));
        assert!(state.add_optional_ingredient(Tag::seasoning("ginger")));
        assert!(!state.add_required_ingredient(Tag::ingredient("Ginger")));
        assert!(!state.add_required_ingredient(Tag::ingredient("   ")));

        assert_eq!(state.required_ingredients.len(), 1);
        assert_eq!(state.optional_ingredients.len(), 1);
    }

    #[test]
    fn avoid_list_only_deduplicates_against_itself() {
        let mut state = SearchState::default();
        state.add_required_ingredient(Tag::ingredient("pork"));
        assert!(state.add_avoid_ingredient(Tag::ingredient("Pork")));
        assert!(!state.add_avoid_ingredient(Tag::ingredient("pork")));
    }

    #[test]
    fn removal_is_by_identity_not_text() {
        let mut state = SearchState::default();
        let tofu = Tag::ingredient("tofu");
        let tofu_id = tofu.id.clone();
        state.add_required_ingredient(tofu);

        assert!(!state.remove_required_ingredient("tofu"));
        assert!(!state.remove_optional_ingredient(&tofu_id));
        assert!(state.remove_required_ingredient(&tofu_id));
        assert!(state.required_ingredients.is_empty());
    }

    #[test]
    fn cache_key_changes_with_any_single_field() {
        let base = SearchState::default().filters();
        let key = base.cache_key();
        assert_eq!(key, SearchState::default().filters().cache_key());

        let mut changed = base.clone();
        changed.page = 2;
        assert_ne!(changed.cache_key(), key);

        let mut changed = base.clone();
        changed.cuisines.push("hunan".to_string());
        assert_ne!(changed.cache_key(), key);

        let mut changed = base.clone();
        changed.tag_logic = TagLogic::Or;
        assert_ne!(changed.cache_key(), key);

        let mut moved = base.clone();
        moved.required_ingredients.push("egg".to_string());
        let mut other = base.clone();
        other.optional_ingredients.push("egg".to_string());
        assert_ne!(moved.cache_key(), other.cache_key());
    }

    #[test]
    fn from_filters_enforces_tag_invariants() {
        let filters = SearchFilters {
            required_ingredients: vec!["Beef".to_string(), "beef".to_string()],
            optional_ingredients: vec!["BEEF".to_string(), "scallion".to_string()],
            page: 0,
            limit: 1000,
            ..SearchFilters::default()
        };

        let state = SearchState::from_filters(&filters);

        assert_eq!(state.required_ingredients.len(), 1);
        assert_eq!(state.optional_ingredients.len(), 1);
        assert_eq!(state.optional_ingredients[0].text, "scallion");
        assert_eq!(state.page, 1);
        assert_eq!(state.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn adopting_filters_keeps_known_tags() {
        let mut state = SearchState::default();
        let pepper = Tag::seasoning("Sichuan pepper");
        state.add_optional_ingredient(pepper.clone());
        state.add_avoid_ingredient(Tag::ingredient("peanuts"));

        let mut filters = state.filters();
        filters.optional_ingredients.push("star anise".to_string());
        filters.avoid_ingredients.clear();
        let next = state.adopt_filters(&filters);

        assert_eq!(next.optional_ingredients[0], pepper);
        assert_eq!(next.optional_ingredients[1].text, "star anise");
        assert_eq!(next.optional_ingredients[1].kind, TagKind::Ingredient);
        assert!(next.avoid_ingredients.is_empty());
        assert_eq!(
            SearchState::from_filters(&filters).optional_ingredients[0].kind,
            TagKind::Ingredient
        );
    }

    #[test]
    fn clear_filters_keeps_page_size_and_sort() {
        let mut state = SearchState::default();
        state.search_query = "noodles".to_string();
        state.add_required_ingredient(Tag::ingredient("egg"));
        state.toggle_filter(FilterCategory::Dietary, "vegetarian");
        state.page = 4;
        state.limit = 24;
        state.sort_field = "rating".to_string();
        state.sort_direction = SortDirection::Asc;

        state.clear_filters();

        assert!(state.search_query.is_empty());
        assert!(state.required_ingredients.is_empty());
        assert!(state.applied_filters().is_empty());
        assert_eq!(state.page, 1);
        assert_eq!(state.limit, 24);
        assert_eq!(state.sort_field, "rating");
        assert_eq!(state.sort_direction, SortDirection::Asc);
    }
}
