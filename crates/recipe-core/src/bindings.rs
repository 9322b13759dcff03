use crate::bus::{ExecuteSearchEvent, SearchSettledEvent};
use crate::search::{FilterCategory, SearchFilters, SortDirection, TagKind, TagLogic};
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Regenerate the TypeScript view of every bus payload into `out_dir`.
/// Stale `.ts` files are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<SearchFilters>(out_dir)?;
    export_single_type::<TagLogic>(out_dir)?;
    export_single_type::<SortDirection>(out_dir)?;
    export_single_type::<TagKind>(out_dir)?;
    export_single_type::<FilterCategory>(out_dir)?;
    export_single_type::<ExecuteSearchEvent>(out_dir)?;
    export_single_type::<SearchSettledEvent>(out_dir)?;

    let index_content = r#"export type { SearchFilters } from "./SearchFilters";
export type { TagLogic } from "./TagLogic";
export type { SortDirection } from "./SortDirection";
export type { TagKind } from "./TagKind";
export type { FilterCategory } from "./FilterCategory";
export type { ExecuteSearchEvent } from "./ExecuteSearchEvent";
export type { SearchSettledEvent } from "./SearchSettledEvent";
"#;

    fs::write(out_dir.join("index.ts"), index_content).map_err(|err| {
        format!(
            "Failed to write {}: {err}",
            out_dir.join("index.ts").display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_every_bus_payload() {
        let out_dir =
            std::env::temp_dir().join(format!("recipe-finder-bindings-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&out_dir).expect("temp dir should be creatable");
        fs::write(out_dir.join("Stale.ts"), "export {}").expect("stale file should be writable");

        export_ts_bindings(&out_dir).expect("bindings should export");

        assert!(!out_dir.join("Stale.ts").exists());
        for name in [
            "index.ts",
            "SearchFilters.ts",
            "ExecuteSearchEvent.ts",
            "SearchSettledEvent.ts",
        ] {
            assert!(out_dir.join(name).exists(), "missing {name}");
        }
        let settled = fs::read_to_string(out_dir.join("SearchSettledEvent.ts"))
            .expect("settled binding should be readable");
        assert!(settled.contains("request_id: number"));
        let _ = fs::remove_dir_all(&out_dir);
    }
}
