use crate::error::StoreError;
use crate::results::{ItemDetail, ItemSummary};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a JSON array of records
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write records as a pretty-printed JSON array.
///
/// The file is replaced in one rename, so an interrupted run never leaves a
/// truncated dataset behind.
pub fn save_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let staging = staging_path(path);
    fs::write(&staging, json).map_err(io_error)?;
    fs::rename(&staging, path).map_err(io_error)?;

    ::log::debug!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Drop records whose link was already seen, keeping the first
pub fn dedup_by_link(items: Vec<ItemSummary>) -> Vec<ItemSummary> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.link.clone()))
        .collect()
}

/// Summaries that have no detail record yet
pub fn missing_items(summaries: &[ItemSummary], details: &[ItemDetail]) -> Vec<ItemSummary> {
    let done: HashSet<_> = details.iter().map(|detail| &detail.summary.link).collect();
    summaries
        .iter()
        .filter(|summary| !done.contains(&summary.link))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Section, SectionValue, Sections};
    use url::Url;

    fn summary(title: &str, link: &str) -> ItemSummary {
        ItemSummary {
            title: title.to_string(),
            short_description: "No description found".to_string(),
            link: Url::parse(link).unwrap(),
            page_found: 1,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scheme-crawl-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_then_load_details() {
        let dir = scratch_dir("details");
        let path = dir.join("nested").join("complete_details.json");

        let mut sections = Sections::new();
        sections.set(Section::Benefits, SectionValue::Text("Rs 6000".to_string()));
        let details = vec![ItemDetail::new(summary("A", "https://x.org/schemes/a"), sections)];

        save_json(&path, &details).unwrap();
        assert!(!staging_path(&path).exists());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"benefits\": \"Rs 6000\""));
        assert!(raw.contains("\"eligibility\": \"Section not found\""));

        let loaded: Vec<ItemDetail> = load_json(&path).unwrap();
        assert_eq!(loaded, details);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_reports_path() {
        let dir = scratch_dir("broken");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("links.json");
        fs::write(&path, "[{").unwrap();

        let err = load_json::<ItemSummary>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        assert!(err.to_string().contains("links.json"));

        let missing = load_json::<ItemSummary>(&dir.join("absent.json")).unwrap_err();
        assert!(matches!(missing, StoreError::Io { .. }));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_dedup_keeps_first() {
        let items = dedup_by_link(vec![
            summary("A", "https://x.org/schemes/a"),
            summary("B", "https://x.org/schemes/b"),
            summary("A again", "https://x.org/schemes/a"),
        ]);
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_missing_items() {
        let summaries = vec![
            summary("A", "https://x.org/schemes/a"),
            summary("B", "https://x.org/schemes/b"),
        ];
        let details = vec![ItemDetail::new(summaries[0].clone(), Sections::new())];

        let missing = missing_items(&summaries, &details);
        assert_eq!(missing, vec![summaries[1].clone()]);
    }
}
