pub mod models;
pub mod msi;
pub mod probe;
pub mod registry;

use crate::modules::common::error::RemovalError;
use crate::modules::common::utils;
use models::RemovalEntry;

/// 枚举全部可卸载条目, 可选关键词过滤
pub fn list_removal_entries(search: Option<&str>) -> Result<Vec<RemovalEntry>, RemovalError> {
    let mut entries = registry::list_registry_entries()?;

    if let Some(keyword) = search {
        entries.retain(|e| utils::fuzzy_match(&e.name, keyword));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// 取名称最匹配的条目
pub fn find_best_match(entries: &[RemovalEntry], target: &str) -> Option<RemovalEntry> {
    entries
        .iter()
        .map(|e| (utils::fuzzy_score(&e.name, target), e))
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, e)| e.clone())
}
