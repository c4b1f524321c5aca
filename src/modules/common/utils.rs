use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// 模糊匹配字符串
pub fn fuzzy_match(text: &str, pattern: &str) -> bool {
    let matcher = SkimMatcherV2::default();
    matcher.fuzzy_match(text, pattern).is_some()
}

/// 获取模糊匹配分数
pub fn fuzzy_score(text: &str, pattern: &str) -> i64 {
    let matcher = SkimMatcherV2::default();
    matcher.fuzzy_match(text, pattern).unwrap_or(0)
}

/// 大小写不敏感的包含判断
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// 解析注册表路径
#[cfg(windows)]
pub fn parse_registry_path(path: &str) -> Option<(winreg::HKEY, &str)> {
    use winreg::enums::*;

    let path = path.trim();

    if let Some(rest) = path
        .strip_prefix("HKLM\\")
        .or_else(|| path.strip_prefix("HKEY_LOCAL_MACHINE\\"))
    {
        Some((HKEY_LOCAL_MACHINE, rest))
    } else if let Some(rest) = path
        .strip_prefix("HKCU\\")
        .or_else(|| path.strip_prefix("HKEY_CURRENT_USER\\"))
    {
        Some((HKEY_CURRENT_USER, rest))
    } else if let Some(rest) = path
        .strip_prefix("HKCR\\")
        .or_else(|| path.strip_prefix("HKEY_CLASSES_ROOT\\"))
    {
        Some((HKEY_CLASSES_ROOT, rest))
    } else if let Some(rest) = path
        .strip_prefix("HKU\\")
        .or_else(|| path.strip_prefix("HKEY_USERS\\"))
    {
        Some((HKEY_USERS, rest))
    } else {
        None
    }
}
