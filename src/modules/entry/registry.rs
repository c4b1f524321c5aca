use crate::modules::common::error::RemovalError;

use super::models::RemovalEntry;

/// 从注册表枚举可卸载条目
pub fn list_registry_entries() -> Result<Vec<RemovalEntry>, RemovalError> {
    #[cfg(windows)]
    {
        list_registry_entries_impl()
    }

    #[cfg(not(windows))]
    {
        Ok(Vec::new())
    }
}

/// 卸载注册表项是否仍然存在
pub fn uninstall_key_exists(key_path: &str) -> bool {
    #[cfg(windows)]
    {
        uninstall_key_exists_impl(key_path)
    }

    #[cfg(not(windows))]
    {
        let _ = key_path;
        false
    }
}

#[cfg(windows)]
fn list_registry_entries_impl() -> Result<Vec<RemovalEntry>, RemovalError> {
    use winreg::enums::*;
    use winreg::RegKey;

    let mut entries = Vec::new();

    // 注册表路径列表
    let paths = [
        (
            "HKLM",
            HKEY_LOCAL_MACHINE,
            r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
        ),
        (
            "HKLM",
            HKEY_LOCAL_MACHINE,
            r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
        ),
        (
            "HKCU",
            HKEY_CURRENT_USER,
            r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
        ),
    ];

    for (root_name, hkey, path) in &paths {
        match RegKey::predef(*hkey).open_subkey(path) {
            Ok(key) => {
                for name in key.enum_keys().filter_map(|k| k.ok()) {
                    if let Ok(subkey) = key.open_subkey(&name) {
                        if is_system_component(&subkey) {
                            continue;
                        }
                        let key_path = format!("{}\\{}\\{}", root_name, path, name);
                        if let Some(entry) = parse_uninstall_entry(key_path, &name, &subkey) {
                            entries.push(entry);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!("无法打开注册表路径 {}: {}", path, e);
            }
        }
    }

    Ok(entries)
}

/// 解析单个卸载注册表项
#[cfg(windows)]
fn parse_uninstall_entry(
    key_path: String,
    key_name: &str,
    subkey: &winreg::RegKey,
) -> Option<RemovalEntry> {
    use super::models::{detect_kind, extract_product_code, UninstallerKind};

    // 必须有 DisplayName
    let name: String = subkey.get_value("DisplayName").ok()?;

    // 跳过以 KB 开头的补丁
    if name.starts_with("KB") || name.to_lowercase().contains("security update") {
        return None;
    }

    let uninstall_string: Option<String> = subkey.get_value("UninstallString").ok();
    let quiet_uninstall_string: Option<String> = subkey.get_value("QuietUninstallString").ok();
    let windows_installer: u32 = subkey.get_value("WindowsInstaller").unwrap_or(0);

    let kind = detect_kind(uninstall_string.as_deref(), windows_installer == 1);

    // 产品码优先取自卸载命令, MSI 条目的注册表键名本身就是 GUID
    let product_code = uninstall_string
        .as_deref()
        .and_then(extract_product_code)
        .or_else(|| extract_product_code(key_name));

    let mut entry = RemovalEntry::new(name, kind);
    entry.publisher = subkey.get_value("Publisher").ok();
    entry.version = subkey.get_value("DisplayVersion").ok();
    entry.install_location = subkey
        .get_value::<String, _>("InstallLocation")
        .ok()
        .filter(|loc| !loc.trim().is_empty());
    entry.registry_key = Some(key_path);
    entry.quiet_supported = quiet_uninstall_string.is_some()
        || matches!(
            kind,
            UninstallerKind::Msi | UninstallerKind::Nsis | UninstallerKind::InnoSetup
        );
    entry.uninstall_string = uninstall_string;
    entry.quiet_uninstall_string = quiet_uninstall_string;
    entry.product_code = product_code;

    Some(entry)
}

/// 跳过系统组件和更新
#[cfg(windows)]
fn is_system_component(subkey: &winreg::RegKey) -> bool {
    let system_component: u32 = subkey.get_value("SystemComponent").unwrap_or(0);
    if system_component == 1 {
        return true;
    }
    subkey.get_value::<String, _>("ParentKeyName").is_ok()
}

#[cfg(windows)]
fn uninstall_key_exists_impl(key_path: &str) -> bool {
    use crate::modules::common::utils;
    use winreg::RegKey;

    let Some((root, subpath)) = utils::parse_registry_path(key_path) else {
        tracing::debug!("无法解析注册表路径: {}", key_path);
        return false;
    };

    RegKey::predef(root).open_subkey(subpath).is_ok()
}
