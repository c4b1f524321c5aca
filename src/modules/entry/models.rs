use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 卸载器类型, 决定退出码解释与安装服务监控规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UninstallerKind {
    /// 普通卸载程序
    Generic,
    /// Windows Installer (msiexec)
    Msi,
    /// NSIS 卸载器
    Nsis,
    /// Inno Setup 卸载器
    InnoSetup,
}

impl Default for UninstallerKind {
    fn default() -> Self {
        UninstallerKind::Generic
    }
}

impl std::fmt::Display for UninstallerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UninstallerKind::Generic => write!(f, "Generic"),
            UninstallerKind::Msi => write!(f, "MSI"),
            UninstallerKind::Nsis => write!(f, "NSIS"),
            UninstallerKind::InnoSetup => write!(f, "InnoSetup"),
        }
    }
}

/// 待卸载条目
///
/// 由注册表枚举产生, 对监管核心只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: UninstallerKind,
    pub publisher: Option<String>,
    pub version: Option<String>,
    /// 完整注册表路径, 用于启动前的存在性验证
    pub registry_key: Option<String>,
    pub install_location: Option<String>,
    pub uninstall_string: Option<String>,
    pub quiet_uninstall_string: Option<String>,
    /// 是否支持静默卸载
    #[serde(default)]
    pub quiet_supported: bool,
    /// MSI 产品码, 用于验证产品仍可枚举
    pub product_code: Option<String>,
}

impl RemovalEntry {
    pub fn new(name: String, kind: UninstallerKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            kind,
            publisher: None,
            version: None,
            registry_key: None,
            install_location: None,
            uninstall_string: None,
            quiet_uninstall_string: None,
            quiet_supported: false,
            product_code: None,
        }
    }
}

fn product_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}",
        )
        .expect("产品码正则固定合法")
    })
}

fn inno_uninstaller_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Inno Setup 卸载器固定命名为 unins000.exe / unins001.exe ...
    RE.get_or_init(|| Regex::new(r"unins\d{3}\.exe").expect("Inno 卸载器正则固定合法"))
}

/// 从卸载命令中提取 MSI 产品码
pub fn extract_product_code(text: &str) -> Option<String> {
    product_code_regex()
        .find(text)
        .map(|m| m.as_str().to_uppercase())
}

/// 按卸载命令推断卸载器类型
///
/// 注册表的 WindowsInstaller 标记优先; 其余按卸载器可执行文件的
/// 命名惯例判断, 属于启发式, 识别不出时回落为 Generic。
pub fn detect_kind(uninstall_string: Option<&str>, windows_installer: bool) -> UninstallerKind {
    if windows_installer {
        return UninstallerKind::Msi;
    }

    let Some(command) = uninstall_string else {
        return UninstallerKind::Generic;
    };
    let lower = command.to_lowercase();

    if lower.contains("msiexec") {
        UninstallerKind::Msi
    } else if inno_uninstaller_regex().is_match(&lower) {
        UninstallerKind::InnoSetup
    } else if lower.contains("uninst.exe") || lower.contains("uninstall.exe") {
        UninstallerKind::Nsis
    } else {
        UninstallerKind::Generic
    }
}
