use std::sync::OnceLock;

/// 进程级忽略名单, 首次使用时计算一次, 之后只读共享
///
/// 浏览器与资源管理器常被卸载器顺带拉起 (打开反馈页面、资源目录),
/// 它们不属于卸载操作本身。
static IGNORED_PROCESS_NAMES: OnceLock<Vec<&'static str>> = OnceLock::new();

pub fn ignored_process_names() -> &'static [&'static str] {
    IGNORED_PROCESS_NAMES.get_or_init(|| {
        vec![
            "explorer", "iexplore", "firefox", "chrome", "msedge", "opera", "brave", "vivaldi",
            "safari",
        ]
    })
}

/// 进程名是否在忽略名单内 (不区分大小写, 兼容 .exe 后缀)
pub fn is_ignored_process(name: &str) -> bool {
    let lower = name.to_lowercase();
    let base = lower.strip_suffix(".exe").unwrap_or(&lower);
    ignored_process_names().iter().any(|n| *n == base)
}

/// 是否为 Windows Installer 服务进程
pub fn is_installer_service_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("msiexec") || name.eq_ignore_ascii_case("msiexec.exe")
}
