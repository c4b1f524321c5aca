use crate::modules::common::error::CancelKind;
use crate::modules::entry::models::UninstallerKind;

/// 进程被强制终止时的退出码 (STATUS_CONTROL_C_EXIT, 0xC000013A)
pub const TERMINATED_EXIT_CODE: i32 = -1073741510;

/// MSI 用户在卸载对话框中取消
const MSI_USER_CANCEL: i32 = 1602;

/// 退出码的语义分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// 卸载成功
    Success,
    /// 用户在卸载器内取消
    Cancelled(CancelKind),
    /// 确定性错误, 重试只会复现, 不消耗重试预算
    Fatal,
    /// 其余非零退出码, 允许消耗重试预算
    Retryable,
}

/// 按卸载器类型解释退出码
pub fn classify(kind: UninstallerKind, code: i32) -> ExitClass {
    if code == 0 {
        return ExitClass::Success;
    }

    // 各家卸载器自带的用户取消退出码不算错误
    match kind {
        UninstallerKind::Msi if code == MSI_USER_CANCEL => {
            return ExitClass::Cancelled(CancelKind::Skip);
        }
        UninstallerKind::Nsis if code == 1 || code == 2 => {
            return ExitClass::Cancelled(CancelKind::Skip);
        }
        _ => {}
    }

    // 外部工具以被强杀的方式退出, 等同用户请求了强制终止
    if code == TERMINATED_EXIT_CODE {
        return ExitClass::Cancelled(CancelKind::Terminate);
    }

    match code {
        // 文件不存在 / 路径不存在 / 拒绝访问 / 命令无法识别
        2 | 3 | 5 | 9009 => ExitClass::Fatal,
        _ => ExitClass::Retryable,
    }
}
