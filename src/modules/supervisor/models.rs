use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 监管状态机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionState {
    /// 等待调度
    Waiting,
    /// 卸载进行中
    Uninstalling,
    /// 卸载完成
    Completed,
    /// 卸载失败
    Failed,
    /// 已跳过
    Skipped,
}

impl std::fmt::Display for SupervisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisionState::Waiting => write!(f, "Waiting"),
            SupervisionState::Uninstalling => write!(f, "Uninstalling"),
            SupervisionState::Completed => write!(f, "Completed"),
            SupervisionState::Failed => write!(f, "Failed"),
            SupervisionState::Skipped => write!(f, "Skipped"),
        }
    }
}

/// 单次运行的不可变配置, 运行开始后不再变化
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunOptions {
    /// 优先使用静默卸载
    pub prefer_quiet: bool,
    /// 允许自动终止僵死的静默卸载
    pub auto_kill_stuck_quiet: bool,
    /// 允许对失败的静默卸载自动重试一次
    pub retry_failed_quiet: bool,
    /// 模拟运行, 不产生真实进程
    pub simulate: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            prefer_quiet: true,
            auto_kill_stuck_quiet: true,
            retry_failed_quiet: true,
            simulate: false,
        }
    }
}

/// 对外可观测的运行摘要
#[derive(Debug, Clone, Serialize)]
pub struct SupervisionReport {
    pub id: String,
    pub name: String,
    pub status: SupervisionState,
    pub error: Option<String>,
    pub attempts: u32,
    pub retry_used: bool,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}
