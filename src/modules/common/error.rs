use thiserror::Error;

/// 取消原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelKind {
    /// 放弃等待, 不终止进程
    Skip,
    /// 强制终止进程树
    Terminate,
}

impl std::fmt::Display for CancelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelKind::Skip => write!(f, "跳过"),
            CancelKind::Terminate => write!(f, "强制终止"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("注册表错误: {0}")]
    Registry(String),

    #[error("MSI 错误: {0}")]
    Msi(String),

    #[error("进程错误: {0}")]
    Process(String),

    #[error("启动卸载进程失败: {0}")]
    Launch(#[from] std::io::Error),

    #[error("卸载程序退出码异常: {0}")]
    ExitCode(i32),

    #[error("操作已取消: {0}")]
    Cancelled(CancelKind),

    #[error("超时: {0}")]
    Timeout(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("其他错误: {0}")]
    Other(String),
}

impl RemovalError {
    /// 若为取消错误, 返回取消原因
    pub fn cancel_kind(&self) -> Option<CancelKind> {
        match self {
            RemovalError::Cancelled(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl serde::Serialize for RemovalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
