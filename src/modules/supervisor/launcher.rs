use std::process::{Child, Command, Stdio};

use crate::modules::common::error::RemovalError;
use crate::modules::entry::models::{RemovalEntry, UninstallerKind};

/// 进程启动能力
///
/// 监管者不关心命令行如何构造, 只通过该接口拿到已启动的句柄;
/// 模拟模式下不产生任何进程。
pub trait ProcessLauncher: Send + Sync {
    fn start(&self, quiet: bool, simulate: bool) -> Result<Option<Child>, RemovalError>;
}

/// 按条目的卸载命令启动进程
pub struct CommandLauncher {
    uninstall_string: String,
    quiet_uninstall_string: Option<String>,
    kind: UninstallerKind,
}

impl CommandLauncher {
    pub fn from_entry(entry: &RemovalEntry) -> Result<Self, RemovalError> {
        let uninstall_string = entry
            .uninstall_string
            .clone()
            .ok_or_else(|| RemovalError::NotFound(format!("{} 缺少卸载命令", entry.name)))?;

        Ok(Self {
            uninstall_string,
            quiet_uninstall_string: entry.quiet_uninstall_string.clone(),
            kind: entry.kind,
        })
    }

    /// 处理常见卸载器的静默参数
    fn command_line(&self, quiet: bool) -> String {
        if !quiet {
            return self.uninstall_string.clone();
        }
        if let Some(quiet_string) = &self.quiet_uninstall_string {
            return quiet_string.clone();
        }

        match self.kind {
            UninstallerKind::Msi
                if self.uninstall_string.to_lowercase().contains("msiexec") =>
            {
                format!("{} /qn /norestart", self.uninstall_string)
            }
            UninstallerKind::Nsis => format!("{} /S", self.uninstall_string),
            UninstallerKind::InnoSetup => {
                format!("{} /VERYSILENT /NORESTART", self.uninstall_string)
            }
            _ => self.uninstall_string.clone(),
        }
    }
}

impl ProcessLauncher for CommandLauncher {
    fn start(&self, quiet: bool, simulate: bool) -> Result<Option<Child>, RemovalError> {
        let cmd_str = self.command_line(quiet);

        if simulate {
            tracing::info!("模拟模式, 跳过执行: {}", cmd_str);
            return Ok(None);
        }

        tracing::info!("执行卸载命令: {}", cmd_str);

        #[cfg(windows)]
        let child = Command::new("cmd")
            .args(["/C", &cmd_str])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        #[cfg(not(windows))]
        let child = Command::new("sh")
            .args(["-c", &cmd_str])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Some(child))
    }
}
