//! remove 命令 - 卸载程序并监管整个卸载过程

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::modules::entry;
use crate::modules::entry::models::RemovalEntry;
use crate::modules::entry::probe::RegistryProbe;
use crate::modules::supervisor::launcher::CommandLauncher;
use crate::modules::supervisor::models::{RunOptions, SupervisionReport, SupervisionState};
use crate::modules::supervisor::Supervisor;

#[derive(Parser, Debug)]
pub struct RemoveCommand {
    /// 程序名称 (必需)
    pub target: String,

    /// 使用交互式卸载 (默认静默)
    #[arg(long)]
    pub interactive: bool,

    /// 禁止自动终止僵死的静默卸载
    #[arg(long)]
    pub no_auto_kill: bool,

    /// 禁止失败后自动重试
    #[arg(long)]
    pub no_retry: bool,

    /// 模拟运行 (不产生真实进程)
    #[arg(long)]
    pub simulate: bool,

    /// 卸载全部名称匹配的条目 (默认只取最匹配的一个)
    #[arg(long)]
    pub all_matching: bool,

    /// 输出格式 (table/json)
    #[arg(long, default_value = "table")]
    pub format: String,
}

pub async fn execute(cmd: RemoveCommand) -> Result<()> {
    let entries = entry::list_removal_entries(Some(&cmd.target))?;

    let targets: Vec<RemovalEntry> = if cmd.all_matching {
        entries
    } else {
        entry::find_best_match(&entries, &cmd.target)
            .into_iter()
            .collect()
    };

    if targets.is_empty() {
        anyhow::bail!("未找到匹配的程序: {}", cmd.target);
    }

    let options = RunOptions {
        prefer_quiet: !cmd.interactive,
        auto_kill_stuck_quiet: !cmd.no_auto_kill,
        retry_failed_quiet: !cmd.no_retry,
        simulate: cmd.simulate,
    };

    let mut reports = Vec::new();
    for target in targets {
        println!("=== 卸载程序: {} ===", target.name);
        match run_supervised(target, options).await {
            Ok(report) => reports.push(report),
            Err(e) => println!("  - 无法启动卸载: {}", e),
        }
    }

    if cmd.format == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}

/// 运行单个条目的监管者直到落入终态
///
/// 重试回边会把状态送回 Waiting, 这里承担最小的再调度职责:
/// 只要条目未结束就再次调用 run()。
async fn run_supervised(target: RemovalEntry, options: RunOptions) -> Result<SupervisionReport> {
    let launcher = Arc::new(CommandLauncher::from_entry(&target)?);
    let probe = Arc::new(RegistryProbe::from_entry(&target));
    let supervisor = Supervisor::new(target, launcher, probe);

    loop {
        if !supervisor.run(options) {
            break;
        }
        while supervisor.is_running() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if supervisor.is_finished() {
            break;
        }
        tracing::info!("检测到重试请求, 重新运行: {}", supervisor.entry().name);
    }

    let report = supervisor.report();
    match report.status {
        SupervisionState::Completed => println!("  - 卸载完成"),
        SupervisionState::Skipped => {
            println!("  - 已跳过: {}", report.error.clone().unwrap_or_default())
        }
        SupervisionState::Failed => {
            println!("  - 卸载失败: {}", report.error.clone().unwrap_or_default())
        }
        _ => {}
    }
    Ok(report)
}
