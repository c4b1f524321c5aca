use anyhow::Result;
use clap::Parser;

use crate::modules::entry::{self, models::RemovalEntry};

#[derive(Parser, Debug)]
pub struct ListCommand {
    /// 输出格式 (table/json)
    #[arg(long, default_value = "table")]
    pub format: String,

    /// 搜索关键词
    #[arg(short, long)]
    pub search: Option<String>,

    /// 仅显示支持静默卸载的条目
    #[arg(long)]
    pub quiet_only: bool,
}

pub async fn execute(cmd: ListCommand) -> Result<()> {
    tracing::info!("列出可卸载条目, search: {:?}", cmd.search);

    let mut entries = entry::list_removal_entries(cmd.search.as_deref())?;

    if cmd.quiet_only {
        entries.retain(|e| e.quiet_supported);
    }

    match cmd.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_table(&entries);
        }
    }

    Ok(())
}

fn print_table(entries: &[RemovalEntry]) {
    println!("\n{}", "=".repeat(100));
    println!(
        "{:<45} {:<12} {:<8} {:<30}",
        "名称", "类型", "静默", "安装位置"
    );
    println!("{}", "=".repeat(100));

    for e in entries {
        println!(
            "{:<45} {:<12} {:<8} {:<30}",
            truncate_string(&e.name, 44),
            e.kind.to_string(),
            if e.quiet_supported { "是" } else { "否" },
            truncate_string(&e.install_location.clone().unwrap_or_default(), 29),
        );
    }

    println!("{}", "=".repeat(100));
    println!("总计: {} 个程序\n", entries.len());
}

fn truncate_string(s: &str, max_len: usize) -> String {
    // 使用 char 边界来正确处理 Unicode 字符（包括中文）
    if s.chars().count() > max_len {
        let chars: String = s.chars().take(max_len - 2).collect();
        format!("{}..", chars)
    } else {
        s.to_string()
    }
}
