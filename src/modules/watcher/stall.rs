use std::collections::HashSet;
use std::time::Duration;

use sysinfo::{Pid, System};

/// 停滞检测的采样窗口
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// 连续停滞样本上限, 超过即判定卸载进程树僵死
pub const STALL_LIMIT: u32 = 30;

/// CPU 占用超过该值即视为仍在工作 (百分比)
const CPU_WORKING_THRESHOLD: f32 = 1.0;

/// 窗口内 I/O 超过该字节数即视为仍在工作
const IO_WORKING_THRESHOLD: u64 = 10 * 1024;

/// 对被监控进程做一次固定窗口采样, 判断整棵进程树是否停滞
///
/// 任一进程 CPU 超过 1% 或窗口内 I/O 超过 10 KB 即为仍在工作;
/// 全部进程都无法观测 (已退出、权限不足) 时返回未停滞,
/// 观测不到的进程宁可不杀。
pub async fn is_stalled(pids: &HashSet<Pid>) -> bool {
    if pids.is_empty() {
        return false;
    }

    // 采样器只在本次检查内存活, 离开作用域即释放
    let mut sys = System::new();
    sys.refresh_processes();
    tokio::time::sleep(SAMPLE_WINDOW).await;
    sys.refresh_processes();

    let mut observed = false;
    for pid in pids {
        let Some(process) = sys.process(*pid) else {
            continue;
        };
        observed = true;

        let io = process.disk_usage();
        if process.cpu_usage() > CPU_WORKING_THRESHOLD
            || io.read_bytes + io.written_bytes > IO_WORKING_THRESHOLD
        {
            return false;
        }
    }

    observed
}

/// 连续停滞计数器, 任一工作样本清零
#[derive(Debug, Default)]
pub struct StallCounter {
    consecutive: u32,
}

impl StallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次采样结果, 返回是否已超过停滞上限
    pub fn record(&mut self, stalled: bool) -> bool {
        if stalled {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive > STALL_LIMIT
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
