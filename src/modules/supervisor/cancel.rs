use std::sync::atomic::{AtomicU8, Ordering};

/// 取消级别, 同一尝试内只升不降
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum CancellationLevel {
    None = 0,
    Skip = 1,
    Terminate = 2,
}

/// 监管循环与调用方共享的取消信号
///
/// 热循环用原子读获取级别, 不经过运行锁, 这样调用方的取消请求
/// 不会被进程终止等慢调用阻塞。写入由监管者在运行锁内发起。
#[derive(Debug, Default)]
pub struct CancelSignal {
    level: AtomicU8,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> CancellationLevel {
        match self.level.load(Ordering::Acquire) {
            2 => CancellationLevel::Terminate,
            1 => CancellationLevel::Skip,
            _ => CancellationLevel::None,
        }
    }

    /// 提升取消级别; Terminate 优先于 Skip, 不会被降级
    pub fn request(&self, terminate: bool) {
        let requested = if terminate {
            CancellationLevel::Terminate
        } else {
            CancellationLevel::Skip
        };
        self.level.fetch_max(requested as u8, Ordering::AcqRel);
    }

    /// 每次尝试开始与终态提交时清零
    pub fn reset(&self) {
        self.level
            .store(CancellationLevel::None as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate_is_never_downgraded() {
        let signal = CancelSignal::new();
        signal.request(true);
        signal.request(false);
        assert_eq!(signal.level(), CancellationLevel::Terminate);
    }

    #[test]
    fn skip_upgrades_to_terminate() {
        let signal = CancelSignal::new();
        assert_eq!(signal.level(), CancellationLevel::None);
        signal.request(false);
        assert_eq!(signal.level(), CancellationLevel::Skip);
        signal.request(true);
        assert_eq!(signal.level(), CancellationLevel::Terminate);
    }

    #[test]
    fn reset_clears_level() {
        let signal = CancelSignal::new();
        signal.request(true);
        signal.reset();
        assert_eq!(signal.level(), CancellationLevel::None);
    }
}
