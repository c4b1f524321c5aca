pub mod cancel;
pub mod classify;
pub mod launcher;
pub mod models;

use std::collections::HashSet;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use sysinfo::{Pid, System};

use crate::modules::common::error::{CancelKind, RemovalError};
use crate::modules::entry::models::{RemovalEntry, UninstallerKind};
use crate::modules::entry::probe::PresenceProbe;
use crate::modules::watcher::stall::{self, StallCounter};
use crate::modules::watcher::tracker::ProcessTreeTracker;

use cancel::{CancelSignal, CancellationLevel};
use classify::{classify, ExitClass, TERMINATED_EXIT_CODE};
use launcher::ProcessLauncher;
use models::{RunOptions, SupervisionReport, SupervisionState};

/// 未启用停滞检测时监管循环的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 可变运行状态, 所有修改都经过运行锁
#[derive(Debug)]
struct SharedState {
    status: SupervisionState,
    error: Option<RemovalError>,
    running: bool,
    finished: bool,
    retry_used: bool,
    attempts: u32,
    started_at: Option<chrono::DateTime<Local>>,
    finished_at: Option<chrono::DateTime<Local>>,
}

/// 单次卸载尝试的收尾方式
enum AttemptEnd {
    Done,
    Cancelled(CancelKind),
    Failed { error: RemovalError, retry: bool },
}

/// 单条卸载条目的监管者
///
/// 生命周期 Waiting → Uninstalling → {Completed | Failed | Skipped},
/// 可重试失败允许一次 Failed → Waiting 回边, 重试预算消耗后不再回退。
/// 每个条目独占一个监管者, 多个监管者之间互不共享可变状态。
pub struct Supervisor {
    id: String,
    entry: Arc<RemovalEntry>,
    launcher: Arc<dyn ProcessLauncher>,
    probe: Arc<dyn PresenceProbe>,
    shared: Mutex<SharedState>,
    cancel: CancelSignal,
    silent: AtomicBool,
}

impl Supervisor {
    pub fn new(
        entry: RemovalEntry,
        launcher: Arc<dyn ProcessLauncher>,
        probe: Arc<dyn PresenceProbe>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: entry.id.clone(),
            entry: Arc::new(entry),
            launcher,
            probe,
            shared: Mutex::new(SharedState {
                status: SupervisionState::Waiting,
                error: None,
                running: false,
                finished: false,
                retry_used: false,
                attempts: 0,
                started_at: None,
                finished_at: None,
            }),
            cancel: CancelSignal::new(),
            silent: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry(&self) -> &RemovalEntry {
        &self.entry
    }

    pub fn current_status(&self) -> SupervisionState {
        self.shared.lock().status
    }

    pub fn current_error(&self) -> Option<String> {
        self.shared.lock().error.as_ref().map(|e| e.to_string())
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    /// 静默/交互开关, 运行开始前由调用方设置
    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }

    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::Relaxed);
    }

    pub fn report(&self) -> SupervisionReport {
        let shared = self.shared.lock();
        SupervisionReport {
            id: self.id.clone(),
            name: self.entry.name.clone(),
            status: shared.status,
            error: shared.error.as_ref().map(|e| e.to_string()),
            attempts: shared.attempts,
            retry_used: shared.retry_used,
            started_at: shared.started_at,
            finished_at: shared.finished_at,
        }
    }

    /// 启动一次卸载尝试
    ///
    /// 仅当状态恰为 Waiting 且未在运行、未结束时生效, 其余情况为
    /// 空操作。调用方不会被阻塞, 进度通过状态字段轮询。
    pub fn run(self: &Arc<Self>, options: RunOptions) -> bool {
        {
            let mut shared = self.shared.lock();
            if shared.status != SupervisionState::Waiting || shared.running || shared.finished {
                return false;
            }
            shared.running = true;
            shared.attempts += 1;
            shared.started_at = Some(Local::now());
        }
        self.cancel.reset();

        // 启动前确认目标仍然存在; 注册表查询不在持锁状态下进行
        if !self.target_still_present() {
            tracing::info!("目标已不存在, 视为卸载完成: {}", self.entry.name);
            let mut shared = self.shared.lock();
            shared.status = SupervisionState::Completed;
            shared.finished = true;
            shared.running = false;
            shared.finished_at = Some(Local::now());
            return true;
        }

        self.shared.lock().status = SupervisionState::Uninstalling;

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let end = supervisor.supervise(options).await;
            supervisor.commit(end);
        });
        true
    }

    /// 请求取消当前条目
    ///
    /// Waiting 且未运行时直接跳过, 不会启动进程; Uninstalling 时
    /// 提升取消级别, 由监管循环在下一个周期消费。MSI 卸载经由共享
    /// 安装服务, 放弃等待会把服务留在不一致状态, 因此普通跳过被
    /// 拒绝, 只接受强制终止。
    pub fn request_cancel(&self, terminate: bool) -> bool {
        let mut shared = self.shared.lock();
        match shared.status {
            SupervisionState::Waiting if !shared.running && !shared.finished => {
                shared.status = SupervisionState::Skipped;
                shared.error = Some(RemovalError::Cancelled(CancelKind::Skip));
                shared.finished = true;
                shared.finished_at = Some(Local::now());
                true
            }
            SupervisionState::Uninstalling => {
                if !terminate && self.entry.kind == UninstallerKind::Msi {
                    tracing::debug!("MSI 卸载不接受普通跳过, 忽略取消请求: {}", self.entry.name);
                    return false;
                }
                self.cancel.request(terminate);
                true
            }
            _ => false,
        }
    }

    /// 批量调度器重新排队前调用: 清空错误与标志, 回到 Waiting
    pub fn reset(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.running {
            return false;
        }
        shared.status = SupervisionState::Waiting;
        shared.error = None;
        shared.finished = false;
        shared.retry_used = false;
        shared.attempts = 0;
        shared.started_at = None;
        shared.finished_at = None;
        self.cancel.reset();
        true
    }

    fn target_still_present(&self) -> bool {
        match self.entry.kind {
            UninstallerKind::Msi => {
                self.probe.still_registered() || self.probe.provider_still_enumerable()
            }
            _ => self.probe.still_registered(),
        }
    }

    /// 监管循环: 刷新进程树 → 检查取消 → 采样停滞, 直到进程树清空
    async fn supervise(&self, options: RunOptions) -> AttemptEnd {
        let mut sys = System::new();
        sys.refresh_processes();
        let snapshot: HashSet<Pid> = sys.processes().keys().copied().collect();

        let quiet = options.prefer_quiet && self.is_silent();
        let mut child = match self.launcher.start(quiet, options.simulate) {
            Ok(Some(child)) => child,
            // 模拟模式不产生真实进程, 直接按成功处理
            Ok(None) => return AttemptEnd::Done,
            Err(error) => return AttemptEnd::Failed { error, retry: false },
        };

        let root = Pid::from_u32(child.id());
        tracing::info!("卸载进程已启动: {} (pid {})", self.entry.name, child.id());

        let mut tracker = ProcessTreeTracker::new(
            root,
            snapshot,
            self.entry.kind,
            self.entry.install_location.clone(),
        );
        let stall_enabled = quiet && options.auto_kill_stuck_quiet && self.entry.quiet_supported;
        let mut stall_counter = StallCounter::new();
        let mut exit_code: Option<i32> = None;

        loop {
            // 先收割根进程, 避免僵尸进程滞留在进程表里
            if exit_code.is_none() {
                if let Ok(Some(status)) = child.try_wait() {
                    exit_code = Some(exit_code_of(status));
                }
            }

            tracker.refresh(&mut sys);
            if tracker.finished(&mut sys) {
                break;
            }

            match self.cancel.level() {
                CancellationLevel::Terminate => {
                    tracker.kill_all(&mut sys);
                    return AttemptEnd::Cancelled(CancelKind::Terminate);
                }
                // 跳过只放弃等待, 不杀进程
                CancellationLevel::Skip => return AttemptEnd::Cancelled(CancelKind::Skip),
                CancellationLevel::None => {}
            }

            if stall_enabled {
                // 采样本身阻塞一个窗口, 即为本轮的等待
                let stalled = stall::is_stalled(tracker.pids()).await;
                if stall_counter.record(stalled) {
                    tracing::warn!(
                        "卸载进程树连续 {} 秒无活动, 强制终止: {}",
                        stall_counter.consecutive(),
                        self.entry.name
                    );
                    tracker.kill_all(&mut sys);
                    return AttemptEnd::Failed {
                        error: RemovalError::Timeout(format!(
                            "卸载进程持续无活动, 已强制终止: {}",
                            self.entry.name
                        )),
                        retry: false,
                    };
                }
            } else {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        if exit_code.is_none() {
            exit_code = child.wait().ok().map(exit_code_of);
        }
        let code = exit_code.unwrap_or(0);
        tracing::info!(
            "卸载进程树已结束: {} (退出码 {})",
            self.entry.name,
            code
        );

        match classify(self.entry.kind, code) {
            ExitClass::Success => AttemptEnd::Done,
            ExitClass::Cancelled(kind) => AttemptEnd::Cancelled(kind),
            ExitClass::Fatal => AttemptEnd::Failed {
                error: RemovalError::ExitCode(code),
                retry: false,
            },
            ExitClass::Retryable => AttemptEnd::Failed {
                error: RemovalError::ExitCode(code),
                retry: options.retry_failed_quiet,
            },
        }
    }

    /// 终态提交, 全部状态写入在运行锁内完成
    fn commit(&self, end: AttemptEnd) {
        let mut shared = self.shared.lock();
        match end {
            AttemptEnd::Done => {
                shared.status = SupervisionState::Completed;
                shared.error = None;
                shared.finished = true;
            }
            AttemptEnd::Cancelled(kind) => {
                shared.status = SupervisionState::Skipped;
                shared.error = Some(RemovalError::Cancelled(kind));
                shared.finished = true;
            }
            AttemptEnd::Failed { error, retry } => {
                if retry && !shared.retry_used {
                    // 一次性重试回边: 回到 Waiting, 等待调度器再次调用 run()
                    tracing::info!("卸载失败, 保留重试: {} ({})", self.entry.name, error);
                    shared.retry_used = true;
                    shared.status = SupervisionState::Waiting;
                    shared.error = Some(error);
                } else {
                    tracing::warn!("卸载失败: {} ({})", self.entry.name, error);
                    shared.status = SupervisionState::Failed;
                    shared.error = Some(error);
                    shared.finished = true;
                }
            }
        }
        shared.running = false;
        shared.finished_at = Some(Local::now());
        // 取消信号随本次尝试一并消费, 不泄漏到下一次尝试
        self.cancel.reset();
    }
}

/// 被信号杀死等拿不到退出码的情形按强制终止处理
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(TERMINATED_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Child;
    use std::sync::atomic::AtomicUsize;

    struct StaticProbe {
        present: bool,
    }

    impl PresenceProbe for StaticProbe {
        fn still_registered(&self) -> bool {
            self.present
        }

        fn provider_still_enumerable(&self) -> bool {
            self.present
        }
    }

    /// 永不产生真实进程的启动器
    struct SimulatedLauncher;

    impl ProcessLauncher for SimulatedLauncher {
        fn start(&self, _quiet: bool, _simulate: bool) -> Result<Option<Child>, RemovalError> {
            Ok(None)
        }
    }

    /// 记录启动次数, 用于断言从未启动
    struct CountingLauncher {
        launches: AtomicUsize,
    }

    impl ProcessLauncher for CountingLauncher {
        fn start(&self, _quiet: bool, _simulate: bool) -> Result<Option<Child>, RemovalError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[cfg(unix)]
    struct ShellLauncher {
        script: String,
    }

    #[cfg(unix)]
    impl ProcessLauncher for ShellLauncher {
        fn start(&self, _quiet: bool, simulate: bool) -> Result<Option<Child>, RemovalError> {
            if simulate {
                return Ok(None);
            }
            let child = std::process::Command::new("sh")
                .args(["-c", &self.script])
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()?;
            Ok(Some(child))
        }
    }

    fn make_supervisor(
        kind: UninstallerKind,
        launcher: Arc<dyn ProcessLauncher>,
        present: bool,
    ) -> Arc<Supervisor> {
        let entry = RemovalEntry::new("测试程序".to_string(), kind);
        Supervisor::new(entry, launcher, Arc::new(StaticProbe { present }))
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..300 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("等待条件超时");
    }

    #[test]
    fn skip_while_waiting_short_circuits_to_skipped() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(SimulatedLauncher),
            true,
        );

        assert!(supervisor.request_cancel(false));
        assert_eq!(supervisor.current_status(), SupervisionState::Skipped);
        assert!(supervisor.is_finished());
        assert!(supervisor
            .current_error()
            .expect("应当带取消原因")
            .contains("跳过"));
    }

    #[test]
    fn silent_toggle_is_observable() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(SimulatedLauncher),
            true,
        );
        assert!(supervisor.is_silent());
        supervisor.set_silent(false);
        assert!(!supervisor.is_silent());
    }

    #[tokio::test]
    async fn gone_target_completes_without_launching() {
        let launcher = Arc::new(CountingLauncher {
            launches: AtomicUsize::new(0),
        });
        let supervisor = make_supervisor(UninstallerKind::Msi, launcher.clone(), false);

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| !supervisor.is_running()).await;

        assert_eq!(supervisor.current_status(), SupervisionState::Completed);
        assert!(supervisor.is_finished());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn simulated_run_completes() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(SimulatedLauncher),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.is_finished()).await;

        assert_eq!(supervisor.current_status(), SupervisionState::Completed);
        assert!(supervisor.current_error().is_none());
    }

    #[tokio::test]
    async fn reset_requeues_a_finished_entry() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(SimulatedLauncher),
            true,
        );

        supervisor.run(RunOptions::default());
        wait_until(|| supervisor.is_finished()).await;

        assert!(supervisor.reset());
        assert_eq!(supervisor.current_status(), SupervisionState::Waiting);
        assert!(!supervisor.is_finished());
        assert!(supervisor.current_error().is_none());

        // 复位后可以再次运行
        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.is_finished()).await;
        assert_eq!(supervisor.current_status(), SupervisionState::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_zero_without_descendants_completes() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(ShellLauncher {
                script: "exit 0".to_string(),
            }),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.is_finished()).await;

        assert_eq!(supervisor.current_status(), SupervisionState::Completed);
        assert!(supervisor.current_error().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_run_is_noop_while_running() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(ShellLauncher {
                script: "sleep 30".to_string(),
            }),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.current_status() == SupervisionState::Uninstalling).await;
        assert!(!supervisor.run(RunOptions::default()));

        // 收尾: 强制终止, 等待状态机落定
        assert!(supervisor.request_cancel(true));
        wait_until(|| supervisor.is_finished()).await;
        assert_eq!(supervisor.current_status(), SupervisionState::Skipped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn retry_budget_is_consumed_exactly_once() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(ShellLauncher {
                script: "exit 42".to_string(),
            }),
            true,
        );
        let options = RunOptions::default();

        // 第一次可重试失败: 回到 Waiting, 未结束
        assert!(supervisor.run(options));
        wait_until(|| !supervisor.is_running()).await;
        assert_eq!(supervisor.current_status(), SupervisionState::Waiting);
        assert!(!supervisor.is_finished());
        assert!(supervisor
            .current_error()
            .expect("应当保留失败原因")
            .contains("42"));

        // 第二次失败: 预算耗尽, 永久 Failed
        assert!(supervisor.run(options));
        wait_until(|| !supervisor.is_running()).await;
        assert_eq!(supervisor.current_status(), SupervisionState::Failed);
        assert!(supervisor.is_finished());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fatal_exit_code_never_retries() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(ShellLauncher {
                script: "exit 5".to_string(),
            }),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| !supervisor.is_running()).await;

        // 确定性错误直接终结, 不消耗重试预算
        assert_eq!(supervisor.current_status(), SupervisionState::Failed);
        assert!(supervisor.is_finished());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn msi_rejects_plain_skip_but_honors_terminate() {
        let supervisor = make_supervisor(
            UninstallerKind::Msi,
            Arc::new(ShellLauncher {
                script: "sleep 30".to_string(),
            }),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.current_status() == SupervisionState::Uninstalling).await;

        assert!(!supervisor.request_cancel(false));
        assert_eq!(supervisor.current_status(), SupervisionState::Uninstalling);

        assert!(supervisor.request_cancel(true));
        wait_until(|| supervisor.is_finished()).await;
        assert_eq!(supervisor.current_status(), SupervisionState::Skipped);
        assert!(supervisor
            .current_error()
            .expect("应当带取消原因")
            .contains("强制终止"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn skip_mid_run_breaks_without_killing() {
        let supervisor = make_supervisor(
            UninstallerKind::Generic,
            Arc::new(ShellLauncher {
                script: "sleep 5".to_string(),
            }),
            true,
        );

        assert!(supervisor.run(RunOptions::default()));
        wait_until(|| supervisor.current_status() == SupervisionState::Uninstalling).await;

        assert!(supervisor.request_cancel(false));
        wait_until(|| supervisor.is_finished()).await;

        assert_eq!(supervisor.current_status(), SupervisionState::Skipped);
        assert!(supervisor
            .current_error()
            .expect("应当带取消原因")
            .contains("跳过"));
    }
}
