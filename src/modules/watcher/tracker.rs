use std::collections::HashSet;

use sysinfo::{Pid, Process, ProcessStatus, System};

use crate::modules::common::utils;
use crate::modules::entry::models::UninstallerKind;

use super::ignore::{is_ignored_process, is_installer_service_name};

/// 一次卸载尝试的进程树监控集合
///
/// 从根进程出发, 每轮刷新补充被监控进程的子进程, 并剔除已退出、
/// 忽略名单内以及启动前快照中已存在的进程。集合归当前尝试的
/// 执行上下文独占, 尝试结束即丢弃。
pub struct ProcessTreeTracker {
    watched: HashSet<Pid>,
    snapshot: HashSet<Pid>,
    kind: UninstallerKind,
    install_location: Option<String>,
}

impl ProcessTreeTracker {
    pub fn new(
        root: Pid,
        snapshot: HashSet<Pid>,
        kind: UninstallerKind,
        install_location: Option<String>,
    ) -> Self {
        let mut watched = HashSet::new();
        watched.insert(root);

        Self {
            watched,
            snapshot,
            kind,
            // 空白安装路径不参与后期补捞
            install_location: install_location.filter(|loc| !loc.trim().is_empty()),
        }
    }

    pub fn pids(&self) -> &HashSet<Pid> {
        &self.watched
    }

    /// 刷新监控集合
    ///
    /// 读取进程元数据失败 (权限不足、进程中途退出) 一律按
    /// 不相关处理, 进程树枚举无法保证特权访问。
    pub fn refresh(&mut self, sys: &mut System) {
        sys.refresh_processes();
        let processes = sys.processes();

        let mut added = Vec::new();
        for (pid, process) in processes {
            if self.watched.contains(pid) || self.snapshot.contains(pid) {
                continue;
            }
            if is_ignored_process(process.name()) {
                continue;
            }
            // MSI 卸载经由共享的 Windows Installer 服务进行, 服务进程
            // 本身永不加入监控, 否则会一直等到其他卸载任务结束
            if self.kind == UninstallerKind::Msi && is_installer_service_name(process.name()) {
                continue;
            }

            let Some(parent) = process.parent() else {
                continue;
            };
            if self.watched.contains(&parent) || self.is_installer_service_child(processes.get(&parent)) {
                added.push(*pid);
            }
        }
        for pid in added {
            tracing::debug!("进程树新增进程: {}", pid);
            self.watched.insert(pid);
        }

        self.watched.retain(|pid| match processes.get(pid) {
            None => false,
            Some(p) if matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead) => false,
            Some(p) if is_ignored_process(p.name()) => false,
            Some(_) => !self.snapshot.contains(pid),
        });
    }

    /// MSI 卸载可能由安装服务代为执行, 服务的子进程也要纳入监控
    fn is_installer_service_child(&self, parent: Option<&Process>) -> bool {
        self.kind == UninstallerKind::Msi
            && parent.map_or(false, |p| is_installer_service_name(p.name()))
    }

    /// 监控集合是否已经清空 (含按安装目录的后期兜底扫描)
    pub fn finished(&mut self, sys: &mut System) -> bool {
        if !self.watched.is_empty() {
            return false;
        }
        match self.install_location.clone() {
            None => true,
            Some(location) => self.discover_by_install_location(sys, &location) == 0,
        }
    }

    /// 按安装目录补捞启动后才出现的进程
    ///
    /// 父子枚举会漏掉间接重启出来的进程, 这里按可执行文件路径或
    /// 命令行是否包含安装目录 (不区分大小写) 补捞。该匹配是尽力
    /// 而为的启发式, 可能多匹配也可能漏匹配。
    fn discover_by_install_location(&mut self, sys: &mut System, location: &str) -> usize {
        sys.refresh_processes();

        let mut found = 0;
        for (pid, process) in sys.processes() {
            if self.snapshot.contains(pid) || self.watched.contains(pid) {
                continue;
            }
            if is_ignored_process(process.name()) {
                continue;
            }
            if self.kind == UninstallerKind::Msi && is_installer_service_name(process.name()) {
                continue;
            }
            if matches_install_location(process.exe(), process.cmd(), location) {
                tracing::debug!("按安装目录补捞进程: {} ({})", pid, process.name());
                self.watched.insert(*pid);
                found += 1;
            }
        }
        found
    }

    /// 强制终止整棵监控进程树; MSI 卸载连同安装服务进程一并终止
    pub fn kill_all(&self, sys: &mut System) {
        sys.refresh_processes();

        for pid in &self.watched {
            if let Some(process) = sys.process(*pid) {
                tracing::info!("终止进程: {} ({})", pid, process.name());
                process.kill();
            }
        }

        if self.kind == UninstallerKind::Msi {
            for process in sys.processes().values() {
                if is_installer_service_name(process.name()) {
                    tracing::info!("终止安装服务进程: {}", process.pid());
                    process.kill();
                }
            }
        }
    }
}

/// 可执行路径或命令行包含安装目录即视为属于本次卸载
fn matches_install_location(
    exe: Option<&std::path::Path>,
    cmd: &[String],
    location: &str,
) -> bool {
    if let Some(exe) = exe {
        if utils::contains_ignore_case(&exe.to_string_lossy(), location) {
            return true;
        }
    }
    cmd.iter()
        .any(|arg| utils::contains_ignore_case(arg, location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_location_matches_exe_path_case_insensitive() {
        let exe = std::path::Path::new(r"C:\Program Files\Example App\helper.exe");
        assert!(matches_install_location(
            Some(exe),
            &[],
            r"c:\program files\example app"
        ));
        assert!(!matches_install_location(
            Some(exe),
            &[],
            r"c:\program files\other"
        ));
    }

    #[test]
    fn install_location_matches_command_line() {
        let cmd = vec![
            "cleanup.exe".to_string(),
            r"/dir=C:\Program Files\Example App".to_string(),
        ];
        assert!(matches_install_location(
            None,
            &cmd,
            r"c:\program files\example app"
        ));
        assert!(!matches_install_location(None, &[], "example"));
    }

    #[cfg(unix)]
    mod live {
        use super::super::*;
        use std::process::{Command, Stdio};

        fn current_pids(sys: &mut System) -> HashSet<Pid> {
            sys.refresh_processes();
            sys.processes().keys().copied().collect()
        }

        #[test]
        fn tracker_prunes_exited_root() {
            let mut sys = System::new();
            let snapshot = current_pids(&mut sys);

            let mut child = Command::new("sh")
                .args(["-c", "sleep 30"])
                .stdout(Stdio::null())
                .spawn()
                .expect("启动测试进程失败");
            let root = Pid::from_u32(child.id());

            let mut tracker = ProcessTreeTracker::new(
                root,
                snapshot,
                UninstallerKind::Generic,
                None,
            );
            tracker.refresh(&mut sys);
            assert!(tracker.pids().contains(&root));
            assert!(!tracker.finished(&mut sys));

            let _ = child.kill();
            let _ = child.wait();
            tracker.refresh(&mut sys);
            assert!(tracker.finished(&mut sys));
        }

        #[test]
        fn late_discovery_picks_up_marked_process() {
            // 把 sleep 复制进带标记名的目录, 让可执行路径命中安装目录匹配
            let marker = format!("rustbu-marker-{}", uuid::Uuid::new_v4());
            let marker_dir = std::env::temp_dir().join(&marker);
            std::fs::create_dir_all(&marker_dir).expect("创建临时目录失败");
            let sleep_src = ["/bin/sleep", "/usr/bin/sleep"]
                .iter()
                .find(|p| std::path::Path::new(p).exists())
                .expect("找不到 sleep 可执行文件");
            let sleep_bin = marker_dir.join("sleep");
            std::fs::copy(sleep_src, &sleep_bin).expect("复制 sleep 失败");

            let mut sys = System::new();
            let snapshot = current_pids(&mut sys);
            let snapshot_copy = snapshot.clone();

            // 根进程立即结束, 被标记的进程只能靠安装目录匹配补捞
            let mut root_child = Command::new("sh")
                .args(["-c", "true"])
                .stdout(Stdio::null())
                .spawn()
                .expect("启动根进程失败");
            let mut marked = Command::new(&sleep_bin)
                .arg("5")
                .stdout(Stdio::null())
                .spawn()
                .expect("启动标记进程失败");
            let marked_pid = Pid::from_u32(marked.id());

            let _ = root_child.wait();

            let mut tracker = ProcessTreeTracker::new(
                Pid::from_u32(root_child.id()),
                snapshot,
                UninstallerKind::Generic,
                Some(marker_dir.to_string_lossy().to_string()),
            );
            tracker.refresh(&mut sys);

            // 根进程已退出, 但补捞扫描找到了标记进程
            assert!(!tracker.finished(&mut sys));
            assert!(tracker.pids().contains(&marked_pid));
            // 启动前快照中的进程永远不会进入监控集合
            assert!(tracker.pids().iter().all(|p| !snapshot_copy.contains(p)));

            let _ = marked.kill();
            let _ = marked.wait();
            tracker.refresh(&mut sys);
            assert!(tracker.finished(&mut sys));

            let _ = std::fs::remove_dir_all(&marker_dir);
        }
    }
}
