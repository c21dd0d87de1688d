use crate::core::executor::{SyncExecutor, SyncOutcome};
use crate::core::planner::{plan, SyncPlan};
use crate::core::progress::{SyncPhase, SyncProgress};
use crate::core::scanner::{scan_local, scan_remote, LocalTree};
use crate::error::SyncError;
use crate::transport::Transport;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 每个阶段内的并发操作数，1 为严格串行
    pub concurrency: usize,
    /// 只扫描和计算计划，不修改远程
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            dry_run: false,
        }
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub local_root: PathBuf,
    pub remote_root: String,
    pub local_files: usize,
    pub remote_files: usize,
    pub plan: SyncPlan,
    /// 计划上传的总字节数（按本地记录）
    pub pending_upload_bytes: u64,
    /// dry run 时为空
    pub outcome: Option<SyncOutcome>,
    pub remote_root_created: bool,
    /// 列目录失败、被当作空目录的远程子树
    pub unreadable_dirs: Vec<String>,
    pub duration_seconds: f64,
}

/// 同步引擎
///
/// 本地扫描 -> 远程扫描 -> 计划 -> 删除 -> 上传，严格顺序执行。
/// 计划在任何修改开始前完整计算，执行期间不会重新扫描。
pub struct SyncEngine {
    options: SyncOptions,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::with_options(SyncOptions::default())
    }

    pub fn with_options(options: SyncOptions) -> Self {
        Self {
            options,
            progress_tx: None,
        }
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_phase(&self, phase: SyncPhase, total: usize) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(SyncProgress::phase(phase, total)).await;
        }
    }

    /// 连接、同步、断开
    ///
    /// 无论同步成功与否都会调用 `disconnect`。
    pub async fn run(
        &self,
        transport: &mut dyn Transport,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<SyncReport, SyncError> {
        info!("连接远程: {}", transport.name());

        let result = match transport.connect().await {
            Ok(()) => self.run_connected(&*transport, local_root, remote_root).await,
            Err(e) => {
                error!("连接失败: {}", e);
                Err(SyncError::Connection(e))
            }
        };

        transport.disconnect().await;
        result
    }

    /// 在已连接的传输上执行同步
    pub async fn run_connected(
        &self,
        transport: &dyn Transport,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        info!("开始同步: {:?} -> {}", local_root, remote_root);
        self.send_phase(SyncPhase::Idle, 0).await;

        self.send_phase(SyncPhase::ScanningLocal, 0).await;
        let local = scan_local_blocking(local_root).await?;

        self.send_phase(SyncPhase::ScanningRemote, 0).await;
        let remote = scan_remote(transport, remote_root).await?;

        self.send_phase(SyncPhase::Planning, local.files.len()).await;
        let plan = plan(&local.files, &remote.files);
        let pending_upload_bytes = plan.upload_bytes(&local.files);
        info!(
            "同步计划: {}, 待上传 {:.2} MB",
            plan,
            pending_upload_bytes as f64 / (1024.0 * 1024.0)
        );
        if !remote.unreadable.is_empty() {
            warn!(
                "以下远程目录无法列出，其中的本地文件会被重新上传: {:?}",
                remote.unreadable
            );
        }

        let mut report = SyncReport {
            local_root: local_root.to_path_buf(),
            remote_root: remote_root.to_string(),
            local_files: local.files.len(),
            remote_files: remote.files.len(),
            plan,
            pending_upload_bytes,
            outcome: None,
            remote_root_created: false,
            unreadable_dirs: remote.unreadable,
            duration_seconds: 0.0,
        };

        if self.options.dry_run {
            info!("dry run：不修改远程");
            report.duration_seconds = start.elapsed().as_secs_f64();
            self.send_phase(SyncPhase::Done, 0).await;
            return Ok(report);
        }

        if !remote.root_exists {
            transport
                .mkdir(remote_root, true)
                .await
                .map_err(SyncError::Transport)?;
            report.remote_root_created = true;
            info!("已创建远程目录: {}", remote_root);
        }

        let mut executor = SyncExecutor::new(transport, local_root, remote_root)
            .with_concurrency(self.options.concurrency);
        if let Some(tx) = &self.progress_tx {
            executor = executor.with_progress(tx.clone());
        }
        let mut outcome = executor.execute(&report.plan, &local.files).await;

        report.duration_seconds = start.elapsed().as_secs_f64();
        outcome.duration_seconds = report.duration_seconds;

        info!(
            "同步完成，用时 {:.2}s: 上传 {} ({:.2} MB), 删除 {}, 失败 {}",
            outcome.duration_seconds,
            outcome.uploaded_count,
            outcome.uploaded_mb(),
            outcome.deleted_count,
            outcome.error_count()
        );

        report.outcome = Some(outcome);
        self.send_phase(SyncPhase::Done, 0).await;
        Ok(report)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 本地扫描是阻塞 IO，放到 blocking 线程池
async fn scan_local_blocking(root: &Path) -> Result<LocalTree, SyncError> {
    let root_owned = root.to_path_buf();
    tokio::task::spawn_blocking(move || scan_local(&root_owned))
        .await
        .map_err(|e| SyncError::Scan {
            path: root.to_path_buf(),
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::{FsTransport, Transport};
    use std::fs;

    fn local_tree(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_run_scenario() {
        let dir = local_tree(&[("a.json", &[b'a'; 100]), ("b.json", &[b'b'; 200])]);
        let mut transport = MockTransport::new()
            .with_file("/srv/mod/b.json", &[b'x'; 150])
            .with_file("/srv/mod/c.json", &[b'c'; 50]);

        let report = SyncEngine::new()
            .run(&mut transport, dir.path(), "/srv/mod")
            .await
            .unwrap();

        assert_eq!(report.plan.new_paths, vec!["a.json"]);
        assert_eq!(report.plan.modified_paths, vec!["b.json"]);
        assert_eq!(report.plan.to_delete, vec!["c.json"]);
        assert_eq!(report.plan.unchanged_count, 0);
        assert_eq!(report.pending_upload_bytes, 300);

        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.uploaded_count, 2);
        assert_eq!(outcome.uploaded_bytes, 300);
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(
            transport.file_paths(),
            vec!["/srv/mod/a.json".to_string(), "/srv/mod/b.json".to_string()]
        );
        assert_eq!(transport.connect_count, 1);
        assert_eq!(transport.disconnect_count, 1);
    }

    #[tokio::test]
    async fn test_unchanged_tree_only_lists() {
        let dir = local_tree(&[("en.json", b"{\"hello\":\"world\"}")]);
        let mut transport =
            MockTransport::new().with_file("/srv/mod/en.json", b"{\"hello\":\"swiat\"}");

        let report = SyncEngine::new()
            .run(&mut transport, dir.path(), "/srv/mod")
            .await
            .unwrap();

        assert!(report.plan.is_empty());
        assert_eq!(report.plan.unchanged_count, 1);
        assert_eq!(
            transport.ops(),
            vec!["exists /srv/mod".to_string(), "list /srv/mod".to_string()]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_empty() {
        let dir = local_tree(&[("module.json", b"{}"), ("lang/en.json", b"{\"a\":1}")]);
        let mut transport = MockTransport::new().with_dir("/srv");
        let engine = SyncEngine::new();

        let first = engine.run(&mut transport, dir.path(), "/srv/mod").await.unwrap();
        assert!(first.remote_root_created);
        assert_eq!(first.outcome.unwrap().uploaded_count, 2);

        let second = engine.run(&mut transport, dir.path(), "/srv/mod").await.unwrap();
        assert!(second.plan.to_upload.is_empty());
        assert!(second.plan.to_delete.is_empty());
        assert_eq!(second.plan.unchanged_count, 2);
        assert!(!second.remote_root_created);
    }

    #[tokio::test]
    async fn test_connection_failure_is_fatal() {
        let dir = local_tree(&[("a.json", b"a")]);
        let mut transport = MockTransport::new();
        transport.fail_connect = true;

        let result = SyncEngine::new().run(&mut transport, dir.path(), "/srv/mod").await;
        assert!(matches!(result, Err(SyncError::Connection(_))));
        assert!(transport.ops().is_empty());
        assert_eq!(transport.disconnect_count, 1);
    }

    #[tokio::test]
    async fn test_local_scan_failure_aborts_before_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::new().with_file("/srv/mod/a.json", b"a");

        let result = SyncEngine::new()
            .run(&mut transport, &dir.path().join("missing"), "/srv/mod")
            .await;

        assert!(matches!(result, Err(SyncError::Scan { .. })));
        assert!(transport.ops().is_empty());
        assert!(transport.file("/srv/mod/a.json").is_some());
        assert_eq!(transport.disconnect_count, 1);
    }

    #[tokio::test]
    async fn test_file_as_local_root_aborts_before_mutation() {
        let dir = local_tree(&[("module.json", b"{}")]);
        let mut transport = MockTransport::new()
            .with_file("/srv/mod/a.json", b"a")
            .with_file("/srv/mod/lang/en.json", b"{}");

        let result = SyncEngine::new()
            .run(&mut transport, &dir.path().join("module.json"), "/srv/mod")
            .await;

        assert!(matches!(result, Err(SyncError::Scan { .. })));
        assert!(transport.ops().is_empty());
        assert_eq!(
            transport.file_paths(),
            vec!["/srv/mod/a.json".to_string(), "/srv/mod/lang/en.json".to_string()]
        );
        assert_eq!(transport.disconnect_count, 1);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_mutate() {
        let dir = local_tree(&[("a.json", b"a")]);
        let mut transport = MockTransport::new().with_file("/srv/mod/old.json", b"o");

        let engine = SyncEngine::with_options(SyncOptions {
            dry_run: true,
            ..Default::default()
        });
        let report = engine.run(&mut transport, dir.path(), "/srv/mod").await.unwrap();

        assert_eq!(report.plan.to_upload, vec!["a.json"]);
        assert_eq!(report.plan.to_delete, vec!["old.json"]);
        assert!(report.outcome.is_none());
        assert!(transport
            .ops()
            .iter()
            .all(|op| op.starts_with("exists") || op.starts_with("list")));
    }

    #[tokio::test]
    async fn test_phases_in_order() {
        let dir = local_tree(&[("a.json", b"a")]);
        let mut transport = MockTransport::new().with_file("/srv/mod/b.json", b"b");
        let (tx, mut rx) = mpsc::channel(64);

        SyncEngine::new()
            .with_progress(tx)
            .run(&mut transport, dir.path(), "/srv/mod")
            .await
            .unwrap();

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if phases.last() != Some(&event.phase) {
                phases.push(event.phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                SyncPhase::Idle,
                SyncPhase::ScanningLocal,
                SyncPhase::ScanningRemote,
                SyncPhase::Planning,
                SyncPhase::Deleting,
                SyncPhase::Uploading,
                SyncPhase::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_fs_transport_end_to_end() {
        let dir = local_tree(&[
            ("module.json", b"{\"id\":\"mod\"}"),
            ("lang/en.json", b"{\"a\":\"b\"}"),
            ("fonts/x.woff", b"0101"),
        ]);
        let remote = tempfile::tempdir().unwrap();
        fs::create_dir_all(remote.path().join("modules/mod")).unwrap();
        fs::write(remote.path().join("modules/mod/obsolete.json"), b"{}").unwrap();

        let engine = SyncEngine::new();
        let mut transport = FsTransport::new(remote.path());

        let first = engine
            .run(&mut transport, dir.path(), "modules/mod")
            .await
            .unwrap();
        let outcome = first.outcome.unwrap();
        assert_eq!(outcome.uploaded_count, 3);
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.error_count(), 0);
        assert_eq!(
            fs::read(remote.path().join("modules/mod/lang/en.json")).unwrap(),
            b"{\"a\":\"b\"}"
        );
        assert!(!remote.path().join("modules/mod/obsolete.json").exists());

        let second = engine
            .run(&mut transport, dir.path(), "modules/mod")
            .await
            .unwrap();
        assert!(second.plan.is_empty());
        assert_eq!(second.plan.unchanged_count, 3);
        assert_eq!(transport.name(), format!("fs:{}", remote.path().display()));
    }
}
