//! 执行同步计划：先删除，再上传；单个文件失败只计数，不中断批次，也不回滚

use super::planner::SyncPlan;
use super::progress::{SyncPhase, SyncProgress};
use super::scanner::FileMap;
use crate::error::TransportError;
use crate::transport::{join_remote, remote_parent, Transport};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 失败的单个操作
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    pub path: String,
    pub error: String,
}

/// 执行结果统计，只用于展示，不会回写到计划
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub uploaded_count: usize,
    pub uploaded_bytes: u64,
    pub upload_errors: usize,
    pub deleted_count: usize,
    pub delete_errors: usize,
    pub duration_seconds: f64,
    pub failures: Vec<FailedOperation>,
}

impl SyncOutcome {
    pub fn error_count(&self) -> usize {
        self.upload_errors + self.delete_errors
    }

    pub fn uploaded_mb(&self) -> f64 {
        self.uploaded_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// 同步执行器
pub struct SyncExecutor<'a> {
    transport: &'a dyn Transport,
    local_root: &'a Path,
    remote_root: &'a str,
    concurrency: usize,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, local_root: &'a Path, remote_root: &'a str) -> Self {
        Self {
            transport,
            local_root,
            remote_root,
            concurrency: 1,
            progress_tx: None,
        }
    }

    /// 每个阶段内同时进行的操作数，1 表示严格串行
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_progress(&self, progress: SyncProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }

    /// 按计划执行。删除阶段全部完成后才开始上传。
    pub async fn execute(&self, plan: &SyncPlan, local: &FileMap) -> SyncOutcome {
        let start = Instant::now();
        let mut outcome = SyncOutcome::default();

        self.send_progress(SyncProgress::phase(SyncPhase::Deleting, plan.to_delete.len()))
            .await;
        if !plan.to_delete.is_empty() {
            info!("删除 {} 个过期文件...", plan.to_delete.len());
            self.delete_phase(plan, &mut outcome).await;
            if outcome.delete_errors > 0 {
                warn!("{} 个文件删除失败", outcome.delete_errors);
            }
        }

        self.send_progress(SyncProgress::phase(SyncPhase::Uploading, plan.to_upload.len()))
            .await;
        if !plan.to_upload.is_empty() {
            info!("上传 {} 个文件...", plan.to_upload.len());
            self.upload_phase(plan, local, &mut outcome).await;
            info!("已上传 {:.2} MB", outcome.uploaded_mb());
            if outcome.upload_errors > 0 {
                warn!("{} 个文件上传失败", outcome.upload_errors);
            }
        } else {
            info!("没有需要上传的文件，远程已是最新");
        }

        outcome.duration_seconds = start.elapsed().as_secs_f64();
        outcome
    }

    async fn delete_phase(&self, plan: &SyncPlan, outcome: &mut SyncOutcome) {
        let total = plan.to_delete.len();
        let mut results = stream::iter(plan.to_delete.iter())
            .map(|path| async move {
                let remote_path = join_remote(self.remote_root, path);
                let result = self.transport.delete(&remote_path).await;
                (path, result)
            })
            .buffered(self.concurrency);

        let mut completed = 0;
        while let Some((path, result)) = results.next().await {
            completed += 1;
            let success = match result {
                Ok(()) => {
                    debug!("已删除: {}", path);
                    outcome.deleted_count += 1;
                    true
                }
                Err(e) => {
                    warn!("删除失败: {} - {}", path, e);
                    outcome.delete_errors += 1;
                    outcome.failures.push(FailedOperation {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    false
                }
            };
            self.send_progress(SyncProgress {
                phase: SyncPhase::Deleting,
                current_file: path.clone(),
                completed,
                total,
                failed: !success,
            })
            .await;
        }
    }

    async fn upload_phase(&self, plan: &SyncPlan, local: &FileMap, outcome: &mut SyncOutcome) {
        let total = plan.to_upload.len();
        let mut results = stream::iter(plan.to_upload.iter())
            .map(|path| async move {
                let result = self.upload_one(path, local).await;
                (path, result)
            })
            .buffered(self.concurrency);

        let mut completed = 0;
        while let Some((path, result)) = results.next().await {
            completed += 1;
            let success = match result {
                Ok(size) => {
                    outcome.uploaded_count += 1;
                    outcome.uploaded_bytes += size;
                    true
                }
                Err(e) => {
                    warn!("上传失败: {} - {}", path, e);
                    outcome.upload_errors += 1;
                    outcome.failures.push(FailedOperation {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    false
                }
            };
            self.send_progress(SyncProgress {
                phase: SyncPhase::Uploading,
                current_file: path.clone(),
                completed,
                total,
                failed: !success,
            })
            .await;
        }
    }

    /// 上传单个文件，成功时返回本地记录的大小
    async fn upload_one(&self, path: &str, local: &FileMap) -> Result<u64, TransportError> {
        let record = local
            .get(path)
            .ok_or_else(|| TransportError::transfer(path, "不在本地清单中"))?;
        let source = record
            .source
            .clone()
            .unwrap_or_else(|| self.local_root.join(path));
        let size = record.size;

        let remote_path = join_remote(self.remote_root, path);

        // 同目录的兄弟文件会重复调用，mkdir 是幂等的
        if let Some(parent) = remote_parent(&remote_path) {
            self.transport.mkdir(parent, true).await?;
        }

        debug!("上传: {:?} -> {} ({} 字节)", source, remote_path, size);
        self.transport.upload(&source, &remote_path).await?;
        Ok(size)
    }
}
