//! 差异计划：比较本地与远程映射，得出上传 / 删除列表（纯计算，无 IO）

use super::scanner::FileMap;
use serde::Serialize;
use std::fmt;

/// 同步计划，一次运行只计算一次，执行期间不再变化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// 需要上传的文件（新增 + 修改），保持本地映射的顺序
    pub to_upload: Vec<String>,
    /// 仅本地存在
    pub new_paths: Vec<String>,
    /// 两边都存在但大小不同
    pub modified_paths: Vec<String>,
    /// 仅远程存在
    pub to_delete: Vec<String>,
    pub unchanged_count: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }

    /// 待上传文件的总字节数
    pub fn upload_bytes(&self, local: &FileMap) -> u64 {
        self.to_upload
            .iter()
            .filter_map(|p| local.get(p))
            .map(|r| r.size)
            .sum()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "待上传 {} (新增 {} / 修改 {}), 待删除 {}, 未变化 {}",
            self.to_upload.len(),
            self.new_paths.len(),
            self.modified_paths.len(),
            self.to_delete.len(),
            self.unchanged_count
        )
    }
}

/// 文件关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRelation {
    /// 远程不存在
    New,
    /// 大小不同
    Modified,
    /// 大小相同即视为相同（不比较内容和修改时间）
    Unchanged,
}

/// 计算一个本地文件相对远程的关系
pub fn classify(local: &FileMap, remote: &FileMap, path: &str) -> Option<FileRelation> {
    let local_record = local.get(path)?;
    let relation = match remote.get(path) {
        None => FileRelation::New,
        Some(remote_record) if remote_record.size != local_record.size => {
            tracing::debug!(
                "文件大小不同: {} (local={}, remote={})",
                path,
                local_record.size,
                remote_record.size
            );
            FileRelation::Modified
        }
        Some(_) => FileRelation::Unchanged,
    };
    Some(relation)
}

/// 计算同步计划
pub fn plan(local: &FileMap, remote: &FileMap) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for path in local.keys() {
        match classify(local, remote, path) {
            Some(FileRelation::New) => {
                plan.to_upload.push(path.clone());
                plan.new_paths.push(path.clone());
            }
            Some(FileRelation::Modified) => {
                plan.to_upload.push(path.clone());
                plan.modified_paths.push(path.clone());
            }
            Some(FileRelation::Unchanged) | None => plan.unchanged_count += 1,
        }
    }

    plan.to_delete = remote
        .keys()
        .filter(|path| !local.contains_key(*path))
        .cloned()
        .collect();

    plan
}
