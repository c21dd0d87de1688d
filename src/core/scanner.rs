//! 目录树扫描：本地与远程都展开成「相对路径 -> FileRecord」的平铺映射

use crate::error::SyncError;
use crate::transport::{join_remote, Transport};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use tracing::{debug, info, warn};

/// 每扫描这么多文件输出一次进度
pub const PROGRESS_BATCH: usize = 50;

/// 单个文件的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// 相对根目录的路径，`/` 分隔
    pub relative_path: String,
    pub size: u64,
    /// 修改时间（Unix 秒），目前不参与比较
    pub modified_time: i64,
    /// 本地绝对路径，仅本地记录有
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

/// 相对路径 -> 记录，按路径排序以保证遍历顺序稳定
pub type FileMap = BTreeMap<String, FileRecord>;

/// 本地扫描结果
#[derive(Debug, Clone, Default)]
pub struct LocalTree {
    pub files: FileMap,
    pub dir_count: usize,
}

/// 远程扫描结果
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    pub files: FileMap,
    pub dir_count: usize,
    /// 远程根目录是否存在；不存在时上传前需要先创建
    pub root_exists: bool,
    /// 列目录失败、被当作空目录处理的子树（相对路径，根为 ""）
    pub unreadable: Vec<String>,
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// 递归扫描本地目录
///
/// 包含隐藏文件和符号链接（跟随链接），不做任何过滤。任何读取错误都会中止扫描，
/// 根路径不是目录时同样报错。记录里的 `source` 均为绝对路径。
pub fn scan_local(root: &Path) -> Result<LocalTree, SyncError> {
    info!("开始扫描本地目录: {:?}", root);

    let scan_err = |source| SyncError::Scan {
        path: root.to_path_buf(),
        source,
    };
    let root = std::path::absolute(root).map_err(scan_err)?;
    let metadata = std::fs::metadata(&root).map_err(scan_err)?;
    if !metadata.is_dir() {
        return Err(scan_err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "本地根路径不是目录",
        )));
    }
    let root = root.as_path();

    let mut tree = LocalTree::default();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry?;

        if entry.file_type().is_dir() {
            tree.dir_count += 1;
            continue;
        }

        let metadata = entry.metadata()?;
        let Some(relative_path) = relative_key(root, entry.path()) else {
            continue;
        };

        let modified_time = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);

        tree.files.insert(
            relative_path.clone(),
            FileRecord {
                relative_path,
                size: metadata.len(),
                modified_time,
                source: Some(entry.path().to_path_buf()),
            },
        );

        if tree.files.len() % PROGRESS_BATCH == 0 {
            debug!(
                "已扫描 {} 个文件, {} 个目录...",
                tree.files.len(),
                tree.dir_count
            );
        }
    }

    info!(
        "本地扫描完成: {} 个文件, {} 个目录",
        tree.files.len(),
        tree.dir_count
    );
    Ok(tree)
}

/// 单个远程子树的扫描结果，由调用方合并
#[derive(Default)]
struct RemoteSubtree {
    files: FileMap,
    dir_count: usize,
    unreadable: Vec<String>,
}

impl RemoteSubtree {
    fn merge(&mut self, other: RemoteSubtree) {
        let before = self.files.len();
        self.files.extend(other.files);
        self.dir_count += other.dir_count;
        self.unreadable.extend(other.unreadable);

        if before / PROGRESS_BATCH != self.files.len() / PROGRESS_BATCH {
            debug!(
                "已扫描远程 {} 个文件, {} 个目录...",
                self.files.len(),
                self.dir_count
            );
        }
    }
}

/// 递归列出一个远程目录
///
/// 列目录失败时该子树按空处理并记录下来，不中止整次扫描。
fn scan_remote_dir<'a>(
    transport: &'a dyn Transport,
    dir: String,
    base: String,
) -> BoxFuture<'a, RemoteSubtree> {
    async move {
        let mut subtree = RemoteSubtree::default();

        let entries = match transport.list(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("列出远程目录失败，按空目录处理: {} - {}", dir, e);
                subtree.unreadable.push(base);
                return subtree;
            }
        };
        subtree.dir_count += 1;

        for entry in entries {
            let relative_path = if base.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", base, entry.name)
            };

            if entry.is_dir() {
                let child = scan_remote_dir(transport, join_remote(&dir, &entry.name), relative_path).await;
                subtree.merge(child);
            } else {
                let mut single = RemoteSubtree::default();
                single.files.insert(
                    relative_path.clone(),
                    FileRecord {
                        relative_path,
                        size: entry.size,
                        modified_time: entry.modified_time,
                        source: None,
                    },
                );
                subtree.merge(single);
            }
        }

        subtree
    }
    .boxed()
}

/// 扫描远程目录
///
/// 根目录不存在时返回空树并标记 `root_exists = false`。
pub async fn scan_remote(transport: &dyn Transport, root: &str) -> Result<RemoteTree, SyncError> {
    info!("开始扫描远程目录: {} ({})", root, transport.name());

    let root_exists = transport.exists(root).await.map_err(SyncError::Transport)?;
    if !root_exists {
        info!("远程目录不存在，将在首次上传前创建: {}", root);
        return Ok(RemoteTree::default());
    }

    let subtree = scan_remote_dir(transport, root.to_string(), String::new()).await;

    if !subtree.unreadable.is_empty() {
        warn!(
            "{} 个远程目录无法列出，其中的文件将被视为不存在: {:?}",
            subtree.unreadable.len(),
            subtree.unreadable
        );
    }
    info!(
        "远程扫描完成: {} 个文件, {} 个目录",
        subtree.files.len(),
        subtree.dir_count
    );

    Ok(RemoteTree {
        files: subtree.files,
        dir_count: subtree.dir_count,
        root_exists: true,
        unreadable: subtree.unreadable,
    })
}
