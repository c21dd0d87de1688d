//! 源文件下载：远程 en.json -> 本地目录，并写入 download-log.json

use crate::error::SyncError;
use crate::transport::{join_remote, Transport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 默认下载目录
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloaded-source";
/// 下载日志文件名
pub const DOWNLOAD_LOG_FILE: &str = "download-log.json";
/// 源文件名
const SOURCE_FILE: &str = "en.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadedFile {
    pub remote: String,
    pub local: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadFailure {
    pub file: String,
    pub error: String,
}

/// 下载日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadLog {
    /// RFC 3339
    pub timestamp: String,
    pub downloaded: Vec<DownloadedFile>,
    pub errors: Vec<DownloadFailure>,
}

impl DownloadLog {
    fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            downloaded: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn write_to(&self, dir: &Path) -> Result<PathBuf, SyncError> {
        let path = dir.join(DOWNLOAD_LOG_FILE);
        let content = serde_json::to_string_pretty(self).map_err(|e| SyncError::Io {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        fs::write(&path, content).map_err(|source| SyncError::Io {
            path: path.clone(),
            source,
        })?;
        info!("下载日志已保存: {:?}", path);
        Ok(path)
    }
}

/// 以 `.json` 结尾视为文件本身，否则取目录下的 en.json
pub fn resolve_source_path(source: &str) -> String {
    if source.ends_with(".json") {
        source.to_string()
    } else {
        join_remote(source, SOURCE_FILE)
    }
}

/// 清空并重建输出目录
///
/// 输出目录若是 `protected`（当前工作目录）本身或其上级目录，拒绝清空。
fn prepare_dir(dir: &Path, protected: &Path) -> Result<(), SyncError> {
    let io_err = |source| SyncError::Io {
        path: dir.to_path_buf(),
        source,
    };

    if let (Ok(dir_abs), Ok(protected_abs)) = (fs::canonicalize(dir), fs::canonicalize(protected)) {
        if protected_abs.starts_with(&dir_abs) {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "输出目录包含当前工作目录，拒绝清空",
            )));
        }
    }

    if dir.exists() {
        fs::remove_dir_all(dir).map_err(io_err)?;
    }
    fs::create_dir_all(dir).map_err(io_err)
}

/// 下载源文件
///
/// 单个文件失败只记录在日志里；连接失败记为 `connection` 并返回错误。
/// 两种情况下日志都会写入，会话都会释放。
pub async fn download_sources(
    transport: &mut dyn Transport,
    source: &str,
    out_dir: &Path,
) -> Result<DownloadLog, SyncError> {
    let cwd = std::env::current_dir().map_err(|source| SyncError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    prepare_dir(out_dir, &cwd)?;
    let mut log = DownloadLog::new();

    info!("连接远程: {}", transport.name());
    if let Err(e) = transport.connect().await {
        error!("连接失败: {}", e);
        log.errors.push(DownloadFailure {
            file: "connection".to_string(),
            error: e.to_string(),
        });
        transport.disconnect().await;
        log.write_to(out_dir)?;
        return Err(SyncError::Connection(e));
    }

    let remote = resolve_source_path(source);
    let local = out_dir.join(SOURCE_FILE);
    info!("下载: {} -> {:?}", remote, local);

    match transport.download(&remote, &local).await {
        Ok(()) => log.downloaded.push(DownloadedFile {
            remote,
            local: local.to_string_lossy().into_owned(),
            success: true,
        }),
        Err(e) => {
            error!("下载失败 {}: {}", remote, e);
            log.errors.push(DownloadFailure {
                file: remote,
                error: e.to_string(),
            });
        }
    }
    transport.disconnect().await;

    info!(
        "下载完成: 成功 {}, 失败 {}",
        log.downloaded.len(),
        log.errors.len()
    );
    if !log.errors.is_empty() {
        warn!("部分文件下载失败，详见 {}", DOWNLOAD_LOG_FILE);
    }

    log.write_to(out_dir)?;
    Ok(log)
}
