//! 基于 opendal Operator 的通用远程操作，SFTP 与本地目录传输共用

use super::{EntryKind, RemoteEntry, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::TransportError;
use opendal::layers::TimeoutLayer;
use opendal::{Builder, ErrorKind, Metakey, Operator};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 构建带超时层的 Operator
pub(crate) fn build_operator<B: Builder>(builder: B) -> Result<Operator, TransportError> {
    let operator = Operator::new(builder)
        .map_err(|e| TransportError::Config(e.to_string()))?
        .layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        )
        .finish();
    Ok(operator)
}

/// 文件路径：去掉开头的 `/`（Operator 的 root 已经是 `/`）
fn file_key(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// 目录路径：opendal 要求以 `/` 结尾
fn dir_key(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", path)
    }
}

/// 连接检查：列一次根目录
pub(crate) async fn check(operator: &Operator) -> Result<(), TransportError> {
    operator
        .check()
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))
}

pub(crate) async fn exists(operator: &Operator, path: &str) -> Result<bool, TransportError> {
    // 不知道是文件还是目录，两种形式都试一次
    for key in [file_key(path), dir_key(path)] {
        match operator.stat(&key).await {
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(TransportError::transfer(path, e)),
        }
    }
    Ok(false)
}

pub(crate) async fn list(operator: &Operator, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
    let dir = dir_key(path);
    let entries = operator
        .list_with(&dir)
        .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
        .await
        .map_err(|e| TransportError::list(path, e))?;

    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        // 跳过目录自身
        if entry.path() == dir || entry.path() == "/" {
            continue;
        }
        let name = entry.name().trim_end_matches('/').to_string();
        if name.is_empty() {
            continue;
        }

        let meta = entry.metadata();
        let kind = if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        result.push(RemoteEntry {
            name,
            kind,
            size: if kind == EntryKind::Dir {
                0
            } else {
                meta.content_length()
            },
            modified_time: meta.last_modified().map_or(0, |t| t.timestamp()),
        });
    }

    Ok(result)
}

pub(crate) async fn mkdir(operator: &Operator, path: &str, recursive: bool) -> Result<(), TransportError> {
    let target = dir_key(path);
    if target == "/" {
        return Ok(());
    }

    if recursive {
        // 逐级创建父目录，中间层的错误忽略（可能已存在），只以最后一级为准
        let parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = String::new();
        for part in &parts[..parts.len().saturating_sub(1)] {
            current.push_str(part);
            current.push('/');
            if let Err(e) = operator.create_dir(&current).await {
                debug!("创建中间目录失败（忽略）: {} - {}", current, e);
            }
        }
    }

    operator
        .create_dir(&target)
        .await
        .map_err(|e| TransportError::mkdir(path, e))
}

pub(crate) async fn upload(operator: &Operator, local: &Path, remote: &str) -> Result<(), TransportError> {
    let data = tokio::fs::read(local)
        .await
        .map_err(|e| TransportError::transfer(remote, format!("读取本地文件 {:?} 失败: {}", local, e)))?;

    operator
        .write(&file_key(remote), data)
        .await
        .map_err(|e| TransportError::transfer(remote, e))?;
    Ok(())
}

pub(crate) async fn download(operator: &Operator, remote: &str, local: &Path) -> Result<(), TransportError> {
    let data = operator
        .read(&file_key(remote))
        .await
        .map_err(|e| TransportError::transfer(remote, e))?;

    if let Some(parent) = local.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TransportError::transfer(remote, e))?;
    }
    tokio::fs::write(local, data.to_vec())
        .await
        .map_err(|e| TransportError::transfer(remote, format!("写入本地文件 {:?} 失败: {}", local, e)))
}

pub(crate) async fn delete(operator: &Operator, path: &str) -> Result<(), TransportError> {
    let key = file_key(path);
    // opendal 删除不存在的文件不会报错，这里按接口约定报错
    match operator.stat(&key).await {
        Ok(meta) if meta.is_dir() => {
            return Err(TransportError::transfer(path, "目标是目录"));
        }
        Ok(_) => {}
        Err(e) => return Err(TransportError::transfer(path, e)),
    }

    operator
        .delete(&key)
        .await
        .map_err(|e| TransportError::transfer(path, e))
}
