pub mod fs;
#[cfg(test)]
pub(crate) mod mock;
mod operator;
pub mod sftp;

use crate::config::{RemoteKind, RemoteSettings};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use fs::FsTransport;
pub use sftp::{SftpConfig, SftpTransport};

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- 上传、下载
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// 列目录返回的单个条目（不递归）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified_time: i64,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// 远程文件传输接口
///
/// 一个实例对应一个会话：`connect` 之后才能调用其它操作，
/// `disconnect` 在任何状态下调用都是安全的。路径均为 `/` 分隔。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 建立会话，认证或网络失败返回 `TransportError::Connection`
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// 路径（文件或目录）是否存在
    async fn exists(&self, path: &str) -> Result<bool, TransportError>;

    /// 列出目录的直接子项，目录不存在时报错
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError>;

    /// 创建目录，已存在时不报错
    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), TransportError>;

    /// 上传本地文件到远程路径（父目录须已存在）
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError>;

    /// 下载远程文件到本地路径
    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError>;

    /// 删除远程文件，文件不存在或无权限时报错
    async fn delete(&self, path: &str) -> Result<(), TransportError>;

    /// 释放会话
    async fn disconnect(&mut self);

    /// 获取传输名称（用于日志）
    fn name(&self) -> &str;
}

/// 拼接远程路径：`join_remote("/srv/mod", "lang/en.json")` -> `/srv/mod/lang/en.json`
pub fn join_remote(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else if relative.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, relative)
    }
}

/// 远程路径的父目录，没有父目录时返回 None
pub fn remote_parent(path: &str) -> Option<&str> {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// 根据配置创建传输实例（未连接）
pub fn create_transport(settings: &RemoteSettings) -> Result<Box<dyn Transport>, TransportError> {
    match settings.kind {
        RemoteKind::Sftp => {
            let host = settings
                .host
                .as_ref()
                .ok_or_else(|| TransportError::Config("SFTP requires host".to_string()))?;
            let user = settings
                .user
                .as_ref()
                .ok_or_else(|| TransportError::Config("SFTP requires user".to_string()))?;
            tracing::info!("创建 SFTP 传输: {}@{}:{}", user, host, settings.port);
            Ok(Box::new(SftpTransport::new(SftpConfig {
                host: host.clone(),
                port: settings.port,
                user: user.clone(),
                key: settings.key.clone(),
                known_hosts_strategy: settings.known_hosts.clone(),
            })))
        }
        RemoteKind::Fs => {
            let root = settings.host.as_deref().unwrap_or("/");
            tracing::info!("创建本地目录传输: root={}", root);
            Ok(Box::new(FsTransport::new(root)))
        }
    }
}
