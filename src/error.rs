//! 错误类型
//!
//! 扫描、连接错误是致命的；单个文件的传输 / 建目录错误只计数，不中断批次。

use std::path::PathBuf;
use thiserror::Error;

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 认证或网络失败，无法建立会话
    #[error("连接失败: {0}")]
    Connection(String),

    #[error("传输会话尚未建立")]
    NotConnected,

    /// 列目录失败（路径不存在或无权限）
    #[error("列出目录失败 {path}: {reason}")]
    List { path: String, reason: String },

    #[error("创建目录失败 {path}: {reason}")]
    Mkdir { path: String, reason: String },

    /// 上传 / 下载 / 删除单个文件失败
    #[error("传输失败 {path}: {reason}")]
    Transfer { path: String, reason: String },

    #[error("传输配置无效: {0}")]
    Config(String),
}

impl TransportError {
    pub fn list(path: &str, reason: impl ToString) -> Self {
        Self::List {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn mkdir(path: &str, reason: impl ToString) -> Self {
        Self::Mkdir {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn transfer(path: &str, reason: impl ToString) -> Self {
        Self::Transfer {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// 同步流程中会中止整次运行的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 本地目录不可读，中止整次同步
    #[error("扫描本地目录失败 {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Connection(TransportError),

    #[error("远程操作失败: {0}")]
    Transport(#[source] TransportError),

    /// 本地输出目录或日志文件写入失败
    #[error("本地 IO 错误 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<walkdir::Error> for SyncError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("符号链接循环"));
        SyncError::Scan { path, source }
    }
}

/// 打包（构建模块目录）错误
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("发现 {} 个无效的 JSON 文件", .0.len())]
    InvalidJson(Vec<InvalidJsonFile>),

    #[error("IO 错误 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 单个无效 JSON 文件及其解析错误
#[derive(Debug, Clone)]
pub struct InvalidJsonFile {
    pub path: PathBuf,
    pub message: String,
}
