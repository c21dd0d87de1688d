//! 应用配置模块
//!
//! 构建配置来自 `buildconfig.json`；远程凭据只从环境变量读取，不写入配置文件。

use crate::logging::LogConfig;
use crate::transport::join_remote;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 构建配置文件名
pub const CONFIG_FILE: &str = "buildconfig.json";

/// 默认的模块目录名
pub const DEFAULT_MODULE_NAME: &str = "foundryvtt-polish-localization";

/// 默认打包进模块的路径
pub const DEFAULT_STATIC_PATHS: &[&str] = &[
    "LICENSE",
    "module.json",
    "README.md",
    "fonts",
    "lang",
    "style.css",
];

/// 远程端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Sftp,
    /// 本地目录（挂载盘），`FTP_HOST` 作为根目录
    Fs,
}

/// `sftp` 配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub kind: RemoteKind,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 每个阶段内的并发操作数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// known_hosts 校验策略，为空时使用 opendal 默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_concurrency() -> usize {
    1
}

impl Default for SftpSection {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: RemoteKind::default(),
            port: default_port(),
            concurrency: default_concurrency(),
            known_hosts: None,
        }
    }
}

fn default_module_name() -> String {
    DEFAULT_MODULE_NAME.to_string()
}

fn default_static_paths() -> Vec<String> {
    DEFAULT_STATIC_PATHS.iter().map(|s| s.to_string()).collect()
}

/// 构建配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// 构建输出目录，为空时使用模块名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_path: Option<String>,
    #[serde(default = "default_module_name")]
    pub module_name: String,
    #[serde(default = "default_static_paths")]
    pub static_paths: Vec<String>,
    #[serde(default)]
    pub sftp: SftpSection,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_path: None,
            module_name: default_module_name(),
            static_paths: default_static_paths(),
            sftp: SftpSection::default(),
            log: LogConfig::default(),
        }
    }
}

impl BuildConfig {
    /// 从配置文件加载；文件不存在时使用默认配置，格式错误时报错
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("配置文件不存在，使用默认配置: {:?}", path);
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {:?}", path))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {:?}", path))?;
        Ok(config)
    }

    /// 构建目录：命令行参数 > buildPath > 模块名
    pub fn target_dir(&self, cli_target: Option<&Path>) -> PathBuf {
        cli_target
            .map(Path::to_path_buf)
            .or_else(|| self.build_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(&self.module_name))
    }
}

/// 远程连接参数（来自环境变量）
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub kind: RemoteKind,
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    /// 私钥路径
    pub key: Option<String>,
    pub known_hosts: Option<String>,
    /// 上传目标的父目录，模块目录位于其下
    pub remote_path: Option<String>,
    /// 下载源路径（文件或目录）
    pub source_path: Option<String>,
}

impl RemoteSettings {
    /// 从环境变量读取
    pub fn from_env(section: &SftpSection) -> Result<Self, Vec<&'static str>> {
        Self::from_lookup(section, |key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，缺失的必填变量会一并返回
    pub fn from_lookup(
        section: &SftpSection,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Vec<&'static str>> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let host = get("FTP_HOST");
        let user = get("FTP_USER");
        if section.kind == RemoteKind::Sftp {
            if host.is_none() {
                missing.push("FTP_HOST");
            }
            if user.is_none() {
                missing.push("FTP_USER");
            }
        }

        let port = match get("FTP_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    missing.push("FTP_PORT");
                    section.port
                }
            },
            None => section.port,
        };

        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(Self {
            kind: section.kind,
            host,
            port,
            user,
            key: get("FTP_KEY"),
            known_hosts: section.known_hosts.clone(),
            remote_path: get("FTP_REMOTE_PATH"),
            source_path: get("FTP_SOURCE_PATH"),
        })
    }

    /// 模块在远程的目录
    pub fn module_path(&self, module_name: &str) -> Option<String> {
        self.remote_path
            .as_deref()
            .map(|root| join_remote(root, module_name))
    }

    /// 下载源：FTP_SOURCE_PATH，否则 FTP_REMOTE_PATH
    pub fn download_source(&self) -> Option<&str> {
        self.source_path
            .as_deref()
            .or(self.remote_path.as_deref())
    }
}
