use super::{operator, RemoteEntry, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use opendal::Operator;
use std::path::Path;
use tracing::{debug, info};

/// SFTP 连接参数
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// 私钥路径；为空时交给 ssh-agent / 默认密钥
    pub key: Option<String>,
    /// known_hosts 校验策略: "strict" | "accept" | "add"
    pub known_hosts_strategy: Option<String>,
}

impl SftpConfig {
    fn endpoint(&self) -> String {
        format!("ssh://{}:{}", self.host, self.port)
    }
}

/// 基于 opendal sftp 服务的传输
pub struct SftpTransport {
    config: SftpConfig,
    operator: Option<Operator>,
    name: String,
}

impl SftpTransport {
    pub fn new(config: SftpConfig) -> Self {
        let name = format!("sftp://{}@{}:{}", config.user, config.host, config.port);
        Self {
            config,
            operator: None,
            name,
        }
    }

    fn operator(&self) -> Result<&Operator, TransportError> {
        self.operator.as_ref().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for SftpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        use opendal::services::Sftp;

        let mut builder = Sftp::default()
            .endpoint(&self.config.endpoint())
            .user(&self.config.user)
            .root("/");

        if let Some(ref key) = self.config.key {
            builder = builder.key(key);
        }
        if let Some(ref strategy) = self.config.known_hosts_strategy {
            builder = builder.known_hosts_strategy(strategy);
        }

        let op = operator::build_operator(builder)?;
        // opendal 懒连接，这里主动检查一次，认证失败在此暴露
        operator::check(&op).await?;

        info!("SFTP 连接成功: {}", self.name);
        self.operator = Some(op);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        operator::exists(self.operator()?, path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        operator::list(self.operator()?, path).await
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), TransportError> {
        operator::mkdir(self.operator()?, path, recursive).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        operator::upload(self.operator()?, local, remote).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
        operator::download(self.operator()?, remote, local).await
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        operator::delete(self.operator()?, path).await
    }

    async fn disconnect(&mut self) {
        if self.operator.take().is_some() {
            info!("SFTP 连接已关闭: {}", self.name);
        } else {
            debug!("SFTP 未连接，无需关闭");
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
