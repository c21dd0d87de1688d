use super::{operator, RemoteEntry, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use opendal::Operator;
use std::path::{Path, PathBuf};
use tracing::info;

/// 以本地目录（例如挂载的网络盘）作为远程端的传输
pub struct FsTransport {
    root: PathBuf,
    operator: Option<Operator>,
    name: String,
}

impl FsTransport {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let name = format!("fs:{}", root.display());
        Self {
            root,
            operator: None,
            name,
        }
    }

    fn operator(&self) -> Result<&Operator, TransportError> {
        self.operator.as_ref().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for FsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        use opendal::services::Fs;

        let root = self
            .root
            .to_str()
            .ok_or_else(|| TransportError::Config(format!("Invalid root path: {:?}", self.root)))?;
        let op = operator::build_operator(Fs::default().root(root))?;
        operator::check(&op).await?;

        info!("已打开本地目录传输: {}", self.name);
        self.operator = Some(op);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        operator::exists(self.operator()?, path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        // opendal fs 对不存在的目录返回空列表，这里按接口约定报错
        if !self.exists(path).await? {
            return Err(TransportError::list(path, "目录不存在"));
        }
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
        self.operator = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
