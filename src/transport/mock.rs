//! 测试用内存传输：记录操作日志，可注入失败

use super::{remote_parent, EntryKind, RemoteEntry, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct MockTransport {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    ops: Mutex<Vec<String>>,
    connected: bool,
    pub connect_count: usize,
    pub disconnect_count: usize,
    pub fail_connect: bool,
    pub fail_upload: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub fail_list: HashSet<String>,
    pub fail_mkdir: HashSet<String>,
}

fn norm(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置远程文件（自动创建父目录）
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.insert_dirs(path);
        self.files
            .lock()
            .unwrap()
            .insert(norm(path), content.to_vec());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.insert_dirs(&format!("{}/x", norm(path)));
        self
    }

    fn insert_dirs(&self, file_path: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = remote_parent(file_path);
        while let Some(dir) = current {
            dirs.insert(norm(dir));
            if dir == "/" {
                break;
            }
            current = remote_parent(dir);
        }
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(&norm(path)).cloned()
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    fn check_connected(&self) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connect_count += 1;
        if self.fail_connect {
            return Err(TransportError::Connection("auth failed".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        self.check_connected()?;
        self.record(format!("exists {}", path));
        let key = norm(path);
        Ok(self.dirs.lock().unwrap().contains(&key) || self.files.lock().unwrap().contains_key(&key))
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        self.check_connected()?;
        self.record(format!("list {}", path));
        let key = norm(path);
        if self.fail_list.contains(&key) || !self.dirs.lock().unwrap().contains(&key) {
            return Err(TransportError::list(path, "no such directory"));
        }

        let mut entries = Vec::new();
        for dir in self.dirs.lock().unwrap().iter() {
            if dir != &key && remote_parent(dir).map(norm).as_deref() == Some(key.as_str()) {
                entries.push(RemoteEntry {
                    name: dir.rsplit('/').next().unwrap_or_default().to_string(),
                    kind: EntryKind::Dir,
                    size: 0,
                    modified_time: 0,
                });
            }
        }
        for (file, content) in self.files.lock().unwrap().iter() {
            if remote_parent(file).map(norm).as_deref() == Some(key.as_str()) {
                entries.push(RemoteEntry {
                    name: file.rsplit('/').next().unwrap_or_default().to_string(),
                    kind: EntryKind::File,
                    size: content.len() as u64,
                    modified_time: 1_700_000_000,
                });
            }
        }
        Ok(entries)
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), TransportError> {
        self.check_connected()?;
        self.record(format!("mkdir {}", path));
        let key = norm(path);
        if self.fail_mkdir.contains(&key) {
            return Err(TransportError::mkdir(path, "permission denied"));
        }
        if recursive {
            self.insert_dirs(&format!("{}/x", key));
        } else {
            let parent_ok = remote_parent(&key)
                .map(|p| self.dirs.lock().unwrap().contains(&norm(p)))
                .unwrap_or(true);
            if !parent_ok {
                return Err(TransportError::mkdir(path, "parent missing"));
            }
            self.dirs.lock().unwrap().insert(key);
        }
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.check_connected()?;
        self.record(format!("upload {}", remote));
        let key = norm(remote);
        if self.fail_upload.contains(&key) {
            return Err(TransportError::transfer(remote, "connection reset"));
        }
        let parent_ok = remote_parent(&key)
            .map(|p| self.dirs.lock().unwrap().contains(&norm(p)))
            .unwrap_or(true);
        if !parent_ok {
            return Err(TransportError::transfer(remote, "no such directory"));
        }
        let data = std::fs::read(local).map_err(|e| TransportError::transfer(remote, e))?;
        self.files.lock().unwrap().insert(key, data);
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
        self.check_connected()?;
        self.record(format!("download {}", remote));
        let data = self
            .file(remote)
            .ok_or_else(|| TransportError::transfer(remote, "no such file"))?;
        std::fs::write(local, data).map_err(|e| TransportError::transfer(remote, e))
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.check_connected()?;
        self.record(format!("delete {}", path));
        let key = norm(path);
        if self.fail_delete.contains(&key) {
            return Err(TransportError::transfer(path, "permission denied"));
        }
        self.files
            .lock()
            .unwrap()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| TransportError::transfer(path, "no such file"))
    }

    async fn disconnect(&mut self) {
        self.disconnect_count += 1;
        self.connected = false;
    }

    fn name(&self) -> &str {
        "mock"
    }
}
