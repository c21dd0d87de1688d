use serde::Serialize;

/// 同步运行的状态，按顺序推进，不会回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    Idle,
    ScanningLocal,
    ScanningRemote,
    Planning,
    Deleting,
    Uploading,
    Done,
}

/// 同步进度
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    /// 刚处理完的文件，阶段切换事件为空
    pub current_file: String,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

impl SyncProgress {
    /// 阶段切换事件
    pub fn phase(phase: SyncPhase, total: usize) -> Self {
        Self {
            phase,
            current_file: String::new(),
            completed: 0,
            total,
            failed: false,
        }
    }
}
