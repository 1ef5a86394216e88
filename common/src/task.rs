//! 修復タスクのデータ構造と状態遷移
//!
//! ```text
//! pending ──▶ processing ──▶ done
//!                 │  ▲
//!                 ▼  │ (retry)
//!               error
//! ```
//!
//! 修復結果は `Done`、エラー内容は `Error` の中にだけ存在するため、
//! 「restored があるのは done のときだけ」「error_detail があるのは error のときだけ」
//! が型で保証される。

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::preview::PreviewHandle;
use crate::types::TaskStatus;

/// タスクID（リスト内で一意、再利用しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// 取り込まれた元画像
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskState {
    Pending,
    Processing,
    Done { restored: String },
    Error { detail: String },
}

/// 修復タスク1件
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    file_name: String,
    mime_type: String,
    source: Arc<[u8]>,
    source_preview: PreviewHandle,
    state: TaskState,
}

impl Task {
    pub fn new(id: TaskId, file: SourceFile, source_preview: PreviewHandle) -> Self {
        Self {
            id,
            file_name: file.file_name,
            mime_type: file.mime_type,
            source: file.bytes,
            source_preview,
            state: TaskState::Pending,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// 元画像のバイト列（作成後は変更されない）
    pub fn source(&self) -> &Arc<[u8]> {
        &self.source
    }

    pub fn source_preview(&self) -> &PreviewHandle {
        &self.source_preview
    }

    pub fn status(&self) -> TaskStatus {
        match self.state {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Processing => TaskStatus::Processing,
            TaskState::Done { .. } => TaskStatus::Done,
            TaskState::Error { .. } => TaskStatus::Error,
        }
    }

    /// 修復後の画像（done のときのみ）
    pub fn restored_preview(&self) -> Option<&str> {
        match &self.state {
            TaskState::Done { restored } => Some(restored),
            _ => None,
        }
    }

    /// エラー内容（error のときのみ）
    pub fn error_detail(&self) -> Option<&str> {
        match &self.state {
            TaskState::Error { detail } => Some(detail),
            _ => None,
        }
    }

    /// 一括処理の対象になるか（pending / error）
    pub fn is_eligible_for_batch(&self) -> bool {
        matches!(self.state, TaskState::Pending | TaskState::Error { .. })
    }

    /// プレビュー表示の対象になるか（pending 以外）
    pub fn is_selectable(&self) -> bool {
        !matches!(self.state, TaskState::Pending)
    }

    /// pending / error → processing（エラー内容はここで消える）
    pub fn begin_processing(&mut self) -> Result<()> {
        match self.state {
            TaskState::Pending | TaskState::Error { .. } => {
                self.state = TaskState::Processing;
                Ok(())
            }
            _ => Err(self.invalid(TaskStatus::Processing)),
        }
    }

    /// processing → done
    pub fn complete(&mut self, restored: String) -> Result<()> {
        match self.state {
            TaskState::Processing => {
                self.state = TaskState::Done { restored };
                Ok(())
            }
            _ => Err(self.invalid(TaskStatus::Done)),
        }
    }

    /// processing → error
    pub fn fail(&mut self, detail: String) -> Result<()> {
        match self.state {
            TaskState::Processing => {
                self.state = TaskState::Error { detail };
                Ok(())
            }
            _ => Err(self.invalid(TaskStatus::Error)),
        }
    }

    fn invalid(&self, to: TaskStatus) -> Error {
        Error::InvalidTransition {
            from: self.status(),
            to,
        }
    }
}
