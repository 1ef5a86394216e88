//! 画面状態の導出
//!
//! タスクリスト・表示中ID・一括処理フラグから画面に必要な値を計算する。
//! タスクリストは読むだけで変更しない。

use crate::task::{Task, TaskId};
use crate::types::TaskStatus;

/// 状態別の件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.done + self.error
    }
}

/// キュー1行分の表示内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: TaskId,
    pub file_name: String,
    pub status: TaskStatus,
    pub source_preview: String,
    pub restored_preview: Option<String>,
    pub error_detail: Option<String>,
    pub selected: bool,
    /// done / error / processing のみ選択できる
    pub selectable: bool,
    /// error かつ一括処理中でない
    pub can_retry: bool,
}

impl TaskCard {
    fn from_task(task: &Task, viewing: Option<TaskId>, batch_active: bool) -> Self {
        let status = task.status();
        Self {
            id: task.id(),
            file_name: task.file_name().to_string(),
            status,
            source_preview: task.source_preview().as_str().to_string(),
            restored_preview: task.restored_preview().map(str::to_string),
            error_detail: task.error_detail().map(str::to_string),
            selected: viewing == Some(task.id()),
            selectable: task.is_selectable(),
            can_retry: status == TaskStatus::Error && !batch_active,
        }
    }
}

/// 画面状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub cards: Vec<TaskCard>,
    /// 表示中のタスク（削除済み・未選択なら None）
    pub active_task: Option<TaskCard>,
    pub counts: StatusCounts,
    /// done が1件以上（一括ダウンロード可能）
    pub has_finished_tasks: bool,
    /// pending が1件以上（一括処理を開始できる）
    pub has_pending_tasks: bool,
    pub is_bulk_processing: bool,
}

impl ViewState {
    pub fn project(tasks: &[Task], viewing: Option<TaskId>, batch_active: bool) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            match task.status() {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Error => counts.error += 1,
            }
        }

        let cards: Vec<TaskCard> = tasks
            .iter()
            .map(|t| TaskCard::from_task(t, viewing, batch_active))
            .collect();
        let active_task = cards.iter().find(|c| c.selected).cloned();

        Self {
            cards,
            active_task,
            counts,
            has_finished_tasks: counts.done > 0,
            has_pending_tasks: counts.pending > 0,
            is_bulk_processing: batch_active,
        }
    }

    pub fn total(&self) -> usize {
        self.cards.len()
    }

    /// 「修復開始」ボタンを押せるか
    pub fn can_start_batch(&self) -> bool {
        self.has_pending_tasks && !self.is_bulk_processing
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
