//! 一括修復オーケストレータ
//!
//! タスクリストを唯一所有し、以下の操作だけがリストを変更する:
//! enqueue / remove / clear_all / retry / run_batch
//!
//! # 並行性
//! - 状態は `Mutex` で守るが、ロックは `.await` をまたいで保持しない
//! - 修復呼び出し中にタスクが削除されることがある。戻ってきた結果は捨てる
//! - 一括処理中フラグが唯一の排他。retry はこれを確認してから始める。
//!   remove / clear_all は一括処理中でも常に許可される
//!
//! # 一括処理の走査
//! 開始時点で done / processing のタスクは対象外。その後はステップごとに
//! 最新のリストを先頭から見て、まだ見ていないタスクを1件ずつ処理する。
//! そのため実行中に追加されたタスクも同じパスで処理される。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::RestoreFailure;
use crate::preview::PreviewRegistry;
use crate::task::{SourceFile, Task, TaskId};
use crate::types::TaskStatus;
use crate::view::ViewState;

/// 修復処理（外部サービス呼び出し）の境界
#[async_trait]
pub trait Restorer: Send + Sync {
    /// 元画像を修復し、表示可能な画像参照（Data URL）を返す
    async fn restore(&self, bytes: &[u8], mime_type: &str) -> Result<String, RestoreFailure>;
}

/// 保存済みAPIキーの読み出し
///
/// 呼び出しのたびに読み直す。キャッシュしない。
pub trait ApiKeySource: Send + Sync {
    fn current_api_key(&self) -> Option<String>;
}

/// 固定値のAPIキー（コマンドライン引数など）
#[derive(Debug, Clone, Default)]
pub struct StaticApiKey(pub Option<String>);

impl ApiKeySource for StaticApiKey {
    fn current_api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

/// タスクの状態変化通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Enqueued(TaskId),
    Processing(TaskId),
    Done(TaskId),
    Failed { id: TaskId, detail: String },
    /// 処理中に削除されたタスクの結果を破棄した
    Discarded(TaskId),
    Removed(TaskId),
    Cleared,
    BatchStarted,
    BatchFinished(BatchSummary),
}

pub type TaskListener = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// retry の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// 一括処理中のため拒否
    BatchActive,
    /// タスクが存在しない、または error ではない
    NotRetryable,
    Done,
    Failed,
    /// 処理中に削除された
    Discarded,
}

/// 一括処理1パスの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub discarded: usize,
    /// リストが空になり途中で終了した
    pub interrupted: bool,
}

/// run_batch の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 既に一括処理中のため何もしなかった
    AlreadyRunning,
    Finished(BatchSummary),
}

enum Landing {
    Done,
    Failed,
    Discarded,
}

enum Step {
    Next { id: TaskId, bytes: Arc<[u8]>, mime_type: String },
    Exhausted,
    Interrupted,
}

#[derive(Default)]
struct State {
    tasks: Vec<Task>,
    viewing: Option<TaskId>,
    /// 実行中の一括処理のトークン
    batch: Option<u64>,
    next_task_id: u64,
    next_batch: u64,
}

struct Shared {
    restorer: Arc<dyn Restorer>,
    previews: Arc<dyn PreviewRegistry>,
    listener: RwLock<Option<TaskListener>>,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 修復呼び出しが結果を返す前に破棄されたときのエラーメッセージ
pub const MSG_INTERRUPTED: &str = "処理が中断されました。再試行してください";

/// 修復呼び出し中のタスク
///
/// 呼び出しの future が結果を反映する前に破棄されたら、
/// processing のまま残らないよう error にする。
struct InFlight<'a> {
    orchestrator: &'a BulkOrchestrator,
    id: TaskId,
    landed: bool,
}

impl<'a> InFlight<'a> {
    fn new(orchestrator: &'a BulkOrchestrator, id: TaskId) -> Self {
        Self {
            orchestrator,
            id,
            landed: false,
        }
    }

    fn disarm(&mut self) {
        self.landed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        let failed = {
            let mut state = self.orchestrator.shared.lock();
            match state.tasks.iter_mut().find(|t| t.id() == self.id) {
                Some(task) if task.status() == TaskStatus::Processing => {
                    task.fail(MSG_INTERRUPTED.to_string()).is_ok()
                }
                _ => false,
            }
        };
        if failed {
            warn!(task = %self.id, "restore call dropped before completion");
            self.orchestrator.emit(TaskEvent::Failed {
                id: self.id,
                detail: MSG_INTERRUPTED.to_string(),
            });
        }
    }
}

/// 一括処理の終了時（キャンセル含む）にフラグを戻す
struct BatchGuard<'a> {
    shared: &'a Shared,
    token: u64,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state.batch == Some(self.token) {
            state.batch = None;
        }
    }
}

/// 一括修復オーケストレータ
///
/// `Clone` は同じタスクリストへのハンドルを複製する。
#[derive(Clone)]
pub struct BulkOrchestrator {
    shared: Arc<Shared>,
}

impl BulkOrchestrator {
    pub fn new(restorer: Arc<dyn Restorer>, previews: Arc<dyn PreviewRegistry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                restorer,
                previews,
                listener: RwLock::new(None),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// 状態変化の通知先を設定
    pub fn set_listener(&self, listener: TaskListener) {
        *self
            .shared
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// ファイルごとに pending タスクを末尾へ追加（入力順を保持）
    pub fn enqueue<I>(&self, files: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let ids: Vec<TaskId> = {
            let mut state = self.shared.lock();
            files
                .into_iter()
                .map(|file| {
                    state.next_task_id += 1;
                    let id = TaskId::new(state.next_task_id);
                    let preview = self.shared.previews.create(&file.bytes, &file.mime_type);
                    debug!(task = %id, file = %file.file_name, mime = %file.mime_type, "task enqueued");
                    state.tasks.push(Task::new(id, file, preview));
                    id
                })
                .collect()
        };

        for id in &ids {
            self.emit(TaskEvent::Enqueued(*id));
        }
        ids
    }

    /// タスクを削除してプレビューを解放
    ///
    /// 表示中のタスクなら表示参照も消す。処理中でも削除でき、
    /// その修復結果は戻ってきた時点で捨てられる。
    pub fn remove(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.shared.lock();
            let Some(pos) = state.tasks.iter().position(|t| t.id() == id) else {
                return false;
            };
            let task = state.tasks.remove(pos);
            if state.viewing == Some(id) {
                state.viewing = None;
            }
            if state.tasks.is_empty() && state.batch.take().is_some() {
                info!("task list emptied; batch pass ended");
            }
            task
        };

        self.shared.previews.release(removed.source_preview());
        debug!(task = %id, status = %removed.status(), "task removed");
        self.emit(TaskEvent::Removed(id));
        true
    }

    /// 全タスクを削除して表示参照を消す
    pub fn clear_all(&self) {
        let removed = {
            let mut state = self.shared.lock();
            state.viewing = None;
            if state.batch.take().is_some() {
                info!("task list cleared; batch pass ended");
            }
            std::mem::take(&mut state.tasks)
        };

        for task in &removed {
            self.shared.previews.release(task.source_preview());
        }
        debug!(count = removed.len(), "all tasks cleared");
        self.emit(TaskEvent::Cleared);
    }

    /// 表示するタスクを選択（pending は選択できない）
    pub fn select(&self, id: TaskId) -> bool {
        let mut state = self.shared.lock();
        let selectable = state
            .tasks
            .iter()
            .any(|t| t.id() == id && t.is_selectable());
        if selectable {
            state.viewing = Some(id);
        }
        selectable
    }

    pub fn clear_selection(&self) {
        self.shared.lock().viewing = None;
    }

    /// error のタスクを1件だけ再処理
    ///
    /// 一括処理中、またはタスクが error でない場合は何もしない。
    pub async fn retry(&self, id: TaskId) -> RetryOutcome {
        let (bytes, mime_type) = {
            let mut state = self.shared.lock();
            if state.batch.is_some() {
                debug!(task = %id, "retry rejected: batch pass active");
                return RetryOutcome::BatchActive;
            }
            let Some(task) = state.tasks.iter_mut().find(|t| t.id() == id) else {
                return RetryOutcome::NotRetryable;
            };
            if task.status() != TaskStatus::Error || task.begin_processing().is_err() {
                debug!(task = %id, status = %task.status(), "retry rejected");
                return RetryOutcome::NotRetryable;
            }
            (task.source().clone(), task.mime_type().to_string())
        };

        let mut in_flight = InFlight::new(self, id);
        self.emit(TaskEvent::Processing(id));
        let result = self.shared.restorer.restore(&bytes, &mime_type).await;
        let landing = self.land(id, result);
        in_flight.disarm();

        match landing {
            Landing::Done => RetryOutcome::Done,
            Landing::Failed => RetryOutcome::Failed,
            Landing::Discarded => RetryOutcome::Discarded,
        }
    }

    /// pending / error のタスクを先頭から1件ずつ処理
    ///
    /// 既に実行中なら何もしない。個々のタスクの失敗はタスクに記録され、
    /// このメソッド自体は失敗しない。
    pub async fn run_batch(&self) -> BatchOutcome {
        let (token, mut visited) = {
            let mut state = self.shared.lock();
            if state.batch.is_some() {
                debug!("batch rejected: already running");
                return BatchOutcome::AlreadyRunning;
            }
            state.next_batch += 1;
            let token = state.next_batch;
            state.batch = Some(token);

            let skipped: HashSet<TaskId> = state
                .tasks
                .iter()
                .filter(|t| !t.is_eligible_for_batch())
                .map(Task::id)
                .collect();
            (token, skipped)
        };
        let _guard = BatchGuard {
            shared: &self.shared,
            token,
        };

        info!(batch = token, "batch pass started");
        self.emit(TaskEvent::BatchStarted);

        let mut summary = BatchSummary::default();
        loop {
            let step = {
                let mut state = self.shared.lock();
                if state.batch != Some(token) {
                    Step::Interrupted
                } else {
                    state
                        .tasks
                        .iter_mut()
                        .filter(|t| visited.insert(t.id()))
                        .find_map(|task| {
                            task.begin_processing().ok().map(|_| Step::Next {
                                id: task.id(),
                                bytes: task.source().clone(),
                                mime_type: task.mime_type().to_string(),
                            })
                        })
                        .unwrap_or(Step::Exhausted)
                }
            };

            let (id, bytes, mime_type) = match step {
                Step::Next { id, bytes, mime_type } => (id, bytes, mime_type),
                Step::Exhausted => break,
                Step::Interrupted => {
                    summary.interrupted = true;
                    break;
                }
            };

            let mut in_flight = InFlight::new(self, id);
            self.emit(TaskEvent::Processing(id));
            let result = self.shared.restorer.restore(&bytes, &mime_type).await;
            let landing = self.land(id, result);
            in_flight.disarm();

            summary.processed += 1;
            match landing {
                Landing::Done => summary.succeeded += 1,
                Landing::Failed => summary.failed += 1,
                Landing::Discarded => summary.discarded += 1,
            }
        }

        info!(
            batch = token,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            discarded = summary.discarded,
            interrupted = summary.interrupted,
            "batch pass finished"
        );
        self.emit(TaskEvent::BatchFinished(summary));
        BatchOutcome::Finished(summary)
    }

    /// 修復結果をタスクに反映。タスクが既にない場合は捨てる
    fn land(&self, id: TaskId, result: Result<String, RestoreFailure>) -> Landing {
        let (landing, event) = {
            let mut state = self.shared.lock();
            match state.tasks.iter_mut().find(|t| t.id() == id) {
                None => (Landing::Discarded, TaskEvent::Discarded(id)),
                Some(task) => match result {
                    Ok(restored) => match task.complete(restored) {
                        Ok(()) => (Landing::Done, TaskEvent::Done(id)),
                        Err(e) => {
                            warn!(task = %id, error = %e, "restored result dropped");
                            (Landing::Discarded, TaskEvent::Discarded(id))
                        }
                    },
                    Err(failure) => {
                        let detail = failure.to_string();
                        warn!(task = %id, kind = ?failure.kind(), error = %detail, "restore failed");
                        match task.fail(detail.clone()) {
                            Ok(()) => (Landing::Failed, TaskEvent::Failed { id, detail }),
                            Err(e) => {
                                warn!(task = %id, error = %e, "failure dropped");
                                (Landing::Discarded, TaskEvent::Discarded(id))
                            }
                        }
                    }
                },
            }
        };

        match &event {
            TaskEvent::Discarded(_) => debug!(task = %id, "task no longer listed; result discarded"),
            TaskEvent::Done(_) => debug!(task = %id, "task restored"),
            _ => {}
        }
        self.emit(event);
        landing
    }

    fn emit(&self, event: TaskEvent) {
        let listener = self
            .shared
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(&event);
        }
    }

    /// 現在の画面状態
    pub fn view(&self) -> ViewState {
        let state = self.shared.lock();
        ViewState::project(&state.tasks, state.viewing, state.batch.is_some())
    }

    /// タスクリストのスナップショット
    pub fn tasks(&self) -> Vec<Task> {
        self.shared.lock().tasks.clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.shared.lock().tasks.iter().find(|t| t.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().tasks.is_empty()
    }

    pub fn is_batch_active(&self) -> bool {
        self.shared.lock().batch.is_some()
    }

    pub fn viewing(&self) -> Option<TaskId> {
        self.shared.lock().viewing
    }
}
