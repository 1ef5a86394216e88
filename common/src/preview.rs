//! プレビュー資源の管理
//!
//! 元画像のプレビュー参照はタスクごとに1つ発行し、タスク削除時に
//! オーケストレータが [`PreviewRegistry::release`] で解放する。
//! ブラウザでは Object URL の発行/破棄に相当する。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::data_url::encode_data_url;

/// 表示可能なプレビュー参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
    reference: String,
}

impl PreviewHandle {
    pub fn new(id: u64, reference: impl Into<String>) -> Self {
        Self {
            id,
            reference: reference.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 画像ソースとしてそのまま使える参照
    pub fn as_str(&self) -> &str {
        &self.reference
    }
}

/// プレビュー参照の発行元
pub trait PreviewRegistry: Send + Sync {
    /// 元画像からプレビュー参照を発行
    fn create(&self, bytes: &[u8], mime_type: &str) -> PreviewHandle;

    /// 参照を解放する。二重解放は無視される
    fn release(&self, handle: &PreviewHandle);
}

/// メモリ上でData URLを保持するレジストリ
#[derive(Debug, Default)]
pub struct InMemoryPreviews {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, usize>>,
}

impl InMemoryPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未解放の参照数
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 未解放の参照が保持しているバイト数
    pub fn live_bytes(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.id)
    }
}

impl PreviewRegistry for InMemoryPreviews {
    fn create(&self, bytes: &[u8], mime_type: &str) -> PreviewHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = encode_data_url(mime_type, bytes);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, reference.len());
        PreviewHandle::new(id, reference)
    }

    fn release(&self, handle: &PreviewHandle) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);
        if removed.is_none() {
            tracing::debug!(preview = handle.id, "preview already released");
        }
    }
}
