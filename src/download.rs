//! 修復済み画像の保存
//!
//! 保存名は `Restored_<元のファイル名の拡張子なし>.<修復画像の形式>`。
//! 同名ファイルがあれば `_1`, `_2` … を付ける。

use std::path::{Path, PathBuf};

use photo_restore_common::data_url::decode_data_url;
use photo_restore_common::{BulkOrchestrator, TaskStatus};
use tracing::{debug, warn};

use crate::error::Result;

pub const RESTORED_PREFIX: &str = "Restored_";

/// MIMEタイプから拡張子を決める
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn restored_file_name(original: &str, mime_type: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}{}.{}", RESTORED_PREFIX, stem, extension_for_mime(mime_type))
}

/// 既存ファイルと衝突しないパス
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = path.extension().map(|s| s.to_string_lossy().to_string());

    (1..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Data URLをデコードしてファイルに保存
pub fn save_restored(dir: &Path, original_name: &str, data_url: &str) -> Result<PathBuf> {
    let (mime_type, bytes) = decode_data_url(data_url)?;
    std::fs::create_dir_all(dir)?;

    let path = unique_path(dir, &restored_file_name(original_name, &mime_type));
    std::fs::write(&path, bytes)?;
    debug!(path = %path.display(), mime_type = %mime_type, "restored image saved");
    Ok(path)
}

/// 保存できなかったタスク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub file_name: String,
    pub reason: String,
}

/// 一括保存の結果
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<DownloadFailure>,
}

/// 完了済みタスクをすべて保存
///
/// 1件ずつ保存し、失敗したタスクは記録して残りを続ける。
pub fn download_all_finished(orchestrator: &BulkOrchestrator, dir: &Path) -> Result<DownloadReport> {
    std::fs::create_dir_all(dir)?;

    let mut report = DownloadReport::default();
    for task in orchestrator.tasks() {
        if task.status() != TaskStatus::Done {
            continue;
        }
        let Some(data_url) = task.restored_preview() else {
            continue;
        };
        match save_restored(dir, task.file_name(), data_url) {
            Ok(path) => report.saved.push(path),
            Err(e) => {
                warn!(file = %task.file_name(), error = %e, "failed to save restored image");
                report.failed.push(DownloadFailure {
                    file_name: task.file_name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}
