//! 入力画像の収集
//!
//! ファイル指定はそのまま受け付け、フォルダ指定は画像拡張子のファイルだけを拾う。
//! 形式チェックはここではしない（非対応形式もタスクになり、送信前の検証で失敗する）。

use crate::error::{PhotoRestoreError, Result};
use photo_restore_common::SourceFile;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pub path: PathBuf,
    pub file_name: String,
}

impl InputImage {
    fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            file_name,
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// 判定できないときのMIMEタイプ
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// 入力パス（ファイル・フォルダ混在可）から画像一覧を作る
///
/// 引数の順序を保ち、フォルダ内はファイル名順に並べる。
pub fn scan_inputs(paths: &[PathBuf], recursive: bool) -> Result<Vec<InputImage>> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() {
            images.extend(scan_folder(path, recursive)?);
        } else if path.is_file() {
            images.push(InputImage::from_path(path));
        } else {
            return Err(PhotoRestoreError::FileNotFound(path.display().to_string()));
        }
    }

    Ok(images)
}

pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<InputImage>> {
    if !folder.exists() {
        return Err(PhotoRestoreError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut images: Vec<InputImage> = WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| is_image_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .map(|e| InputImage::from_path(e.path()))
        .collect();

    // ファイル名でソート（再帰時はパス順）
    images.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(images)
}

/// 拡張子からMIMEタイプを決める
pub fn mime_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// 拡張子 → 内容判定 → application/octet-stream の順でMIMEタイプを決める
pub fn mime_type_for(path: &Path, bytes: &[u8]) -> String {
    if let Some(mime) = mime_type_from_extension(path) {
        return mime.to_string();
    }

    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| UNKNOWN_MIME_TYPE.to_string())
}

/// ファイルを読み込んでタスクの元データにする
pub fn load_source(image: &InputImage) -> Result<SourceFile> {
    let bytes = std::fs::read(&image.path)?;
    let mime_type = mime_type_for(&image.path, &bytes);
    Ok(SourceFile::new(image.file_name.clone(), mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("jpeg"));
        assert!(is_image_extension("png"));
        assert!(is_image_extension("WebP"));
        assert!(!is_image_extension("txt"));
        assert!(!is_image_extension("gif"));
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"), false);
        assert!(matches!(result, Err(PhotoRestoreError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("c.jpg"), b"dummy").unwrap();
        fs::write(dir.path().join("a.PNG"), b"dummy").unwrap();
        fs::write(dir.path().join("b.webp"), b"dummy").unwrap();
        fs::write(dir.path().join("readme.txt"), b"text").unwrap();

        let result = scan_folder(dir.path(), false).unwrap();
        let names: Vec<&str> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.PNG", "b.webp", "c.jpg"]);
    }

    #[test]
    fn test_scan_folder_recursive() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("top.jpg"), b"x").unwrap();
        fs::write(sub.join("deep.jpg"), b"x").unwrap();

        assert_eq!(scan_folder(dir.path(), false).unwrap().len(), 1);
        assert_eq!(scan_folder(dir.path(), true).unwrap().len(), 2);
    }

    #[test]
    fn test_scan_inputs_accepts_any_file_as_given() {
        let dir = tempdir().unwrap();
        let gif = dir.path().join("old.gif");
        fs::write(&gif, b"GIF89a").unwrap();
        let folder = dir.path().join("album");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("1.jpg"), b"x").unwrap();

        let result = scan_inputs(&[gif.clone(), folder], false).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].path, gif);
        assert_eq!(result[1].file_name, "1.jpg");
    }

    #[test]
    fn test_scan_inputs_missing_file() {
        let result = scan_inputs(&[PathBuf::from("/nonexistent/photo.jpg")], false);
        assert!(matches!(result, Err(PhotoRestoreError::FileNotFound(_))));
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("a.JPG"), b""), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.webp"), b""), "image/webp");
        assert_eq!(mime_type_for(Path::new("a.gif"), b""), "image/gif");
        // 拡張子なしは内容から判定
        assert_eq!(mime_type_for(Path::new("scan"), PNG_MAGIC), "image/png");
        assert_eq!(mime_type_for(Path::new("notes.txt"), b"hello"), UNKNOWN_MIME_TYPE);
    }

    #[test]
    fn test_load_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("family.png");
        fs::write(&path, PNG_MAGIC).unwrap();

        let source = load_source(&InputImage::from_path(&path)).unwrap();
        assert_eq!(source.file_name, "family.png");
        assert_eq!(source.mime_type, "image/png");
        assert_eq!(&source.bytes[..], PNG_MAGIC);
    }
}
