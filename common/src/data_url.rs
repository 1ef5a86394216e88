//! Data URLユーティリティ
//!
//! `data:<mime>;base64,<data>` 形式の生成・分解・デコード

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Data URLからBase64データ部分を抽出
///
/// # Arguments
/// * `data_url` - "data:image/jpeg;base64,/9j/4AAQ..." 形式のData URL
///
/// # Returns
/// Base64エンコードされたデータ部分、または抽出失敗時はNone
pub fn extract_base64_from_data_url(data_url: &str) -> Option<&str> {
    data_url.split(',').nth(1)
}

/// Data URLからMIMEタイプを抽出
///
/// 抽出できない場合は "image/png" を返す（モデル出力のデフォルト）
pub fn extract_mime_type_from_data_url(data_url: &str) -> &str {
    data_url
        .strip_prefix("data:")
        .and_then(|s| s.split(';').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("image/png")
}

/// Base64データからData URLを生成
pub fn build_data_url(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// バイト列をData URLに変換
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    build_data_url(mime_type, &STANDARD.encode(bytes))
}

/// Data URLをデコードして (MIMEタイプ, バイト列) を返す
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    if !data_url.starts_with("data:") || !data_url.contains(";base64,") {
        return Err(Error::InvalidDataUrl(truncate(data_url)));
    }

    let data = extract_base64_from_data_url(data_url)
        .ok_or_else(|| Error::InvalidDataUrl(truncate(data_url)))?;
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| Error::InvalidDataUrl(e.to_string()))?;

    Ok((extract_mime_type_from_data_url(data_url).to_string(), bytes))
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_base64_from_data_url_jpeg() {
        let data_url = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";
        assert_eq!(extract_base64_from_data_url(data_url), Some("/9j/4AAQSkZJRg=="));
    }

    #[test]
    fn test_extract_base64_from_data_url_invalid() {
        assert_eq!(extract_base64_from_data_url("not a data url"), None);
        assert_eq!(extract_base64_from_data_url(""), None);
    }

    #[test]
    fn test_extract_mime_type() {
        assert_eq!(extract_mime_type_from_data_url("data:image/webp;base64,UklGR"), "image/webp");
        assert_eq!(extract_mime_type_from_data_url("invalid"), "image/png");
        assert_eq!(extract_mime_type_from_data_url("data:;base64,AAAA"), "image/png");
    }

    #[test]
    fn test_encode_data_url() {
        assert_eq!(encode_data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_decode_data_url() {
        let (mime, bytes) = decode_data_url("data:image/jpeg;base64,YWJj").unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_decode_data_url_rejects_plain_url() {
        let err = decode_data_url("https://example.com/a.png").unwrap_err();
        assert!(matches!(err, Error::InvalidDataUrl(_)));
    }

    #[test]
    fn test_decode_data_url_rejects_bad_base64() {
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }
}
