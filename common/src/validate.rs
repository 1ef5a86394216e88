//! 修復リクエストの入力検証
//!
//! クライアント（送信前）とエンドポイント（受信時）の両方で同じ規則を使う。

use crate::error::RestoreFailure;
use crate::types::RestoreRequest;

/// 対応MIMEタイプ
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// MIMEタイプ省略時のデフォルト
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// 元画像サイズの上限（20MB）
pub const MAX_IMAGE_SIZE_BYTES: usize = 20 * 1024 * 1024;

pub const MSG_MALFORMED_BODY: &str = "リクエストデータの形式が正しくありません";
pub const MSG_MISSING_DATA: &str = "画像データがないか、不正です";
pub const MSG_UNSUPPORTED_TYPE: &str = "JPG・PNG・WebP 形式の画像のみ対応しています";
pub const MSG_TOO_LARGE: &str = "画像が大きすぎます。20MB以内の画像をアップロードしてください";

/// 検証済みリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest<'a> {
    pub data: &'a str,
    pub mime_type: String,
    /// 前後の空白を除いたクライアント指定のAPIキー
    pub api_key: Option<&'a str>,
}

/// MIMEタイプを正規化して許可リストと照合
///
/// 空文字はデフォルト（image/jpeg）として扱う。大文字小文字は区別しない。
pub fn normalize_mime_type(mime_type: &str) -> Result<String, RestoreFailure> {
    let trimmed = mime_type.trim();
    let normalized = if trimmed.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    };

    if ALLOWED_MIME_TYPES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(RestoreFailure::Validation(MSG_UNSUPPORTED_TYPE.to_string()))
    }
}

/// Base64文字列長から元のバイト数を見積もる（len × 3/4）
pub fn estimate_decoded_size(base64_len: usize) -> usize {
    base64_len / 4 * 3 + (base64_len % 4) * 3 / 4
}

/// Base64ペイロードのサイズ上限チェック
///
/// `len × 3/4 > 上限` を端数を切り捨てずに比較する。
pub fn check_payload_size(base64_data: &str) -> Result<(), RestoreFailure> {
    if base64_data.len().saturating_mul(3) > MAX_IMAGE_SIZE_BYTES.saturating_mul(4) {
        return Err(RestoreFailure::Validation(MSG_TOO_LARGE.to_string()));
    }
    Ok(())
}

/// エンドポイントで受け取ったリクエストを検証
///
/// 検証順: 画像データ → MIMEタイプ → サイズ
pub fn validate_request(request: &RestoreRequest) -> Result<ValidatedRequest<'_>, RestoreFailure> {
    let data = request
        .data
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| RestoreFailure::Validation(MSG_MISSING_DATA.to_string()))?;

    let mime_type = normalize_mime_type(request.mime_type.as_deref().unwrap_or(""))?;
    check_payload_size(data)?;

    let api_key = request
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    Ok(ValidatedRequest {
        data,
        mime_type,
        api_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(data: Option<&str>, mime: Option<&str>) -> RestoreRequest {
        RestoreRequest {
            data: data.map(str::to_string),
            mime_type: mime.map(str::to_string),
            api_key: None,
        }
    }

    #[test]
    fn test_normalize_mime_type_allowed() {
        assert_eq!(normalize_mime_type("image/jpeg").unwrap(), "image/jpeg");
        assert_eq!(normalize_mime_type("IMAGE/PNG").unwrap(), "image/png");
        assert_eq!(normalize_mime_type(" image/webp ").unwrap(), "image/webp");
    }

    #[test]
    fn test_normalize_mime_type_defaults_to_jpeg() {
        assert_eq!(normalize_mime_type("").unwrap(), "image/jpeg");
    }

    #[test]
    fn test_normalize_mime_type_rejects_gif() {
        let err = normalize_mime_type("image/gif").unwrap_err();
        assert_eq!(err, RestoreFailure::Validation(MSG_UNSUPPORTED_TYPE.to_string()));
    }

    #[test]
    fn test_estimate_decoded_size() {
        assert_eq!(estimate_decoded_size(0), 0);
        assert_eq!(estimate_decoded_size(4), 3);
        assert_eq!(estimate_decoded_size(8), 6);
        assert_eq!(estimate_decoded_size(1_000_000), 750_000);
    }

    #[test]
    fn test_check_payload_size_boundary() {
        // ちょうど20MB相当は許可
        let at_limit = "A".repeat(MAX_IMAGE_SIZE_BYTES / 3 * 4);
        assert!(check_payload_size(&at_limit).is_ok());

        let over_limit = "A".repeat(MAX_IMAGE_SIZE_BYTES / 3 * 4 + 8);
        assert_eq!(
            check_payload_size(&over_limit).unwrap_err(),
            RestoreFailure::Validation(MSG_TOO_LARGE.to_string())
        );
    }

    #[test]
    fn test_check_payload_size_does_not_floor_fraction() {
        // 27,962,026 × 3/4 = 20,971,519.5 は上限以内
        let below = "A".repeat(27_962_026);
        assert!(check_payload_size(&below).is_ok());

        // 27,962,027 × 3/4 = 20,971,520.25 は上限超過
        let over = "A".repeat(27_962_027);
        assert_eq!(
            check_payload_size(&over).unwrap_err(),
            RestoreFailure::Validation(MSG_TOO_LARGE.to_string())
        );
    }

    #[test]
    fn test_validate_request_missing_data() {
        let err = validate_request(&request(None, Some("image/png"))).unwrap_err();
        assert_eq!(err.to_string(), MSG_MISSING_DATA);

        let err = validate_request(&request(Some("   "), Some("image/png"))).unwrap_err();
        assert_eq!(err.to_string(), MSG_MISSING_DATA);
    }

    #[test]
    fn test_validate_request_ok() {
        let mut req = request(Some("AAAA"), None);
        req.api_key = Some("  secret ".to_string());
        let validated = validate_request(&req).unwrap();
        assert_eq!(validated.data, "AAAA");
        assert_eq!(validated.mime_type, "image/jpeg");
        assert_eq!(validated.api_key, Some("secret"));
    }

    #[test]
    fn test_validate_request_blank_api_key_is_none() {
        let mut req = request(Some("AAAA"), Some("image/webp"));
        req.api_key = Some("   ".to_string());
        assert_eq!(validate_request(&req).unwrap().api_key, None);
    }
}
