use crate::error::{PhotoRestoreError, Result};
use photo_restore_common::{ApiKeySource, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 修復エンドポイントのデフォルト
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787/api/restore";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// クライアント側で保存したAPIキー（リクエストに添付）
    pub api_key: Option<String>,
    /// サーバー側のGemini APIキー（GEMINI_API_KEY が優先）
    pub gemini_api_key: Option<String>,
    pub endpoint: String,
    pub listen_addr: String,
    pub model: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            gemini_api_key: None,
            endpoint: DEFAULT_ENDPOINT.into(),
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
            model: DEFAULT_MODEL.into(),
            max_attempts: 5,
            base_delay_ms: 1000,
            timeout_seconds: 120,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（なければデフォルト）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PhotoRestoreError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photo-restore").join("config.json"))
    }

    /// 修復エンドポイント（環境変数 PHOTO_RESTORE_ENDPOINT を優先）
    pub fn endpoint(&self) -> String {
        std::env::var("PHOTO_RESTORE_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.endpoint.clone())
    }

    /// サーバー側のGemini APIキー（環境変数を優先）
    pub fn server_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| self.gemini_api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// APIキーの保存先
///
/// 値は設定ファイルの `api_key` に保存し、読み出しのたびにファイルを読み直す。
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Config::config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// APIキーを保存。前後の空白は除き、空文字なら削除する
    pub fn save(&self, key: &str) -> Result<()> {
        let mut config = Config::load_from(&self.path)?;
        let trimmed = key.trim();
        config.api_key = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        config.save_to(&self.path)
    }

    pub fn clear(&self) -> Result<()> {
        self.save("")
    }

    pub fn load(&self) -> Result<Option<String>> {
        let config = Config::load_from(&self.path)?;
        Ok(config
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }
}

impl ApiKeySource for KeyStore {
    fn current_api_key(&self) -> Option<String> {
        match self.load() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read stored api key");
                None
            }
        }
    }
}
