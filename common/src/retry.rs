//! 指数バックオフ付きリトライ
//!
//! 待機処理は引数で受け取る（CLIは `tokio::time::sleep`、テストは記録用の関数）。

use std::future::Future;
use std::time::Duration;

use crate::error::RestoreFailure;

/// リトライ可否の判定
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for RestoreFailure {
    /// 通信エラー・5xx・408・429のみ再試行する
    fn is_retryable(&self) -> bool {
        match self {
            RestoreFailure::Network(_) => true,
            RestoreFailure::Http { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            RestoreFailure::Validation(_)
            | RestoreFailure::Auth(_)
            | RestoreFailure::Rejected(_)
            | RestoreFailure::MissingImage => false,
        }
    }
}

/// リトライ設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    /// 初回失敗後の待機時間。以降は倍々に増える
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// `attempt` 回目（0始まり）の失敗後に待つ時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// バックオフ表（デフォルトで 1s, 2s, 4s, 8s, 16s）
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|i| self.delay_for(i)).collect()
    }

    /// `op` を最大 `max_attempts` 回実行する
    ///
    /// - 成功したらその結果を即座に返す
    /// - リトライ不可のエラー、または最終試行のエラーはそのまま返す
    /// - `op` には試行番号（0始まり）を渡す。試行ごとに新しい呼び出しになる
    pub async fn run<T, E, Op, Fut, Sleep, SleepFut>(&self, mut op: Op, mut sleep: Sleep) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Sleep: FnMut(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt + 1 >= attempts || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "restore attempt failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky({})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    /// 待機時間を記録するだけのsleep
    fn recorder() -> (Arc<Mutex<Vec<Duration>>>, impl FnMut(Duration) -> std::future::Ready<()>) {
        let delays = Arc::new(Mutex::new(Vec::new()));
        let sink = delays.clone();
        let sleep = move |d: Duration| {
            sink.lock().unwrap().push(d);
            std::future::ready(())
        };
        (delays, sleep)
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[test]
    fn test_new_clamps_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_four_failures_then_success() {
        let policy = RetryPolicy::default();
        let (delays, sleep) = recorder();
        let calls = Arc::new(Mutex::new(0u32));

        let counter = calls.clone();
        let result = policy
            .run(
                move |attempt| {
                    *counter.lock().unwrap() += 1;
                    std::future::ready(if attempt < 4 { Err(Flaky(true)) } else { Ok("restored") })
                },
                sleep,
            )
            .await;

        assert_eq!(result, Ok("restored"));
        assert_eq!(*calls.lock().unwrap(), 5);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let (delays, sleep) = recorder();
        let result: Result<u32, Flaky> = RetryPolicy::default()
            .run(|_| std::future::ready(Ok(7)), sleep)
            .await;
        assert_eq!(result, Ok(7));
        assert!(delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error_unchanged() {
        let (delays, sleep) = recorder();
        let result: Result<(), RestoreFailure> = RetryPolicy::default()
            .run(
                |attempt| {
                    std::future::ready(Err(RestoreFailure::Http {
                        status: 503,
                        message: Some(format!("busy #{}", attempt)),
                    }))
                },
                sleep,
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            RestoreFailure::Http { status: 503, message: Some("busy #4".to_string()) }
        );
        assert_eq!(delays.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let (delays, sleep) = recorder();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let result: Result<(), Flaky> = RetryPolicy::default()
            .run(
                move |_| {
                    *counter.lock().unwrap() += 1;
                    std::future::ready(Err(Flaky(false)))
                },
                sleep,
            )
            .await;

        assert_eq!(result, Err(Flaky(false)));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(delays.lock().unwrap().is_empty());
    }

    #[test]
    fn test_restore_failure_retryability() {
        assert!(RestoreFailure::Network("reset".into()).is_retryable());
        assert!(RestoreFailure::Http { status: 500, message: None }.is_retryable());
        assert!(RestoreFailure::Http { status: 429, message: None }.is_retryable());
        assert!(!RestoreFailure::Http { status: 404, message: None }.is_retryable());
        assert!(!RestoreFailure::Validation("bad".into()).is_retryable());
        assert!(!RestoreFailure::Auth("no key".into()).is_retryable());
        assert!(!RestoreFailure::Rejected("quota exceeded".into()).is_retryable());
        assert!(!RestoreFailure::MissingImage.is_retryable());
    }
}
