//! Photo Restore Common Library
//!
//! CLIとWeb(WASM)で共有されるタスクモデル・オーケストレータ・通信型
//!
//! I/Oやランタイムには依存しない。ネットワーク呼び出しは [`Restorer`]、
//! APIキーの読み出しは [`ApiKeySource`] として外から注入する。

pub mod data_url;
pub mod error;
pub mod orchestrator;
pub mod preview;
pub mod prompts;
pub mod retry;
pub mod task;
pub mod types;
pub mod validate;
pub mod view;

pub use error::{Error, FailureKind, RestoreFailure, Result};
pub use orchestrator::{
    ApiKeySource, BatchOutcome, BatchSummary, BulkOrchestrator, Restorer, RetryOutcome, StaticApiKey,
    TaskEvent, TaskListener,
};
pub use preview::{InMemoryPreviews, PreviewHandle, PreviewRegistry};
pub use prompts::RESTORE_PROMPT;
pub use retry::{RetryPolicy, Retryable};
pub use task::{SourceFile, Task, TaskId};
pub use types::{RestoreRequest, RestoreResponse, TaskStatus};
pub use validate::{ALLOWED_MIME_TYPES, MAX_IMAGE_SIZE_BYTES};
pub use view::{StatusCounts, TaskCard, ViewState};
