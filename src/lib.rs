//! 非同期シーケンス列挙エンジン
//!
//! - [`sequential`]: トークンで一度だけ取り出せる逐次列挙子とリセット
//! - [`observable`]: ライフサイクルイベントを発行する逐次列挙子
//! - [`parallel`]: 要求関数・取得関数・コールバックによる並列列挙
//!
//! ```
//! use async_enum::{enumerate_sequentially, IterSource, SequentialEnumerator};
//! use futures::FutureExt;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let enumerator = SequentialEnumerator::new(IterSource::new(vec![1, 2, 3]));
//!
//! let mut seen = Vec::new();
//! let count = enumerate_sequentially(&enumerator, &cancel, |item| seen.push(item))
//!     .now_or_never()
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(count, 3);
//! assert_eq!(seen, vec![1, 2, 3]);
//! ```

pub mod core;
pub mod observable;
pub mod parallel;
pub mod sequential;
pub mod services;
pub mod sources;

// 公開API - よく使う型をクレートルートから直接使えるようにする
pub use crate::core::{
    AsyncEnumerator, EnumerationError, EnumerationResult, EnumeratorState, FailureMode, Operation,
    ParallelConfig, ParallelSummary, ProducerStage, ResetOutcome, SequenceCleanup, SequenceSource,
    SequenceStep, Started, Token,
};
pub use observable::{
    EnumerationEnded, EnumerationItem, EnumerationStarted, ListenerId, ObservableEnumerator,
    ObservationListeners,
};
pub use parallel::{CountdownClaim, ParallelEnumerator};
pub use sequential::{
    enumerate_sequentially, EnumerationHooks, Int32Cell, Int64Cell, NoHooks, ObjectCell,
    SequentialEnumerator, ValueCell, WithMetadata,
};
pub use services::{DefaultParallelConfig, ProgressCounter, TracingObserver};
pub use sources::IterSource;
