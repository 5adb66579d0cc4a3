// 列挙監視機能
// ライフサイクルのログ出力、進捗の集計

pub mod implementations;

// 公開API
pub use implementations::{ProgressCounter, TracingObserver};
