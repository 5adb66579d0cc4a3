// サービス層 - 列挙エンジンを支える周辺機能
// 各サービスは特定の責任を持ち、疎結合で設計されている

pub mod config;
pub mod monitoring;

// 公開API - 各サービスの主要機能を明示的にエクスポート
pub use config::DefaultParallelConfig;
pub use monitoring::{ProgressCounter, TracingObserver};
