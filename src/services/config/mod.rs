// 設定管理機能
// 並列列挙のレーン数・失敗の報告方法

pub mod implementations;

pub use implementations::DefaultParallelConfig;
