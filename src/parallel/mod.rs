// 並列列挙 - 要求関数・レーン・エンジン

pub mod claim;
pub mod engine;
mod lane;

pub use claim::CountdownClaim;
pub use engine::ParallelEnumerator;
