// 統合テスト
// tests/integration 配下の各シナリオを一つのテストバイナリにまとめる

#[path = "../fixtures/mod.rs"]
mod fixtures;

mod test_parallel_engine;
mod test_sequential_lifecycle;
