// 列挙エンジンのトレイト定義
// プロデューサー側の契約と、列挙子・設定の抽象化インターフェース

use super::error::EnumerationResult;
use super::types::{FailureMode, ResetOutcome, Token};
use async_trait::async_trait;
use mockall::automock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 最初の前進の結果
///
/// `first` が `None` の場合は空のシーケンス。
/// 空でも `cleanup` が渡されていれば、それは一度だけ実行される。
pub struct Started<T: Send + Sync + 'static> {
    pub first: Option<T>,
    pub step: Option<Arc<dyn SequenceStep<T>>>,
    pub cleanup: Option<Arc<dyn SequenceCleanup>>,
}

impl<T: Send + Sync + 'static> Started<T> {
    /// 最初の要素と継続処理から作成
    pub fn item(first: T, step: Arc<dyn SequenceStep<T>>) -> Self {
        Self {
            first: Some(first),
            step: Some(step),
            cleanup: None,
        }
    }

    /// 要素が一つだけのシーケンス
    pub fn single(first: T) -> Self {
        Self {
            first: Some(first),
            step: None,
            cleanup: None,
        }
    }

    /// 空のシーケンス
    pub fn empty() -> Self {
        Self {
            first: None,
            step: None,
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn SequenceCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Started<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Started")
            .field("has_first", &self.first.is_some())
            .field("has_step", &self.step.is_some())
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// 最初の前進を行うプロデューサー
///
/// 列挙子の生存期間（リセットごと）に一度だけ呼ばれる。
#[async_trait]
pub trait SequenceSource<T: Send + Sync + 'static>: Send + Sync {
    async fn start(&self, cancel: &CancellationToken) -> anyhow::Result<Started<T>>;
}

/// 次の要素を取得する継続処理
///
/// `Ok(None)` を返すまで繰り返し呼ばれる。
#[automock]
#[async_trait]
pub trait SequenceStep<T: Send + Sync + 'static>: Send + Sync {
    async fn next(&self, cancel: &CancellationToken) -> anyhow::Result<Option<T>>;
}

/// 列挙の終了・リセット時に一度だけ呼ばれる後始末
#[automock]
#[async_trait]
pub trait SequenceCleanup: Send + Sync {
    async fn cleanup(&self, cancel: &CancellationToken) -> anyhow::Result<()>;
}

/// 非同期列挙子の抽象化トレイト
#[async_trait]
pub trait AsyncEnumerator<T>: Send + Sync {
    /// 次の要素へ進む
    ///
    /// 要素があれば取り出し用のトークン、終わりなら `None` を返す。
    async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>>;

    /// トークンが最新の場合のみ現在値を返す
    fn one_time_retrieve(&self, token: Token) -> Option<T>;

    /// 残りを読み捨てて初期状態に戻す
    async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome>;

    /// 並列列挙に対応しているか
    fn is_parallel_enumeration_supported(&self) -> bool {
        false
    }
}

// AsyncEnumerator for Box<dyn AsyncEnumerator<T>>
#[async_trait]
impl<T: Send + Sync + 'static> AsyncEnumerator<T> for Box<dyn AsyncEnumerator<T>> {
    async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        self.as_ref().advance(cancel).await
    }

    fn one_time_retrieve(&self, token: Token) -> Option<T> {
        self.as_ref().one_time_retrieve(token)
    }

    async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome> {
        self.as_ref().try_reset(cancel).await
    }

    fn is_parallel_enumeration_supported(&self) -> bool {
        self.as_ref().is_parallel_enumeration_supported()
    }
}

/// 並列列挙の設定を抽象化するトレイト
#[automock]
pub trait ParallelConfig: Send + Sync {
    /// 同時に動かすレーン数の上限
    fn max_concurrent_lanes(&self) -> usize;

    /// 失敗の報告方法
    fn failure_mode(&self) -> FailureMode;
}

// ParallelConfig for Box<dyn ParallelConfig>
impl ParallelConfig for Box<dyn ParallelConfig> {
    fn max_concurrent_lanes(&self) -> usize {
        self.as_ref().max_concurrent_lanes()
    }

    fn failure_mode(&self) -> FailureMode {
        self.as_ref().failure_mode()
    }
}
