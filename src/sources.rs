// 同期的なイテレータをプロデューサーとして使うためのアダプタ

use crate::core::{SequenceCleanup, SequenceSource, SequenceStep, Started};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// 複製可能なコレクション・イテレータから要素を生成するソース
///
/// 開始のたびに元のコレクションを複製するので、リセット後も最初から列挙できる。
/// 中断されることがないため、列挙は常に同期的に完了する。
pub struct IterSource<I> {
    items: I,
    cleanup: Option<Arc<dyn SequenceCleanup>>,
}

impl<I> IterSource<I> {
    pub fn new(items: I) -> Self {
        Self {
            items,
            cleanup: None,
        }
    }

    /// 列挙終了・リセット時に呼ぶ後始末を設定
    pub fn with_cleanup(mut self, cleanup: Arc<dyn SequenceCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }
}

#[async_trait]
impl<I> SequenceSource<I::Item> for IterSource<I>
where
    I: IntoIterator + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
    I::Item: Send + Sync + 'static,
{
    async fn start(&self, _cancel: &CancellationToken) -> anyhow::Result<Started<I::Item>> {
        let mut iter = self.items.clone().into_iter();
        let started = match iter.next() {
            Some(first) => Started::item(
                first,
                Arc::new(IterStep {
                    iter: Mutex::new(iter),
                }),
            ),
            None => Started::empty(),
        };

        Ok(match &self.cleanup {
            Some(cleanup) => started.with_cleanup(Arc::clone(cleanup)),
            None => started,
        })
    }
}

struct IterStep<It> {
    iter: Mutex<It>,
}

#[async_trait]
impl<It> SequenceStep<It::Item> for IterStep<It>
where
    It: Iterator + Send + 'static,
    It::Item: Send + Sync + 'static,
{
    async fn next(&self, _cancel: &CancellationToken) -> anyhow::Result<Option<It::Item>> {
        let item = self.iter.lock().unwrap_or_else(PoisonError::into_inner).next();
        Ok(item)
    }
}
