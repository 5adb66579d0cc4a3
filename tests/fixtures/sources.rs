// テスト用のプロデューサー実装

use anyhow::bail;
use async_enum::{SequenceCleanup, SequenceSource, SequenceStep, Started};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 呼ばれた回数を数える後始末
#[derive(Debug, Default)]
pub struct CountingCleanup {
    calls: AtomicUsize,
}

impl CountingCleanup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SequenceCleanup for CountingCleanup {
    async fn cleanup(&self, _cancel: &CancellationToken) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 要素ごとに待機を挟む非同期プロデューサー
///
/// `fail_at` を指定すると、その添字の要素の代わりにエラーを返す。
pub struct DelayedSource {
    items: Vec<u32>,
    delay: Duration,
    fail_at: Option<usize>,
    cleanup: Arc<CountingCleanup>,
}

impl DelayedSource {
    pub fn new(items: Vec<u32>, delay: Duration) -> Self {
        Self {
            items,
            delay,
            fail_at: None,
            cleanup: CountingCleanup::new(),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// このソースが使う後始末（呼び出し回数の確認用）
    pub fn cleanup(&self) -> Arc<CountingCleanup> {
        Arc::clone(&self.cleanup)
    }
}

#[async_trait]
impl SequenceSource<u32> for DelayedSource {
    async fn start(&self, cancel: &CancellationToken) -> anyhow::Result<Started<u32>> {
        let step = Arc::new(DelayedStep {
            items: Mutex::new(self.items.clone().into_iter().enumerate()),
            delay: self.delay,
            fail_at: self.fail_at,
        });
        let first = step.next(cancel).await?;
        Ok(Started {
            first,
            step: Some(step),
            cleanup: Some(self.cleanup.clone()),
        })
    }
}

struct DelayedStep {
    items: Mutex<std::iter::Enumerate<std::vec::IntoIter<u32>>>,
    delay: Duration,
    fail_at: Option<usize>,
}

#[async_trait]
impl SequenceStep<u32> for DelayedStep {
    async fn next(&self, cancel: &CancellationToken) -> anyhow::Result<Option<u32>> {
        tokio::select! {
            _ = cancel.cancelled() => bail!("キャンセルされました"),
            _ = tokio::time::sleep(self.delay) => {}
        }

        let next = self.items.lock().unwrap().next();
        match next {
            Some((index, _)) if Some(index) == self.fail_at => bail!("要素 {index} の生成に失敗"),
            Some((_, item)) => Ok(Some(item)),
            None => Ok(None),
        }
    }
}
