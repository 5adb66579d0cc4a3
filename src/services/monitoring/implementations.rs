// 列挙監視の具象実装

use crate::observable::{ListenerId, ObservationListeners};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// tracing へライフサイクルを出力するリスナー群
///
/// サブスクライバーの設定はホスト側の責任。
#[derive(Debug, Clone)]
pub struct TracingObserver {
    name: Arc<str>,
}

impl TracingObserver {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// レジストリにリスナーを登録し、解除用の識別子を返す
    pub fn attach<T, M>(&self, listeners: &ObservationListeners<T, M>) -> Vec<ListenerId>
    where
        T: Debug + 'static,
        M: Debug + 'static,
    {
        let name = Arc::clone(&self.name);
        let before_start = listeners.on_before_start(move |event| {
            info!(enumeration = %name, metadata = ?event.metadata(), "enumeration starting");
            Ok(())
        });

        let name = Arc::clone(&self.name);
        let after_start = listeners.on_after_start(move |_| {
            debug!(enumeration = %name, "enumeration started");
            Ok(())
        });

        let name = Arc::clone(&self.name);
        let item = listeners.on_item_encountered(move |event| {
            trace!(enumeration = %name, item = ?event.item(), "item encountered");
            Ok(())
        });

        let name = Arc::clone(&self.name);
        let before_end = listeners.on_before_end(move |_| {
            debug!(enumeration = %name, "enumeration ending");
            Ok(())
        });

        let name = Arc::clone(&self.name);
        let after_end = listeners.on_after_end(move |event| {
            info!(enumeration = %name, metadata = ?event.metadata(), "enumeration ended");
            Ok(())
        });

        vec![before_start, after_start, item, before_end, after_end]
    }

    /// `attach` で登録したリスナーを解除
    pub fn detach<T, M>(listeners: &ObservationListeners<T, M>, ids: &[ListenerId]) -> usize {
        ids.iter().filter(|id| listeners.remove(**id)).count()
    }
}

/// 列挙の進捗を数えるだけのリスナー（テスト・ベンチマーク用）
#[derive(Debug, Default, Clone)]
pub struct ProgressCounter {
    counts: Arc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    started: AtomicU64,
    items: AtomicU64,
    ended: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<T: 'static, M: 'static>(&self, listeners: &ObservationListeners<T, M>) -> Vec<ListenerId> {
        let counts = Arc::clone(&self.counts);
        let started = listeners.on_after_start(move |_| {
            counts.started.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        let counts = Arc::clone(&self.counts);
        let items = listeners.on_item_encountered(move |_| {
            counts.items.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        let counts = Arc::clone(&self.counts);
        let ended = listeners.on_after_end(move |_| {
            counts.ended.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        vec![started, items, ended]
    }

    /// 開始した列挙の数
    pub fn started(&self) -> u64 {
        self.counts.started.load(Ordering::Relaxed)
    }

    /// 観測した要素の数
    pub fn items(&self) -> u64 {
        self.counts.items.load(Ordering::Relaxed)
    }

    /// 後始末まで終えた列挙の数
    pub fn ended(&self) -> u64 {
        self.counts.ended.load(Ordering::Relaxed)
    }
}
