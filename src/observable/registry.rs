// リスナーレジストリ
//
// インスタンスごとのリスナーと、プロセス全体で共有するリスナーの両方に使う。
// 共有する場合は Arc で明示的に列挙子へ渡し、イベントのたびに参照する。

use super::events::{EnumerationEnded, EnumerationItem, EnumerationStarted};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// リスナー登録の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// 一種類のイベントに対するリスナー集合
pub(crate) struct ListenerSet<E> {
    entries: RwLock<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> ListenerSet<E> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, id: ListenerId, listener: Listener<E>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 登録済みの全リスナーを呼ぶ
    ///
    /// 失敗（エラー・パニック）はリスナーごとに吸収し、呼び出し元へは伝播しない。
    /// 呼び出し中の登録・解除でデッドロックしないよう、スナップショットに対して呼ぶ。
    pub(crate) fn invoke(&self, event: &E, kind: &'static str) {
        let snapshot: Vec<Listener<E>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(event = kind, error = %error, "listener failed; ignoring"),
                Err(_) => warn!(event = kind, "listener panicked; ignoring"),
            }
        }
    }
}

/// 列挙のライフサイクルイベントのリスナーレジストリ
pub struct ObservationListeners<T, M = ()> {
    next_id: AtomicU64,
    pub(crate) before_start: ListenerSet<EnumerationStarted<M>>,
    pub(crate) after_start: ListenerSet<EnumerationStarted<M>>,
    pub(crate) item_encountered: ListenerSet<EnumerationItem<T, M>>,
    pub(crate) before_end: ListenerSet<EnumerationEnded<M>>,
    pub(crate) after_end: ListenerSet<EnumerationEnded<M>>,
}

impl<T, M> ObservationListeners<T, M> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            before_start: ListenerSet::new(),
            after_start: ListenerSet::new(),
            item_encountered: ListenerSet::new(),
            before_end: ListenerSet::new(),
            after_end: ListenerSet::new(),
        }
    }

    /// プロセス全体で共有するレジストリを作成
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// 最初の前進の直前に呼ばれるリスナーを登録
    pub fn on_before_start<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EnumerationStarted<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.before_start.add(id, Arc::new(listener));
        id
    }

    /// 最初の前進の直後に呼ばれるリスナーを登録
    pub fn on_after_start<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EnumerationStarted<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.after_start.add(id, Arc::new(listener));
        id
    }

    /// 要素が生成されるたびに呼ばれるリスナーを登録
    pub fn on_item_encountered<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EnumerationItem<T, M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.item_encountered.add(id, Arc::new(listener));
        id
    }

    /// 後始末の直前に呼ばれるリスナーを登録
    pub fn on_before_end<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EnumerationEnded<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.before_end.add(id, Arc::new(listener));
        id
    }

    /// 後始末の直後に呼ばれるリスナーを登録
    pub fn on_after_end<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EnumerationEnded<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.after_end.add(id, Arc::new(listener));
        id
    }

    /// リスナーを解除する。見つかれば true
    pub fn remove(&self, id: ListenerId) -> bool {
        // 識別子はレジストリ内で一意なので、どれか一つからしか外れない
        self.before_start.remove(id)
            || self.after_start.remove(id)
            || self.item_encountered.remove(id)
            || self.before_end.remove(id)
            || self.after_end.remove(id)
    }

    /// 登録されているリスナーの総数
    pub fn len(&self) -> usize {
        self.before_start.len()
            + self.after_start.len()
            + self.item_encountered.len()
            + self.before_end.len()
            + self.after_end.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T, M> Default for ObservationListeners<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, M> std::fmt::Debug for ObservationListeners<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationListeners")
            .field("listeners", &self.len())
            .finish()
    }
}
