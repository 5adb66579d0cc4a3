// ObservableEnumerator - ライフサイクルイベントを発行する逐次列挙子
// 状態機械は SequentialEnumerator をそのまま使い、フックだけを差し替える

use super::events::{EnumerationEnded, EnumerationItem, EnumerationStarted};
use super::registry::{ListenerSet, ObservationListeners};
use crate::core::{AsyncEnumerator, EnumerationResult, EnumeratorState, ResetOutcome, SequenceSource, Token};
use crate::sequential::{EnumerationHooks, ObjectCell, SequentialEnumerator, ValueCell};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// インスタンスとグローバルのリスナーへイベントを配るフック
pub struct Observation<T, M> {
    metadata: Arc<M>,
    listeners: ObservationListeners<T, M>,
    global: Option<Arc<ObservationListeners<T, M>>>,
}

impl<T, M> Observation<T, M> {
    fn new(metadata: M) -> Self {
        Self {
            metadata: Arc::new(metadata),
            listeners: ObservationListeners::new(),
            global: None,
        }
    }

    /// インスタンス → グローバルの順に呼ぶ
    fn dispatch<E>(
        &self,
        select: impl Fn(&ObservationListeners<T, M>) -> &ListenerSet<E>,
        event: impl FnOnce() -> E,
        kind: &'static str,
    ) {
        let local = select(&self.listeners);
        let global = self.global.as_deref().map(&select);
        let has_global = global.is_some_and(|set| !set.is_empty());
        if local.is_empty() && !has_global {
            return;
        }

        let event = event();
        local.invoke(&event, kind);
        if let Some(global) = global {
            global.invoke(&event, kind);
        }
    }
}

impl<T, M> EnumerationHooks<T> for Observation<T, M>
where
    T: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    fn before_start(&self) {
        self.dispatch(
            |listeners| &listeners.before_start,
            || EnumerationStarted::new(Arc::clone(&self.metadata)),
            "before_start",
        );
    }

    fn after_start(&self) {
        self.dispatch(
            |listeners| &listeners.after_start,
            || EnumerationStarted::new(Arc::clone(&self.metadata)),
            "after_start",
        );
    }

    fn item_encountered(&self, item: &T) {
        self.dispatch(
            |listeners| &listeners.item_encountered,
            || EnumerationItem::new(item.clone(), Arc::clone(&self.metadata)),
            "item_encountered",
        );
    }

    fn before_end(&self) {
        self.dispatch(
            |listeners| &listeners.before_end,
            || EnumerationEnded::new(Arc::clone(&self.metadata)),
            "before_end",
        );
    }

    fn after_end(&self) {
        self.dispatch(
            |listeners| &listeners.after_end,
            || EnumerationEnded::new(Arc::clone(&self.metadata)),
            "after_end",
        );
    }
}

/// ライフサイクルイベントを発行する逐次列挙子
///
/// `M = ()` ならメタデータなし、それ以外はイベントごとにメタデータを渡す。
/// リスナーの失敗は列挙の結果に影響しない。
pub struct ObservableEnumerator<T, M = (), C = ObjectCell<T>>
where
    T: Send + Sync + 'static,
{
    inner: SequentialEnumerator<T, C, Observation<T, M>>,
}

impl<T> ObservableEnumerator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// メタデータなしの観測可能な列挙子を作成
    pub fn new<S>(source: S) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::with_metadata(source, ())
    }
}

impl<T, M> ObservableEnumerator<T, M>
where
    T: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// メタデータ付きの観測可能な列挙子を作成
    pub fn with_metadata<S>(source: S, metadata: M) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::with_cell(source, metadata)
    }
}

impl<T, M, C> ObservableEnumerator<T, M, C>
where
    T: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
    C: ValueCell<T>,
{
    /// 現在値セルを指定して作成
    pub fn with_cell<S>(source: S, metadata: M) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self {
            inner: SequentialEnumerator::from_parts(Box::new(source), Observation::new(metadata)),
        }
    }

    /// プロセス全体で共有するリスナーレジストリを接続
    ///
    /// レジストリはイベントのたびに参照されるので、後から追加したリスナーも呼ばれる。
    pub fn with_global_listeners(mut self, global: Arc<ObservationListeners<T, M>>) -> Self {
        self.inner.hooks_mut().global = Some(global);
        self
    }

    /// このインスタンスのリスナーレジストリ
    pub fn listeners(&self) -> &ObservationListeners<T, M> {
        &self.inner.hooks().listeners
    }

    pub fn metadata(&self) -> &M {
        &self.inner.hooks().metadata
    }

    pub fn state(&self) -> EnumeratorState {
        self.inner.state()
    }

    pub async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        self.inner.advance(cancel).await
    }

    pub fn one_time_retrieve(&self, token: Token) -> Option<T> {
        self.inner.one_time_retrieve(token)
    }

    pub async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome> {
        self.inner.try_reset(cancel).await
    }
}

#[async_trait]
impl<T, M, C> AsyncEnumerator<T> for ObservableEnumerator<T, M, C>
where
    T: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
    C: ValueCell<T>,
{
    async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        self.inner.advance(cancel).await
    }

    fn one_time_retrieve(&self, token: Token) -> Option<T> {
        self.inner.one_time_retrieve(token)
    }

    async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome> {
        self.inner.try_reset(cancel).await
    }
}
