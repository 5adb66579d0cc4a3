// SequentialEnumerator - 逐次列挙の状態機械
//
// 状態は AtomicU8 の compare-and-set だけで遷移する。
// 前進・リセットが重なった場合は待たずに即座にエラーを返す。

use super::current::{CurrentInfo, ObjectCell, ValueCell};
use super::hooks::{EnumerationHooks, NoHooks, WithMetadata};
use crate::core::{
    AsyncEnumerator, EnumerationError, EnumerationResult, EnumeratorState, Operation,
    ProducerStage, ResetOutcome, SequenceCleanup, SequenceSource, Started, Token,
};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type CurrentSlot<T, C> = Mutex<Option<Arc<CurrentInfo<T, C>>>>;

/// 単一の利用者が一つずつ要素を進める非同期列挙子
///
/// `C` は現在値セルの種類（既定は汎用の `ObjectCell`）、
/// `H` はライフサイクルフック（既定はフックなし）。
pub struct SequentialEnumerator<T, C = ObjectCell<T>, H = NoHooks>
where
    T: Send + Sync + 'static,
{
    state: AtomicU8,
    // リセットをまたいでも巻き戻らないトークンの発行元
    next_token: AtomicU64,
    current: CurrentSlot<T, C>,
    source: Box<dyn SequenceSource<T>>,
    hooks: H,
}

impl<T> SequentialEnumerator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 汎用セルを使う列挙子を作成
    pub fn new<S>(source: S) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::from_parts(Box::new(source), NoHooks)
    }
}

impl<T, C> SequentialEnumerator<T, C, NoHooks>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
{
    /// 現在値セルを指定して作成（数値用セルなど）
    pub fn with_cell<S>(source: S) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::from_parts(Box::new(source), NoHooks)
    }
}

impl<T, M> SequentialEnumerator<T, ObjectCell<T>, WithMetadata<M>>
where
    T: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// メタデータ付きの列挙子を作成（イベントは発行しない）
    pub fn with_metadata<S>(source: S, metadata: M) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::from_parts(Box::new(source), WithMetadata::new(metadata))
    }
}

impl<T, C, M> SequentialEnumerator<T, C, WithMetadata<M>>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    M: Send + Sync + 'static,
{
    pub fn metadata(&self) -> &M {
        self.hooks.metadata()
    }
}

impl<T, C, H> SequentialEnumerator<T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    /// 独自のライフサイクルフックを指定して作成
    pub fn with_hooks<S>(source: S, hooks: H) -> Self
    where
        S: SequenceSource<T> + 'static,
    {
        Self::from_parts(Box::new(source), hooks)
    }

    pub(crate) fn from_parts(source: Box<dyn SequenceSource<T>>, hooks: H) -> Self {
        Self {
            state: AtomicU8::new(EnumeratorState::Initial.as_u8()),
            next_token: AtomicU64::new(0),
            current: Mutex::new(None),
            source,
            hooks,
        }
    }

    /// 現在の状態
    pub fn state(&self) -> EnumeratorState {
        EnumeratorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn hooks(&self) -> &H {
        &self.hooks
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// 次の要素へ進む
    ///
    /// 要素があれば取り出し用トークンを、終わっていれば `None` を返す。
    /// 別の前進・リセットが実行中なら `ConcurrentOperation` エラー。
    pub async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        let resumed = self.transition(EnumeratorState::AdvanceCompleted, EnumeratorState::AdvanceInProgress);
        if !resumed && !self.transition(EnumeratorState::Initial, EnumeratorState::AdvanceInProgress) {
            let state = self.state();
            if state == EnumeratorState::Ended {
                return Ok(None);
            }
            return Err(EnumerationError::concurrent(Operation::Advance, state));
        }

        let mut guard = InFlight::new(self);
        let outcome = if resumed {
            self.advance_next(cancel).await
        } else {
            self.advance_first(cancel).await
        };
        guard.disarm();
        outcome
    }

    /// トークンが最新の前進のものである場合のみ現在値を返す
    ///
    /// 次の前進やリセットが始まった後は `None`（値はもう取り出せない）。
    pub fn one_time_retrieve(&self, token: Token) -> Option<T> {
        if self.state() != EnumeratorState::AdvanceCompleted {
            return None;
        }
        let current = self.load_current()?;
        if current.token() != token {
            return None;
        }
        let value = current.value();
        if current.token() == token && self.state() == EnumeratorState::AdvanceCompleted {
            Some(value)
        } else {
            None
        }
    }

    /// 残りの要素を読み捨て、後始末をして初期状態に戻す
    ///
    /// 一度も前進していなければ何もせず `AlreadyInitial` を返す。
    /// 読み捨て中のエラーは、後始末と状態の復帰を済ませた後で返す。
    pub async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome> {
        if !self.transition(EnumeratorState::AdvanceCompleted, EnumeratorState::Resetting)
            && !self.transition(EnumeratorState::Ended, EnumeratorState::Resetting)
        {
            return match self.state() {
                EnumeratorState::Initial => Ok(ResetOutcome::AlreadyInitial),
                state => Err(EnumerationError::concurrent(Operation::Reset, state)),
            };
        }

        let mut guard = InFlight::new(self);
        let mut drained = 0usize;
        let mut failure = None;

        if let Some(step) = self.load_current().and_then(|current| current.step()) {
            loop {
                match step.next(cancel).await {
                    Ok(Some(_)) => drained += 1,
                    Ok(None) => break,
                    Err(error) => {
                        failure = Some(error);
                        break;
                    }
                }
            }
        }

        let cleanup_ran = self.perform_dispose(cancel, None).await;
        self.set_state(EnumeratorState::Initial);
        guard.disarm();
        debug!(drained, cleanup_ran, "enumerator reset");

        match failure {
            Some(error) => Err(EnumerationError::producer(ProducerStage::Drain, error)),
            None => Ok(ResetOutcome::Reset { drained, cleanup_ran }),
        }
    }

    async fn advance_first(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        self.run_hook("before_start", |hooks| hooks.before_start());
        let started = self.source.start(cancel).await;
        self.run_hook("after_start", |hooks| hooks.after_start());

        match started {
            Ok(Started {
                first: Some(first),
                step,
                cleanup,
            }) => {
                self.run_hook("item_encountered", |hooks| hooks.item_encountered(&first));
                let current = Arc::new(CurrentInfo::new(first, step, cleanup));
                let token = self.mint_token();
                current.publish_token(token);
                self.swap_current(Some(current));
                self.set_state(EnumeratorState::AdvanceCompleted);
                debug!(token, "enumeration started");
                Ok(Some(token))
            }
            Ok(Started { first: None, cleanup, .. }) => {
                self.finish(cancel, cleanup).await;
                debug!("enumeration started empty");
                Ok(None)
            }
            Err(error) => {
                self.finish(cancel, None).await;
                Err(EnumerationError::producer(ProducerStage::Start, error))
            }
        }
    }

    async fn advance_next(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        let Some(current) = self.load_current() else {
            self.finish(cancel, None).await;
            return Ok(None);
        };

        let produced = match current.step() {
            Some(step) => step.next(cancel).await,
            None => Ok(None),
        };

        match produced {
            Ok(Some(value)) => {
                self.run_hook("item_encountered", |hooks| hooks.item_encountered(&value));
                current.set_value(value);
                let token = self.mint_token();
                current.publish_token(token);
                self.set_state(EnumeratorState::AdvanceCompleted);
                trace!(token, "advanced");
                Ok(Some(token))
            }
            Ok(None) => {
                self.finish(cancel, None).await;
                debug!("enumeration ended");
                Ok(None)
            }
            Err(error) => {
                self.finish(cancel, None).await;
                Err(EnumerationError::producer(ProducerStage::Step, error))
            }
        }
    }

    /// 列挙を終了状態にする（後始末込み）
    async fn finish(&self, cancel: &CancellationToken, cleanup: Option<Arc<dyn SequenceCleanup>>) {
        self.perform_dispose(cancel, cleanup).await;
        self.set_state(EnumeratorState::Ended);
    }

    /// 後始末を実行し、実際に何かを実行したかを返す
    ///
    /// このステップは失敗を呼び出し元へ伝播しない。
    /// 後始末のエラーやパニックはログに出して破棄する。
    async fn perform_dispose(
        &self,
        cancel: &CancellationToken,
        explicit: Option<Arc<dyn SequenceCleanup>>,
    ) -> bool {
        self.run_hook("before_end", |hooks| hooks.before_end());

        let previous = self.swap_current(None);
        let cleanup = explicit.or_else(|| previous.as_ref().and_then(|current| current.cleanup()));
        let ran = match cleanup {
            Some(cleanup) => {
                match AssertUnwindSafe(cleanup.cleanup(cancel)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!(error = %error, "cleanup failed; ignoring"),
                    Err(_) => warn!("cleanup panicked; ignoring"),
                }
                true
            }
            None => false,
        };

        self.run_hook("after_end", |hooks| hooks.after_end());
        ran
    }

    /// 前進・リセットの future が途中で破棄された時の後処理
    ///
    /// 非同期の後始末はここでは実行できないので、ホルダーは残したまま終了状態にする。
    /// 後でリセットすれば読み捨てと後始末が行われる。
    fn abandon(&self) {
        if let Some(current) = self.load_current() {
            current.publish_token(self.mint_token());
        }
        self.set_state(EnumeratorState::Ended);
        warn!("advance or reset dropped before completion; enumerator ended");
    }

    /// フックを呼ぶ（パニックはログに出して破棄する）
    fn run_hook(&self, kind: &'static str, hook: impl FnOnce(&H)) {
        if std::panic::catch_unwind(AssertUnwindSafe(|| hook(&self.hooks))).is_err() {
            warn!(hook = kind, "hook panicked; ignoring");
        }
    }

    fn mint_token(&self) -> Token {
        self.next_token.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn transition(&self, from: EnumeratorState, to: EnumeratorState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set_state(&self, state: EnumeratorState) {
        self.state.swap(state.as_u8(), Ordering::SeqCst);
    }

    fn load_current(&self) -> Option<Arc<CurrentInfo<T, C>>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap_current(&self, next: Option<Arc<CurrentInfo<T, C>>>) -> Option<Arc<CurrentInfo<T, C>>> {
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, next)
    }
}

#[async_trait]
impl<T, C, H> AsyncEnumerator<T> for SequentialEnumerator<T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    async fn advance(&self, cancel: &CancellationToken) -> EnumerationResult<Option<Token>> {
        SequentialEnumerator::advance(self, cancel).await
    }

    fn one_time_retrieve(&self, token: Token) -> Option<T> {
        SequentialEnumerator::one_time_retrieve(self, token)
    }

    async fn try_reset(&self, cancel: &CancellationToken) -> EnumerationResult<ResetOutcome> {
        SequentialEnumerator::try_reset(self, cancel).await
    }
}

impl<T, C, H> std::fmt::Debug for SequentialEnumerator<T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialEnumerator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// 実行中の前進・リセットを表すガード
struct InFlight<'a, T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    enumerator: &'a SequentialEnumerator<T, C, H>,
    armed: bool,
}

impl<'a, T, C, H> InFlight<'a, T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    fn new(enumerator: &'a SequentialEnumerator<T, C, H>) -> Self {
        Self {
            enumerator,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T, C, H> Drop for InFlight<'_, T, C, H>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
    H: EnumerationHooks<T>,
{
    fn drop(&mut self) {
        if self.armed {
            self.enumerator.abandon();
        }
    }
}
