// 現在値ホルダーと値セルの実装
//
// 汎用の ObjectCell は書き込みのたびに値を差し替え、
// 数値用のセルはアトミック変数をその場で書き換える。

use crate::core::{SequenceCleanup, SequenceStep, Token};
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 現在値を保持するセル
///
/// 列挙子の構築時に型パラメータで選択する。
pub trait ValueCell<T>: Send + Sync + 'static {
    fn new(value: T) -> Self;

    /// 現在値の複製を返す
    fn load(&self) -> T;

    fn store(&self, value: T);
}

/// 任意の型向けのセル（書き込みごとに新しい Arc に差し替える）
#[derive(Debug)]
pub struct ObjectCell<T> {
    slot: Mutex<Arc<T>>,
}

impl<T> ValueCell<T> for ObjectCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Arc::new(value)),
        }
    }

    fn load(&self) -> T {
        let current = Arc::clone(&self.slot.lock().unwrap_or_else(PoisonError::into_inner));
        current.as_ref().clone()
    }

    fn store(&self, value: T) {
        let replaced = std::mem::replace(
            &mut *self.slot.lock().unwrap_or_else(PoisonError::into_inner),
            Arc::new(value),
        );
        drop(replaced);
    }
}

/// i32 専用セル（アロケーションなし）
#[derive(Debug)]
pub struct Int32Cell(AtomicI32);

impl ValueCell<i32> for Int32Cell {
    fn new(value: i32) -> Self {
        Self(AtomicI32::new(value))
    }

    fn load(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    fn store(&self, value: i32) {
        self.0.swap(value, Ordering::AcqRel);
    }
}

/// i64 専用セル（アロケーションなし）
#[derive(Debug)]
pub struct Int64Cell(AtomicI64);

impl ValueCell<i64> for Int64Cell {
    fn new(value: i64) -> Self {
        Self(AtomicI64::new(value))
    }

    fn load(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    fn store(&self, value: i64) {
        self.0.swap(value, Ordering::AcqRel);
    }
}

/// 最初の前進が成功した時に作られる現在値ホルダー
///
/// 列挙子が排他的に所有し、利用者には値の複製とトークンだけを渡す。
pub(crate) struct CurrentInfo<T: Send + Sync + 'static, C> {
    value: C,
    token: AtomicU64,
    step: Option<Arc<dyn SequenceStep<T>>>,
    cleanup: Option<Arc<dyn SequenceCleanup>>,
}

impl<T, C> CurrentInfo<T, C>
where
    T: Send + Sync + 'static,
    C: ValueCell<T>,
{
    pub(crate) fn new(
        first: T,
        step: Option<Arc<dyn SequenceStep<T>>>,
        cleanup: Option<Arc<dyn SequenceCleanup>>,
    ) -> Self {
        Self {
            value: C::new(first),
            token: AtomicU64::new(0),
            step,
            cleanup,
        }
    }

    pub(crate) fn step(&self) -> Option<Arc<dyn SequenceStep<T>>> {
        self.step.clone()
    }

    pub(crate) fn cleanup(&self) -> Option<Arc<dyn SequenceCleanup>> {
        self.cleanup.clone()
    }

    pub(crate) fn set_value(&self, value: T) {
        self.value.store(value);
    }

    pub(crate) fn value(&self) -> T {
        self.value.load()
    }

    /// 列挙子が発行したトークンを現在のものとして公開する
    pub(crate) fn publish_token(&self, token: Token) {
        self.token.store(token, Ordering::Release);
    }

    pub(crate) fn token(&self) -> Token {
        self.token.load(Ordering::Acquire)
    }
}
