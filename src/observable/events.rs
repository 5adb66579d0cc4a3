// 観測イベントのペイロード定義

use std::sync::Arc;

/// 列挙開始イベント（開始前・開始後で共通）
#[derive(Debug)]
pub struct EnumerationStarted<M> {
    metadata: Arc<M>,
}

impl<M> EnumerationStarted<M> {
    pub(crate) fn new(metadata: Arc<M>) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }
}

/// 要素生成イベント
#[derive(Debug)]
pub struct EnumerationItem<T, M> {
    item: T,
    metadata: Arc<M>,
}

impl<T, M> EnumerationItem<T, M> {
    pub(crate) fn new(item: T, metadata: Arc<M>) -> Self {
        Self { item, metadata }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }
}

/// 列挙終了イベント（後始末前・後始末後で共通）
#[derive(Debug)]
pub struct EnumerationEnded<M> {
    metadata: Arc<M>,
}

impl<M> EnumerationEnded<M> {
    pub(crate) fn new(metadata: Arc<M>) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }
}
