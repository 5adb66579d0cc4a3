// 状態機械のライフサイクルに差し込むフック

/// 逐次列挙子が呼び出すフック
///
/// フックはエラーを返せない。パニックは列挙子が捕まえてログに出し、
/// 列挙の結果や後始末には影響させない。
pub trait EnumerationHooks<T>: Send + Sync + 'static {
    /// 最初の前進の直前
    fn before_start(&self) {}

    /// 最初の前進の直後（成功・失敗を問わない）
    fn after_start(&self) {}

    /// 要素を生成するたび
    fn item_encountered(&self, _item: &T) {}

    /// 後始末の直前
    fn before_end(&self) {}

    /// 後始末の直後（後始末が失敗しても呼ばれる）
    fn after_end(&self) {}
}

/// 何もしないフック（観測なしの列挙子用）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<T> EnumerationHooks<T> for NoHooks {}

/// メタデータだけを持つフック
///
/// イベントは発行せず、`SequentialEnumerator::metadata` で参照できるようにする。
#[derive(Debug, Default, Clone)]
pub struct WithMetadata<M> {
    metadata: M,
}

impl<M> WithMetadata<M> {
    pub fn new(metadata: M) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }
}

impl<T, M> EnumerationHooks<T> for WithMetadata<M> where M: Send + Sync + 'static {}
