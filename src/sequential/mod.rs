// 逐次列挙 - 状態機械・現在値ホルダー・フック

pub mod current;
pub mod enumerator;
pub mod hooks;

pub use current::{Int32Cell, Int64Cell, ObjectCell, ValueCell};
pub use enumerator::SequentialEnumerator;
pub use hooks::{EnumerationHooks, NoHooks, WithMetadata};

use crate::core::{AsyncEnumerator, EnumerationResult};
use tokio_util::sync::CancellationToken;

/// 列挙子を最後まで進め、要素ごとにコールバックを呼ぶ
///
/// 処理した要素数を返す。
pub async fn enumerate_sequentially<T, E, F>(
    enumerator: &E,
    cancel: &CancellationToken,
    mut callback: F,
) -> EnumerationResult<u64>
where
    E: AsyncEnumerator<T> + ?Sized,
    F: FnMut(T),
{
    let mut count = 0u64;
    while let Some(token) = enumerator.advance(cancel).await? {
        if let Some(item) = enumerator.one_time_retrieve(token) {
            callback(item);
            count += 1;
        }
    }
    Ok(count)
}
