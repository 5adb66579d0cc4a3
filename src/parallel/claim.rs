// 作業要求関数の既製実装

use std::sync::atomic::{AtomicIsize, Ordering};
use tracing::warn;

/// 原子的なカウントダウンで添字を払い出す要求関数
///
/// `count, count - 1, ..., 1` を一度ずつ返し、尽きたら `None`。
/// 複数レーンから同時に呼んでよい。
#[derive(Debug)]
pub struct CountdownClaim {
    remaining: AtomicIsize,
}

impl CountdownClaim {
    /// `count` 個の添字を払い出す要求関数を作成
    ///
    /// `count` が `isize::MAX` を超える場合は `isize::MAX` 個に切り詰め、警告を出す。
    /// `isize::MAX + 1` 以上の添字は払い出されない。
    pub fn new(count: usize) -> Self {
        let remaining = isize::try_from(count).unwrap_or_else(|_| {
            warn!(count, cap = isize::MAX, "claim count exceeds isize::MAX; capping");
            isize::MAX
        });
        Self {
            remaining: AtomicIsize::new(remaining),
        }
    }

    /// 次の添字を要求する
    pub fn claim(&self) -> Option<usize> {
        // 尽きた後もレーン数ぶんだけ負方向へ進むが、範囲は十分ある
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        usize::try_from(previous).ok().filter(|index| *index > 0)
    }

    /// まだ払い出していない添字の数
    pub fn remaining(&self) -> usize {
        usize::try_from(self.remaining.load(Ordering::Acquire)).unwrap_or(0)
    }
}
