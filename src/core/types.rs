// 列挙エンジンで共有するデータ型定義

use serde::{Deserialize, Serialize};

/// 一度きりの取り出しに使うトークン
///
/// 前進が成功するたびに発行され、単調に増加する。
pub type Token = u64;

/// 逐次列挙子の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnumeratorState {
    /// まだ前進していない（またはリセット済み）
    Initial = 0,
    /// 前進の途中
    AdvanceInProgress = 1,
    /// 前進が完了し、現在値が取り出せる
    AdvanceCompleted = 2,
    /// 列挙が終わった
    Ended = 3,
    /// リセットの途中
    Resetting = 4,
}

impl EnumeratorState {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// アトミック値から状態を復元
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Initial,
            1 => Self::AdvanceInProgress,
            2 => Self::AdvanceCompleted,
            3 => Self::Ended,
            _ => Self::Resetting,
        }
    }

    /// 前進・リセットが実行中かどうか
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::AdvanceInProgress | Self::Resetting)
    }
}

/// リセットの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// 一度も前進していなかったので何もしなかった
    AlreadyInitial,
    /// 残りを読み捨てて初期状態に戻した
    Reset {
        /// 読み捨てた要素数
        drained: usize,
        /// 後始末処理が実際に実行されたか
        cleanup_ran: bool,
    },
}

impl ResetOutcome {
    /// 実際にリセット処理が走ったかどうか
    pub const fn was_reset(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

/// 並列列挙での失敗の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// 全レーン終了後、最初の失敗を返す（残りはログに出す）
    #[default]
    FirstError,
    /// 全レーン終了後、全ての失敗をまとめて返す
    CollectAll,
}

/// 並列列挙のサマリー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelSummary {
    /// コールバックまで正常に届いた要素数
    pub items_processed: usize,
    /// 取得またはコールバックで失敗した要素数
    pub failed_items: usize,
    /// 起動したレーン数
    pub lanes: usize,
    pub total_time_ms: u64,
}
