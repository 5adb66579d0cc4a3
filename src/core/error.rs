// 列挙エンジン共通のエラー型定義

use super::types::EnumeratorState;
use thiserror::Error;

/// 衝突した操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Advance,
    Reset,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Reset => "reset",
        }
    }
}

/// エラーが発生した段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerStage {
    /// 最初の前進（SequenceSource::start）
    Start,
    /// 継続（SequenceStep::next）
    Step,
    /// リセット時の読み捨て
    Drain,
    /// 並列モードの取得関数
    Fetch,
    /// 並列モードのコールバック
    Consumer,
}

impl ProducerStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Step => "step",
            Self::Drain => "drain",
            Self::Fetch => "fetch",
            Self::Consumer => "consumer",
        }
    }
}

/// 列挙エンジンのエラー型
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("並行操作エラー: {} が {state:?} 状態と衝突しました", .operation.as_str())]
    ConcurrentOperation {
        operation: Operation,
        state: EnumeratorState,
    },

    #[error("プロデューサーエラー ({}): {source}", .stage.as_str())]
    Producer {
        stage: ProducerStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("設定エラー: {message}")]
    Configuration { message: String },

    #[error("並列列挙で {} 件の失敗が発生しました", .failures.len())]
    Aggregate { failures: Vec<EnumerationError> },
}

impl EnumerationError {
    /// 並行操作エラーの作成
    pub fn concurrent(operation: Operation, state: EnumeratorState) -> Self {
        Self::ConcurrentOperation { operation, state }
    }

    /// プロデューサーエラーの作成
    pub fn producer(stage: ProducerStage, source: anyhow::Error) -> Self {
        Self::Producer { stage, source }
    }

    /// 設定エラーの作成
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// 集約エラーの作成
    pub fn aggregate(failures: Vec<EnumerationError>) -> Self {
        Self::Aggregate { failures }
    }

    /// 同じ列挙子で操作をやり直せるかどうか
    ///
    /// 並行操作エラーは衝突した操作が終われば解消する。
    /// プロデューサーエラーの後はリセットすれば再利用できる。
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConcurrentOperation { .. } => true,
            Self::Producer { .. } => true,
            Self::Configuration { .. } => false,
            Self::Aggregate { failures } => failures.iter().all(Self::is_recoverable),
        }
    }

    /// 並行操作エラーかどうか
    pub fn is_concurrent_operation(&self) -> bool {
        matches!(self, Self::ConcurrentOperation { .. })
    }
}

impl From<anyhow::Error> for EnumerationError {
    fn from(error: anyhow::Error) -> Self {
        EnumerationError::Producer {
            stage: ProducerStage::Step,
            source: error,
        }
    }
}

/// 列挙エンジンの結果型
pub type EnumerationResult<T> = std::result::Result<T, EnumerationError>;
