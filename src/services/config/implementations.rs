// 設定管理の具象実装

use crate::core::{EnumerationError, EnumerationResult, FailureMode, ParallelConfig};
use serde::{Deserialize, Serialize};

/// デフォルト設定実装
///
/// ホスト側の設定ファイルに埋め込めるよう、欠けた項目はデフォルト値で補う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultParallelConfig {
    max_lanes: usize,
    failure_mode: FailureMode,
}

impl DefaultParallelConfig {
    pub fn new(cpu_count: usize) -> Self {
        Self {
            max_lanes: cpu_count.max(1) * 2,
            failure_mode: FailureMode::default(),
        }
    }

    pub fn with_max_lanes(mut self, max_lanes: usize) -> Self {
        self.max_lanes = max_lanes;
        self
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }
}

impl Default for DefaultParallelConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl ParallelConfig for DefaultParallelConfig {
    fn max_concurrent_lanes(&self) -> usize {
        self.max_lanes
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }
}

/// レーン数を検証して返す
pub(crate) fn validated_lanes<C: ParallelConfig + ?Sized>(config: &C) -> EnumerationResult<usize> {
    match config.max_concurrent_lanes() {
        0 => Err(EnumerationError::configuration(
            "max_concurrent_lanes は 1 以上でなければなりません",
        )),
        lanes => Ok(lanes),
    }
}
