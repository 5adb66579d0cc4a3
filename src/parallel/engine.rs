// 並列列挙エンジン
//
// 要求関数で添字を払い出し、取得関数で要素を作り、コールバックへ渡す。
// レーンは呼び出し元のタスク内で FuturesUnordered として同時にポーリングする。

use super::lane::{run_lane, LaneReport};
use crate::core::{EnumerationError, EnumerationResult, FailureMode, ParallelConfig, ParallelSummary};
use crate::services::config::implementations::validated_lanes;
use crate::services::DefaultParallelConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::{ready, Future};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 並列列挙エンジン
///
/// - `Claim`: `Fn() -> Option<usize>`。全レーンから並行に呼ばれる
/// - `Fetch`: `Fn(usize, CancellationToken) -> Future<Output = anyhow::Result<T>>`
///
/// エンジン自身は中断点を持たない。取得とコールバックが同期的に完了するなら、
/// 返される Future は最初のポーリングで完了する。
pub struct ParallelEnumerator<Claim, Fetch, Config = DefaultParallelConfig> {
    claim: Claim,
    fetch: Fetch,
    config: Config,
}

impl<Claim, Fetch> ParallelEnumerator<Claim, Fetch> {
    /// デフォルト設定で作成
    pub fn new(claim: Claim, fetch: Fetch) -> Self {
        Self {
            claim,
            fetch,
            config: DefaultParallelConfig::default(),
        }
    }
}

impl<Claim, Fetch, Config> ParallelEnumerator<Claim, Fetch, Config> {
    /// 設定を差し替える
    pub fn with_config<Other: ParallelConfig>(self, config: Other) -> ParallelEnumerator<Claim, Fetch, Other> {
        ParallelEnumerator {
            claim: self.claim,
            fetch: self.fetch,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<Claim, Fetch, Config> ParallelEnumerator<Claim, Fetch, Config>
where
    Config: ParallelConfig,
    Claim: Fn() -> Option<usize>,
{
    /// 非同期コールバックで並列列挙する
    ///
    /// コールバックまで正常に届いた要素数を返す。
    /// 失敗があれば全レーン終了後に `FailureMode` に従って報告する。
    pub async fn enumerate_in_parallel<T, FetchFut, Consume, ConsumeFut>(
        &self,
        cancel: &CancellationToken,
        consume: Consume,
    ) -> EnumerationResult<usize>
    where
        Fetch: Fn(usize, CancellationToken) -> FetchFut,
        FetchFut: Future<Output = anyhow::Result<T>>,
        Consume: Fn(T) -> ConsumeFut,
        ConsumeFut: Future<Output = anyhow::Result<()>>,
    {
        let (summary, failures) = self.run(cancel, consume).await?;
        surface_failures(self.config.failure_mode(), failures)?;
        Ok(summary.items_processed)
    }

    /// 同期コールバックで並列列挙する
    pub async fn enumerate_in_parallel_sync<T, FetchFut, Consume>(
        &self,
        cancel: &CancellationToken,
        consume: Consume,
    ) -> EnumerationResult<usize>
    where
        Fetch: Fn(usize, CancellationToken) -> FetchFut,
        FetchFut: Future<Output = anyhow::Result<T>>,
        Consume: Fn(T) -> anyhow::Result<()>,
    {
        self.enumerate_in_parallel(cancel, |item| ready(consume(item)))
            .await
    }

    /// 並列列挙してサマリーを返す
    ///
    /// 要素単位の失敗はエラーにせず、警告ログを出して `failed_items` に数える。
    /// エラーになるのは設定が不正な場合だけ。
    pub async fn enumerate_in_parallel_with_summary<T, FetchFut, Consume, ConsumeFut>(
        &self,
        cancel: &CancellationToken,
        consume: Consume,
    ) -> EnumerationResult<ParallelSummary>
    where
        Fetch: Fn(usize, CancellationToken) -> FetchFut,
        FetchFut: Future<Output = anyhow::Result<T>>,
        Consume: Fn(T) -> ConsumeFut,
        ConsumeFut: Future<Output = anyhow::Result<()>>,
    {
        let (summary, failures) = self.run(cancel, consume).await?;
        for failure in &failures {
            warn!(error = %failure, "parallel item failed");
        }
        Ok(summary)
    }

    async fn run<T, FetchFut, Consume, ConsumeFut>(
        &self,
        cancel: &CancellationToken,
        consume: Consume,
    ) -> EnumerationResult<(ParallelSummary, Vec<EnumerationError>)>
    where
        Fetch: Fn(usize, CancellationToken) -> FetchFut,
        FetchFut: Future<Output = anyhow::Result<T>>,
        Consume: Fn(T) -> ConsumeFut,
        ConsumeFut: Future<Output = anyhow::Result<()>>,
    {
        let lane_count = validated_lanes(&self.config)?;
        let started = Instant::now();
        debug!(lanes = lane_count, "parallel enumeration started");

        let mut lanes: FuturesUnordered<_> = (0..lane_count)
            .map(|lane| run_lane(lane, &self.claim, &self.fetch, &consume, cancel))
            .collect();

        let mut processed = 0;
        let mut failures = Vec::new();
        while let Some(LaneReport {
            processed: lane_processed,
            failures: lane_failures,
        }) = lanes.next().await
        {
            processed += lane_processed;
            failures.extend(lane_failures);
        }

        let summary = ParallelSummary {
            items_processed: processed,
            failed_items: failures.len(),
            lanes: lane_count,
            total_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        debug!(
            processed = summary.items_processed,
            failed = summary.failed_items,
            elapsed_ms = summary.total_time_ms,
            "parallel enumeration finished"
        );
        Ok((summary, failures))
    }
}

impl<Claim, Fetch, Config> std::fmt::Debug for ParallelEnumerator<Claim, Fetch, Config>
where
    Config: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelEnumerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 失敗を報告方法に従ってまとめる
fn surface_failures(mode: FailureMode, failures: Vec<EnumerationError>) -> EnumerationResult<()> {
    if failures.is_empty() {
        return Ok(());
    }

    match mode {
        FailureMode::FirstError => {
            let mut failures = failures.into_iter();
            let Some(first) = failures.next() else {
                return Ok(());
            };
            for rest in failures {
                warn!(error = %rest, "additional parallel failure");
            }
            Err(first)
        }
        FailureMode::CollectAll => Err(EnumerationError::aggregate(failures)),
    }
}
