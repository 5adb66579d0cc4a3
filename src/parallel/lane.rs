// レーン - 要求 → 取得 → コールバックを要求が尽きるまで繰り返す

use crate::core::{EnumerationError, ProducerStage};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 一本のレーンの実行結果
#[derive(Debug, Default)]
pub(crate) struct LaneReport {
    pub(crate) processed: usize,
    pub(crate) failures: Vec<EnumerationError>,
}

/// レーンを一本実行する
///
/// 取得・コールバックの失敗は記録して次の要求へ進む。
/// 自分からは中断点を作らないので、全て即座に完了すれば一度のポーリングで終わる。
pub(crate) async fn run_lane<T, Claim, Fetch, FetchFut, Consume, ConsumeFut>(
    lane: usize,
    claim: &Claim,
    fetch: &Fetch,
    consume: &Consume,
    cancel: &CancellationToken,
) -> LaneReport
where
    Claim: Fn() -> Option<usize>,
    Fetch: Fn(usize, CancellationToken) -> FetchFut,
    FetchFut: Future<Output = anyhow::Result<T>>,
    Consume: Fn(T) -> ConsumeFut,
    ConsumeFut: Future<Output = anyhow::Result<()>>,
{
    let mut report = LaneReport::default();

    while let Some(index) = claim() {
        trace!(lane, index, "claimed");

        let item = match fetch(index, cancel.clone()).await {
            Ok(item) => item,
            Err(error) => {
                debug!(lane, index, error = %error, "fetch failed");
                report.failures.push(EnumerationError::producer(ProducerStage::Fetch, error));
                continue;
            }
        };

        match consume(item).await {
            Ok(()) => report.processed += 1,
            Err(error) => {
                debug!(lane, index, error = %error, "consumer failed");
                report
                    .failures
                    .push(EnumerationError::producer(ProducerStage::Consumer, error));
            }
        }
    }

    debug!(lane, processed = report.processed, failed = report.failures.len(), "lane finished");
    report
}
