// 並列列挙エンジンの統合テスト
use crate::fixtures::fixed_config;
use anyhow::Result;
use async_enum::{CountdownClaim, DefaultParallelConfig, FailureMode, ParallelEnumerator};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::ready;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_countdown_scenario_with_async_fetch() -> Result<()> {
    let cancel = CancellationToken::new();
    let claim = CountdownClaim::new(10);
    let state: Vec<AtomicUsize> = (0..10).map(|_| AtomicUsize::new(0)).collect();
    let engine = ParallelEnumerator::new(
        || claim.claim(),
        |index: usize, _cancel: CancellationToken| async move {
            tokio::time::sleep(Duration::from_millis((index % 3) as u64)).await;
            Ok::<_, anyhow::Error>(10 - index)
        },
    );

    let total = engine
        .enumerate_in_parallel(&cancel, |value: usize| {
            state[value].fetch_add(1, Ordering::SeqCst);
            ready(Ok(()))
        })
        .await?;

    assert_eq!(total, 10);
    assert!(state.iter().all(|count| count.load(Ordering::SeqCst) == 1));
    Ok(())
}

#[tokio::test]
async fn test_synchronous_run_matches_async_run() -> Result<()> {
    let cancel = CancellationToken::new();

    // 一回目: 同期的な取得で、最初のポーリングで完了する
    let sync_claim = CountdownClaim::new(500);
    let sync_seen = Mutex::new(HashMap::new());
    let sync_engine = ParallelEnumerator::new(
        || sync_claim.claim(),
        |index: usize, _cancel: CancellationToken| ready(Ok::<_, anyhow::Error>(index * 2)),
    )
    .with_config(DefaultParallelConfig::new(2));
    let sync_total = sync_engine
        .enumerate_in_parallel_sync(&cancel, |value: usize| {
            *sync_seen.lock().unwrap().entry(value).or_insert(0) += 1;
            Ok(())
        })
        .now_or_never()
        .expect("同期的な取得なら最初のポーリングで完了する")?;

    // 二回目: 取得のたびに実行を譲る非同期の取得
    let async_claim = CountdownClaim::new(500);
    let async_seen = Mutex::new(HashMap::new());
    let async_engine = ParallelEnumerator::new(
        || async_claim.claim(),
        |index: usize, _cancel: CancellationToken| async move {
            tokio::task::yield_now().await;
            Ok::<_, anyhow::Error>(index * 2)
        },
    )
    .with_config(DefaultParallelConfig::new(2));
    let async_total = async_engine
        .enumerate_in_parallel(&cancel, |value: usize| {
            *async_seen.lock().unwrap().entry(value).or_insert(0) += 1;
            ready(Ok(()))
        })
        .await?;

    let sync_seen = sync_seen.into_inner().unwrap();
    let async_seen = async_seen.into_inner().unwrap();
    assert_eq!(sync_total, 500);
    assert_eq!(sync_total, async_total);
    assert_eq!(sync_seen, async_seen);
    assert!(sync_seen.values().all(|count| *count == 1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mocked_config_with_collect_all() -> Result<()> {
    let cancel = CancellationToken::new();
    let claim = CountdownClaim::new(12);
    let engine = ParallelEnumerator::new(
        || claim.claim(),
        |index: usize, _cancel: CancellationToken| async move {
            tokio::task::yield_now().await;
            if index % 4 == 0 {
                anyhow::bail!("添字 {index} は取得できない");
            }
            Ok(index)
        },
    )
    .with_config(fixed_config(3, FailureMode::CollectAll));

    let delivered = AtomicUsize::new(0);
    let result = engine
        .enumerate_in_parallel_sync(&cancel, |_: usize| {
            delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    let error = result.expect_err("3 件の取得失敗");
    assert!(error.to_string().contains('3'));
    assert_eq!(delivered.load(Ordering::SeqCst), 9);
    assert_eq!(claim.remaining(), 0);
    Ok(())
}

#[tokio::test]
async fn test_summary_reports_lane_count() -> Result<()> {
    let cancel = CancellationToken::new();
    let claim = CountdownClaim::new(20);
    let engine = ParallelEnumerator::new(
        || claim.claim(),
        |index: usize, _cancel: CancellationToken| ready(Ok::<_, anyhow::Error>(index)),
    )
    .with_config(DefaultParallelConfig::new(1).with_max_lanes(5));

    let summary = engine
        .enumerate_in_parallel_with_summary(&cancel, |_: usize| ready(Ok(())))
        .await?;

    assert_eq!(summary.items_processed, 20);
    assert_eq!(summary.failed_items, 0);
    assert_eq!(summary.lanes, 5);

    let json = serde_json::to_value(&summary)?;
    assert_eq!(json["items_processed"], 20);
    Ok(())
}
