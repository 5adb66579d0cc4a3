// 逐次列挙のライフサイクル統合テスト
use crate::fixtures::{scripted_step, CountingCleanup, DelayedSource};
use anyhow::Result;
use async_enum::{
    enumerate_sequentially, AsyncEnumerator, EnumerationError, EnumeratorState, Int32Cell, IterSource,
    Operation, ResetOutcome, SequenceSource, SequentialEnumerator, Started,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_async_source_yields_increasing_tokens() -> Result<()> {
    let cancel = CancellationToken::new();
    let source = DelayedSource::new(vec![10, 20, 30], Duration::from_millis(2));
    let cleanup = source.cleanup();
    let enumerator = SequentialEnumerator::new(source);

    let mut tokens = Vec::new();
    let mut items = Vec::new();
    while let Some(token) = enumerator.advance(&cancel).await? {
        tokens.push(token);
        items.push(enumerator.one_time_retrieve(token).expect("直後のトークンは有効"));
    }

    assert_eq!(items, vec![10, 20, 30]);
    assert!(tokens.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(enumerator.state(), EnumeratorState::Ended);
    assert_eq!(cleanup.calls(), 1);

    // 終了後の前進は何度呼んでも None
    assert_eq!(enumerator.advance(&cancel).await?, None);
    assert_eq!(cleanup.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_reset_after_end_allows_second_pass() -> Result<()> {
    let cancel = CancellationToken::new();
    let source = DelayedSource::new(vec![1, 2], Duration::from_millis(1));
    let cleanup = source.cleanup();
    let enumerator = SequentialEnumerator::new(source);

    let mut first_pass = Vec::new();
    enumerate_sequentially(&enumerator, &cancel, |item| first_pass.push(item)).await?;

    let outcome = enumerator.try_reset(&cancel).await?;
    assert_eq!(
        outcome,
        ResetOutcome::Reset {
            drained: 0,
            cleanup_ran: false
        }
    );
    assert_eq!(enumerator.state(), EnumeratorState::Initial);

    let mut second_pass = Vec::new();
    enumerate_sequentially(&enumerator, &cancel, |item| second_pass.push(item)).await?;

    assert_eq!(first_pass, second_pass);
    assert_eq!(cleanup.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_advances_are_rejected() -> Result<()> {
    let cancel = CancellationToken::new();
    let enumerator = SequentialEnumerator::new(DelayedSource::new(vec![7, 8], Duration::from_millis(5)));

    let (first, second) = tokio::join!(enumerator.advance(&cancel), enumerator.advance(&cancel));

    let token = first?.expect("先に呼んだ前進が進む");
    match second {
        Err(EnumerationError::ConcurrentOperation { operation, state }) => {
            assert_eq!(operation, Operation::Advance);
            assert_eq!(state, EnumeratorState::AdvanceInProgress);
        }
        other => panic!("並行操作エラーを期待: {other:?}"),
    }

    // 衝突した後も列挙子は使える
    assert_eq!(enumerator.one_time_retrieve(token), Some(7));
    let next = enumerator.advance(&cancel).await?.expect("二つ目の要素");
    assert_eq!(enumerator.one_time_retrieve(next), Some(8));
    Ok(())
}

#[tokio::test]
async fn test_reset_during_advance_is_rejected() -> Result<()> {
    let cancel = CancellationToken::new();
    let enumerator = SequentialEnumerator::new(DelayedSource::new(vec![1], Duration::from_millis(5)));

    let (advanced, reset) = tokio::join!(enumerator.advance(&cancel), enumerator.try_reset(&cancel));

    assert!(advanced?.is_some());
    let error = reset.expect_err("前進中のリセットは失敗する");
    assert!(matches!(
        error,
        EnumerationError::ConcurrentOperation {
            operation: Operation::Reset,
            ..
        }
    ));
    assert!(error.is_recoverable());
    Ok(())
}

#[tokio::test]
async fn test_token_is_invalidated_by_reset() -> Result<()> {
    let cancel = CancellationToken::new();
    let source = DelayedSource::new(vec![1, 2, 3, 4], Duration::from_millis(1));
    let cleanup = source.cleanup();
    let enumerator = SequentialEnumerator::new(source);

    let token = enumerator.advance(&cancel).await?.expect("最初の要素");
    let outcome = enumerator.try_reset(&cancel).await?;

    assert_eq!(
        outcome,
        ResetOutcome::Reset {
            drained: 3,
            cleanup_ran: true
        }
    );
    assert_eq!(enumerator.one_time_retrieve(token), None);
    assert_eq!(cleanup.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tokens_keep_increasing_across_passes() -> Result<()> {
    let cancel = CancellationToken::new();
    let source = DelayedSource::new(vec![1, 2, 3], Duration::from_millis(1));
    let enumerator = SequentialEnumerator::new(source);

    enumerator.advance(&cancel).await?;
    let old = enumerator.advance(&cancel).await?.expect("二番目の要素");
    assert_eq!(enumerator.one_time_retrieve(old), Some(2));

    enumerator.try_reset(&cancel).await?;
    let mut tokens = Vec::new();
    for _ in 0..2 {
        tokens.push(enumerator.advance(&cancel).await?.expect("二巡目の要素"));
    }

    assert!(tokens.iter().all(|token| *token > old));
    assert_eq!(enumerator.one_time_retrieve(old), None);
    assert_eq!(enumerator.one_time_retrieve(tokens[1]), Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mocked_step_with_numeric_cell() -> Result<()> {
    struct ScriptedSource;

    #[async_trait]
    impl SequenceSource<i32> for ScriptedSource {
        async fn start(&self, _cancel: &CancellationToken) -> Result<Started<i32>> {
            Ok(Started::item(1i32, Arc::new(scripted_step(vec![2, 3]))).with_cleanup(CountingCleanup::new()))
        }
    }

    let cancel = CancellationToken::new();
    let enumerator: Box<dyn AsyncEnumerator<i32>> =
        Box::new(SequentialEnumerator::<i32, Int32Cell>::with_cell(ScriptedSource));

    let mut sum = 0;
    let count = enumerate_sequentially(&enumerator, &cancel, |item| sum += item).await?;

    assert_eq!(count, 3);
    assert_eq!(sum, 6);
    assert!(matches!(enumerator.try_reset(&cancel).await?, ResetOutcome::Reset { .. }));
    Ok(())
}

#[tokio::test]
async fn test_iter_source_cleanup_runs_once_per_pass() -> Result<()> {
    let cancel = CancellationToken::new();
    let cleanup = CountingCleanup::new();
    let enumerator = SequentialEnumerator::new(IterSource::new(vec!["a", "b"]).with_cleanup(cleanup.clone()));

    assert_eq!(enumerator.try_reset(&cancel).await?, ResetOutcome::AlreadyInitial);
    enumerate_sequentially(&enumerator, &cancel, |_| {}).await?;
    enumerator.try_reset(&cancel).await?;
    enumerate_sequentially(&enumerator, &cancel, |_| {}).await?;

    assert_eq!(cleanup.calls(), 2);
    Ok(())
}
