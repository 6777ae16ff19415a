use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use repocache_flight::{CallError, CallGroup};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

type Group = CallGroup<Arc<String>, String>;

/// Producer that counts invocations and blocks until the gate opens.
fn gated(
    counter: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
    result: Result<&'static str, &'static str>,
) -> impl FnOnce(CancellationToken, String) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Arc<String>, String>> + Send>,
> {
    move |_ctx, _key| {
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
            result
                .map(|v| Arc::new(v.to_string()))
                .map_err(|e| e.to_string())
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_producer() {
    let group = Arc::new(Group::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let ctx = CancellationToken::new();

    let calls = (0..16).map(|_| {
        let group = Arc::clone(&group);
        let counter = Arc::clone(&counter);
        let gate = Arc::clone(&gate);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            group
                .call(&ctx, "https://example.com/repo", gated(counter, gate, Ok("tree")))
                .await
        })
    });
    let handles: Vec<_> = calls.collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.add_permits(1);

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 16);
    for r in &results {
        assert!(Arc::ptr_eq(r, &results[0]));
    }
}

#[tokio::test]
async fn completed_outcome_is_memoized() {
    let group = Group::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(10));
    let ctx = CancellationToken::new();

    let first = group
        .call(&ctx, "k", gated(counter.clone(), gate.clone(), Ok("one")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = group
        .call(&ctx, "k", gated(counter.clone(), gate.clone(), Ok("two")))
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.as_str(), "one");
}

#[tokio::test]
async fn failure_is_memoized_not_retried() {
    let group = Group::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(10));
    let ctx = CancellationToken::new();

    let first = group
        .call(&ctx, "z", gated(counter.clone(), gate.clone(), Err("boom")))
        .await;
    let second = group
        .call(&ctx, "z", gated(counter.clone(), gate.clone(), Ok("fine")))
        .await;

    assert_eq!(first, Err(CallError::Failed("boom".to_string())));
    assert_eq!(second, first);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_keys_run_independently() {
    let group = Group::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(10));
    let ctx = CancellationToken::new();

    let a = group.call(&ctx, "a", gated(counter.clone(), gate.clone(), Ok("A")));
    let b = group.call(&ctx, "b", gated(counter.clone(), gate.clone(), Ok("B")));
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.unwrap().as_str(), "A");
    assert_eq!(b.unwrap().as_str(), "B");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(group.keys(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_waiter_leaves_producer_and_others_alone() {
    let group = Arc::new(Group::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let owner_ctx = CancellationToken::new();
    let owner = {
        let group = Arc::clone(&group);
        let (counter, gate) = (counter.clone(), gate.clone());
        tokio::spawn(async move {
            group
                .call(&owner_ctx, "k", gated(counter, gate, Ok("tree")))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let impatient = CancellationToken::new();
    let waiter = {
        let group = Arc::clone(&group);
        let (counter, gate) = (counter.clone(), gate.clone());
        let impatient = impatient.clone();
        tokio::spawn(async move {
            group
                .call(&impatient, "k", gated(counter, gate, Ok("other")))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    impatient.cancel();

    assert_eq!(waiter.await.unwrap(), Err(CallError::Cancelled));
    assert!(group.is_pending("k"));

    gate.add_permits(1);
    assert_eq!(owner.await.unwrap().unwrap().as_str(), "tree");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn launch_starts_once_and_call_attaches() {
    let group = Group::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let ctx = CancellationToken::new();

    assert!(group.launch(&ctx, "k", gated(counter.clone(), gate.clone(), Ok("pre"))));
    assert!(!group.launch(&ctx, "k", gated(counter.clone(), gate.clone(), Ok("dup"))));
    assert_eq!(group.outcome("k"), None);

    gate.add_permits(1);
    let got = group
        .call(&ctx, "k", gated(counter.clone(), gate.clone(), Ok("late")))
        .await
        .unwrap();

    assert_eq!(got.as_str(), "pre");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(group.outcome("k").map(|r| r.unwrap()), Some(got));
    assert_eq!(group.len(), 1);
}

#[tokio::test]
async fn creator_token_governs_producer() {
    let group: CallGroup<u32, String> = CallGroup::new();
    let creator = CancellationToken::new();
    creator.cancel();

    let first = group
        .call(&creator, "k", |ctx, _| async move {
            if ctx.is_cancelled() {
                Err("producer cancelled".to_string())
            } else {
                Ok(1)
            }
        })
        .await;
    assert!(matches!(
        first,
        Err(CallError::Cancelled) | Err(CallError::Failed(_))
    ));

    // A later caller with a live token still observes the creator's fate.
    let later = group
        .call(&CancellationToken::new(), "k", |_, _| async { Ok(2) })
        .await;
    assert_eq!(
        later,
        Err(CallError::Failed("producer cancelled".to_string()))
    );
}

#[tokio::test]
async fn panicking_producer_is_reported_as_abandoned() {
    let group: CallGroup<u32, String> = CallGroup::new();
    let ctx = CancellationToken::new();

    let got = group
        .call(&ctx, "bad", |_, _| async {
            let explode = true;
            if explode {
                panic!("producer exploded");
            }
            Ok(1)
        })
        .await;
    assert_eq!(
        got,
        Err(CallError::Abandoned {
            key: "bad".to_string()
        })
    );

    let again = group.call(&ctx, "bad", |_, _| async { Ok(1) }).await;
    assert!(matches!(again, Err(CallError::Abandoned { .. })));
}
