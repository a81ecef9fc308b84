//! Integration tests for Store action broadcasting
//!
//! Covers the request/response pattern the session manager relies on:
//! correlated terminal actions and consistent state on receipt.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use streckenheld_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use streckenheld_runtime::{Store, StoreError};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a multi-step job with correlation ID
    Start { id: u64 },
    /// Job step completed
    StepCompleted { id: u64, step: u32 },
    /// Job finished (terminal action)
    Completed { id: u64 },
    /// Simple increment command
    Increment,
    /// Incremented event
    Incremented { value: u32 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    counter: u32,
    steps: Vec<(u64, u32)>,
    completed: Vec<u64>,
}

struct TestEnvironment;

struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = TestEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::Start { id } => smallvec![Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some(TestAction::StepCompleted { id, step: 1 })
            })],
            TestAction::StepCompleted { id, step } => {
                state.steps.push((id, step));
                if step < 3 {
                    smallvec![Effect::future(async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Some(TestAction::StepCompleted { id, step: step + 1 })
                    })]
                } else {
                    smallvec![Effect::future(async move { Some(TestAction::Completed { id }) })]
                }
            },
            TestAction::Completed { id } => {
                state.completed.push(id);
                smallvec![Effect::None]
            },
            TestAction::Increment => {
                state.counter += 1;
                let value = state.counter;
                smallvec![Effect::future(async move { Some(TestAction::Incremented { value }) })]
            },
            TestAction::Incremented { .. } => smallvec![Effect::None],
        }
    }
}

fn store() -> Store<TestState, TestAction, TestEnvironment, TestReducer> {
    Store::new(TestState::default(), TestReducer, TestEnvironment)
}

// ============================================================================
// Tests
// ============================================================================

/// The terminal action arrives after its state change is visible
#[tokio::test]
async fn test_terminal_action_sees_its_state() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::Start { id: 42 },
            |action| matches!(action, TestAction::Completed { id: 42 }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, TestAction::Completed { id: 42 });
    let (steps, completed) = store
        .state(|s| (s.steps.clone(), s.completed.clone()))
        .await;
    assert_eq!(steps, vec![(42, 1), (42, 2), (42, 3)]);
    assert_eq!(completed, vec![42]);
}

/// Concurrent waiters each get their own correlated result
#[tokio::test]
async fn test_correlation_id_filtering() {
    let store = Arc::new(store());

    let mut handles = vec![];
    for id in 1..=4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    TestAction::Start { id },
                    move |action| matches!(action, TestAction::Completed { id: done } if *done == id),
                    Duration::from_secs(2),
                )
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.expect("Task panicked");
        assert_eq!(
            result.unwrap(),
            TestAction::Completed { id: i as u64 + 1 }
        );
    }

    assert_eq!(store.state(|s| s.steps.len()).await, 12);
}

/// Only effect-produced actions are broadcast
#[tokio::test]
async fn test_initial_actions_not_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    let mut handle = store.send(TestAction::Increment).await.unwrap();
    handle.wait().await;

    let actions: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(actions, vec![TestAction::Incremented { value: 1 }]);
}

/// Waiting after shutdown fails fast
#[tokio::test]
async fn test_send_and_wait_for_after_shutdown() {
    let store = store();
    store.shutdown(Duration::from_millis(50)).await.unwrap();

    let result = store
        .send_and_wait_for(
            TestAction::Increment,
            |_| true,
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(result, Err(StoreError::ShutdownInProgress));
}

/// State watchers see the final state of a job
#[tokio::test]
async fn test_state_subscription_tracks_job() {
    let store = store();
    let mut rx = store.subscribe_state();

    store
        .send_and_wait_for(
            TestAction::Start { id: 7 },
            |action| matches!(action, TestAction::Completed { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    let completed = rx.borrow_and_update().completed.clone();
    assert_eq!(completed, vec![7]);
}
