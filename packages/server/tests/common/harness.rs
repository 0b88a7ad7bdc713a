//! Test harness over the in-memory dependencies.
//!
//! Every test gets a fresh store, directory, transport and push mock. Push
//! jobs are not run by a background worker: they queue up on the harness so
//! a test can look at them and dispatch them at a chosen instant.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use securechat_core::config::ChatSettings;
use securechat_core::domains::chat::effects::{PushDispatcher, PushJob};
use securechat_core::kernel::test_dependencies::{
    MemoryChatStore, MockDirectory, MockPushNotificationService, TestTransport,
};
use securechat_core::kernel::{ServerDeps, TestDependencies};
use test_context::AsyncTestContext;
use tokio::sync::mpsc::UnboundedReceiver;

/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let alice = ctx.directory.add_user("Alice", "Adams");
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub deps: ServerDeps,
    pub store: Arc<MemoryChatStore>,
    pub directory: Arc<MockDirectory>,
    pub transport: Arc<TestTransport>,
    pub push: Arc<MockPushNotificationService>,
    push_rx: Mutex<UnboundedReceiver<PushJob>>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new(TestDependencies::new())
    }

    async fn teardown(self) {}
}

impl TestHarness {
    pub fn new(test_deps: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let store = test_deps.store.clone();
        let directory = test_deps.directory.clone();
        let transport = test_deps.transport.clone();
        let push = test_deps.push_service.clone();
        let (deps, push_rx) = test_deps.into_deps();

        Self {
            deps,
            store,
            directory,
            transport,
            push,
            push_rx: Mutex::new(push_rx),
        }
    }

    pub fn with_settings(settings: ChatSettings) -> Self {
        Self::new(TestDependencies::new().settings(settings))
    }

    pub fn with_push(service: MockPushNotificationService) -> Self {
        Self::new(TestDependencies::new().mock_push(service))
    }

    /// Push jobs enqueued since the last call.
    pub fn take_push_jobs(&self) -> Vec<PushJob> {
        let mut rx = self.push_rx.lock().unwrap();
        let mut jobs = Vec::new();
        while let Ok(job) = rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    /// Runs one push job as the worker would at `now`.
    pub async fn dispatch_push(&self, job: &PushJob, now: DateTime<Utc>) -> usize {
        PushDispatcher::from_deps(&self.deps)
            .dispatch(job, now)
            .await
            .expect("push dispatch failed")
    }
}
