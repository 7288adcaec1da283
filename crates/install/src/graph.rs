//! Dependency graph executor for pipeline stages

use crate::stage::Stage;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use sideload_errors::Error;
use sideload_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, PipelineEvent, ProgressTracker,
    StageKind,
};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Resolution of one node as seen by its dependents. `None` while pending.
pub type StageSignal = watch::Receiver<Option<Result<(), Error>>>;

/// Index of a node inside its [`PipelineGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(usize);

struct NodeEnv {
    deps: Vec<StageSignal>,
    pool: Arc<Semaphore>,
    timeout: Duration,
    events: Option<EventSender>,
    batch_id: String,
}

type NodeTask = Box<dyn FnOnce(NodeEnv) -> BoxFuture<'static, ()> + Send>;

struct Node {
    deps: Vec<StageId>,
    /// `None` for signals owned by another graph
    task: Option<NodeTask>,
}

enum Blocked {
    Cancelled,
    Dependency(Error),
}

/// A batch's stages and the edges between them
///
/// Nodes can only depend on nodes added before them, so the graph is acyclic
/// by construction.
pub struct PipelineGraph {
    batch_id: String,
    nodes: Vec<Node>,
    signals: Vec<StageSignal>,
}

impl PipelineGraph {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            nodes: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Add a stage that starts once every node in `deps` succeeded.
    ///
    /// `handler` receives the stage result exactly once, or the first failed
    /// dependency's error if the stage never ran. Dependents are released
    /// only after the handler returns.
    pub fn add_stage<S, H, Fut>(
        &mut self,
        stage: S,
        app: Option<String>,
        progress: ProgressTracker,
        deps: &[StageId],
        handler: H,
    ) -> StageId
    where
        S: Stage,
        H: FnOnce(Result<S::Output, Error>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug_assert!(
            deps.iter().all(|dep| dep.0 < self.nodes.len()),
            "dependencies must be added before their dependents"
        );

        let (tx, rx) = watch::channel(None);
        let task: NodeTask = Box::new(move |mut env: NodeEnv| {
            Box::pin(async move {
                let kind = stage.kind();
                let reporter = Reporter {
                    events: env.events.take(),
                    batch_id: std::mem::take(&mut env.batch_id),
                    app,
                    stage: kind,
                };

                let outcome = match wait_for_dependencies(&mut env.deps, &progress).await {
                    Err(Blocked::Dependency(err)) => {
                        reporter.skipped();
                        Err(err)
                    }
                    Err(Blocked::Cancelled) => {
                        reporter.failed(&Error::Cancelled);
                        Err(Error::Cancelled)
                    }
                    Ok(()) => {
                        let result =
                            run_stage(&stage, &progress, &env.pool, env.timeout, &reporter).await;
                        match &result {
                            Ok(_) => {
                                progress.finish();
                                reporter.completed();
                            }
                            Err(err) => reporter.failed(err),
                        }
                        result
                    }
                };

                let state = outcome.as_ref().map(|_| ()).map_err(Clone::clone);
                handler(outcome).await;
                tx.send_replace(Some(state));
            })
        });

        self.push(deps, Some(task), rx)
    }

    /// Add a node resolved elsewhere, e.g. the authentication of a batch
    /// this graph joins
    pub fn add_external(&mut self, signal: StageSignal) -> StageId {
        self.push(&[], None, signal)
    }

    fn push(&mut self, deps: &[StageId], task: Option<NodeTask>, signal: StageSignal) -> StageId {
        let id = StageId(self.nodes.len());
        self.nodes.push(Node {
            deps: deps.to_vec(),
            task,
        });
        self.signals.push(signal);
        id
    }

    /// Receiver that resolves with the node's outcome
    #[must_use]
    pub fn signal(&self, id: StageId) -> Option<StageSignal> {
        self.signals.get(id.0).cloned()
    }

    /// Number of stages this graph will run itself
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.task.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Spawn every stage onto the runtime. Stages share `pool` for permits.
    pub fn spawn(
        self,
        pool: Arc<Semaphore>,
        timeout: Duration,
        events: Option<EventSender>,
    ) -> PipelineRun {
        let Self {
            batch_id,
            nodes,
            signals,
        } = self;

        let tasks = nodes
            .into_iter()
            .filter_map(|node| {
                let task = node.task?;
                let env = NodeEnv {
                    deps: node
                        .deps
                        .iter()
                        .filter_map(|dep| signals.get(dep.0).cloned())
                        .collect(),
                    pool: Arc::clone(&pool),
                    timeout,
                    events: events.clone(),
                    batch_id: batch_id.clone(),
                };
                Some(tokio::spawn(task(env)))
            })
            .collect();

        PipelineRun { tasks }
    }
}

/// Handles to the spawned stages of a graph
///
/// Dropping it detaches the stages; they keep running.
pub struct PipelineRun {
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineRun {
    /// Wait until every stage and its handler has returned
    pub async fn join(self) {
        join_all(self.tasks).await;
    }
}

async fn wait_for_dependencies(
    deps: &mut [StageSignal],
    progress: &ProgressTracker,
) -> Result<(), Blocked> {
    let wait_all = async {
        for signal in deps.iter_mut() {
            let resolved = signal
                .wait_for(Option::is_some)
                .await
                .map(|state| Option::clone(&state))
                .map_err(|_| Error::internal("dependency dropped before resolving"))
                .map_err(Blocked::Dependency)?;
            if let Some(Err(err)) = resolved {
                return Err(Blocked::Dependency(err));
            }
        }
        Ok::<(), Blocked>(())
    };

    tokio::select! {
        biased;
        () = progress.cancelled() => Err(Blocked::Cancelled),
        result = wait_all => result,
    }
}

async fn run_stage<S: Stage>(
    stage: &S,
    progress: &ProgressTracker,
    pool: &Semaphore,
    timeout: Duration,
    reporter: &Reporter,
) -> Result<S::Output, Error> {
    let _permit = tokio::select! {
        biased;
        () = progress.cancelled() => return Err(Error::Cancelled),
        permit = pool.acquire() => permit.map_err(|_| Error::internal("stage worker pool closed"))?,
    };
    reporter.started();

    tokio::select! {
        biased;
        () = progress.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(stage.execute(progress)).catch_unwind(),
        ) => {
            match result {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(Error::internal(format!(
                    "{} stage panicked: {}",
                    stage.kind(),
                    panic_message(panic.as_ref())
                ))),
                Err(_) => Err(stage.timeout_error(timeout)),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

struct Reporter {
    events: Option<EventSender>,
    batch_id: String,
    app: Option<String>,
    stage: StageKind,
}

impl EventEmitter for Reporter {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Reporter {
    fn started(&self) {
        self.emit(AppEvent::Pipeline(PipelineEvent::StageStarted {
            batch_id: self.batch_id.clone(),
            app: self.app.clone(),
            stage: self.stage,
        }));
    }

    fn skipped(&self) {
        self.emit(AppEvent::Pipeline(PipelineEvent::StageSkipped {
            batch_id: self.batch_id.clone(),
            app: self.app.clone(),
            stage: self.stage,
        }));
    }

    fn completed(&self) {
        self.emit(AppEvent::Pipeline(PipelineEvent::StageCompleted {
            batch_id: self.batch_id.clone(),
            app: self.app.clone(),
            stage: self.stage,
        }));
    }

    fn failed(&self, err: &Error) {
        self.emit(AppEvent::Pipeline(PipelineEvent::StageFailed {
            batch_id: self.batch_id.clone(),
            app: self.app.clone(),
            stage: self.stage,
            failure: FailureContext::from_error(err),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Step {
        kind: StageKind,
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
        delay: Duration,
    }

    impl Step {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                kind: StageKind::Resign,
                name,
                log: Arc::clone(log),
                fail: false,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Stage for Step {
        type Output = &'static str;

        fn kind(&self) -> StageKind {
            self.kind
        }

        async fn execute(&self, _progress: &ProgressTracker) -> Result<Self::Output, Error> {
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(Error::internal(format!("{} failed", self.name)))
            } else {
                Ok(self.name)
            }
        }
    }

    fn pool() -> Arc<Semaphore> {
        Arc::new(Semaphore::new(4))
    }

    type Results = Arc<Mutex<Vec<(&'static str, Result<&'static str, String>)>>>;

    fn record(
        results: &Results,
        name: &'static str,
    ) -> impl FnOnce(Result<&'static str, Error>) -> futures::future::Ready<()> {
        let results = Arc::clone(results);
        move |result| {
            results
                .lock()
                .unwrap()
                .push((name, result.map_err(|e| e.to_string())));
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn dependencies_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let results: Results = Arc::default();
        let root = ProgressTracker::new("batch", 0);
        let mut graph = PipelineGraph::new("b");

        let mut first = Step::new("first", &log);
        first.delay = Duration::from_millis(20);
        let a = graph.add_stage(first, None, root.child("a", 1, 0), &[], record(&results, "first"));
        let b = graph.add_stage(
            Step::new("second", &log),
            None,
            root.child("b", 1, 0),
            &[a],
            record(&results, "second"),
        );
        graph.add_stage(
            Step::new("third", &log),
            None,
            root.child("c", 1, 0),
            &[a, b],
            record(&results, "third"),
        );
        assert_eq!(graph.stage_count(), 3);

        graph.spawn(pool(), Duration::from_secs(5), None).join().await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(results.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_dependency_skips_dependents_but_calls_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let results: Results = Arc::default();
        let root = ProgressTracker::new("batch", 0);
        let mut graph = PipelineGraph::new("b");

        let mut auth = Step::new("auth", &log);
        auth.fail = true;
        let a = graph.add_stage(auth, None, root.child("a", 1, 0), &[], record(&results, "auth"));
        let b = graph.add_stage(
            Step::new("resign", &log),
            None,
            root.child("b", 1, 0),
            &[a],
            record(&results, "resign"),
        );
        graph.add_stage(
            Step::new("send", &log),
            None,
            root.child("c", 1, 0),
            &[b],
            record(&results, "send"),
        );

        graph.spawn(pool(), Duration::from_secs(5), None).join().await;
        assert_eq!(*log.lock().unwrap(), vec!["auth"]);
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 3);
        for (_, result) in results.iter() {
            assert_eq!(result.as_ref().unwrap_err(), "internal error: auth failed");
        }
    }

    #[tokio::test]
    async fn cancelled_stage_resolves_with_cancelled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(None));
        let root = ProgressTracker::new("batch", 0);
        let mut graph = PipelineGraph::new("b");

        let mut slow = Step::new("slow", &log);
        slow.delay = Duration::from_secs(30);
        let progress = root.child("slow", 1, 0);
        let seen_in_handler = Arc::clone(&seen);
        graph.add_stage(slow, None, progress.clone(), &[], move |result| {
            *seen_in_handler.lock().unwrap() = Some(result.map_err(|e| e.is_cancelled()));
            futures::future::ready(())
        });

        let run = graph.spawn(pool(), Duration::from_secs(60), None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        root.cancel();
        run.join().await;

        assert_eq!(*seen.lock().unwrap(), Some(Err(true)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_exceeding_timeout_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let results: Results = Arc::default();
        let mut graph = PipelineGraph::new("b");

        let mut slow = Step::new("slow", &log);
        slow.delay = Duration::from_secs(5);
        graph.add_stage(
            slow,
            None,
            ProgressTracker::new("slow", 1),
            &[],
            record(&results, "slow"),
        );

        graph
            .spawn(pool(), Duration::from_millis(20), None)
            .join()
            .await;
        let results = results.lock().unwrap();
        assert!(results[0].1.as_ref().unwrap_err().contains("timed out"));
    }

    #[tokio::test]
    async fn panicking_stage_still_reaches_its_handler_and_dependents() {
        struct Explodes;

        #[async_trait]
        impl Stage for Explodes {
            type Output = &'static str;

            fn kind(&self) -> StageKind {
                StageKind::Install
            }

            async fn execute(&self, _progress: &ProgressTracker) -> Result<Self::Output, Error> {
                panic!("helper went away");
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let results: Results = Arc::default();
        let mut graph = PipelineGraph::new("b");
        let install = graph.add_stage(
            Explodes,
            None,
            ProgressTracker::new("install", 1),
            &[],
            record(&results, "install"),
        );
        graph.add_stage(
            Step::new("after", &log),
            None,
            ProgressTracker::new("after", 1),
            &[install],
            record(&results, "after"),
        );

        graph.spawn(pool(), Duration::from_secs(5), None).join().await;
        assert!(log.lock().unwrap().is_empty());
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 2);
        for (_, result) in results.iter() {
            let message = result.as_ref().unwrap_err();
            assert!(message.contains("install stage panicked: helper went away"), "{message}");
        }
    }

    #[tokio::test]
    async fn pool_bounds_parallel_stages() {
        struct Gauge {
            running: Arc<AtomicUsize>,
            peak: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Stage for Gauge {
            type Output = ();

            fn kind(&self) -> StageKind {
                StageKind::Download
            }

            async fn execute(&self, _progress: &ProgressTracker) -> Result<(), Error> {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut graph = PipelineGraph::new("b");
        for _ in 0..8 {
            graph.add_stage(
                Gauge {
                    running: Arc::clone(&running),
                    peak: Arc::clone(&peak),
                },
                None,
                ProgressTracker::new("gauge", 1),
                &[],
                |_| futures::future::ready(()),
            );
        }

        graph
            .spawn(Arc::new(Semaphore::new(2)), Duration::from_secs(5), None)
            .join()
            .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn external_signal_gates_local_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let results: Results = Arc::default();
        let (tx, rx) = watch::channel(None);
        let mut graph = PipelineGraph::new("b");

        let auth = graph.add_external(rx);
        graph.add_stage(
            Step::new("resign", &log),
            None,
            ProgressTracker::new("resign", 1),
            &[auth],
            record(&results, "resign"),
        );
        assert_eq!(graph.stage_count(), 1);

        let run = graph.spawn(pool(), Duration::from_secs(5), None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(log.lock().unwrap().is_empty());

        tx.send_replace(Some(Ok(())));
        run.join().await;
        assert_eq!(*log.lock().unwrap(), vec!["resign"]);
    }

    #[tokio::test]
    async fn successful_stage_finishes_its_progress() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let progress = ProgressTracker::new("step", 10);
        let mut graph = PipelineGraph::new("b");
        graph.add_stage(Step::new("step", &log), None, progress.clone(), &[], |_| {
            futures::future::ready(())
        });
        graph.spawn(pool(), Duration::from_secs(5), None).join().await;
        assert!(progress.is_finished());
    }
}
