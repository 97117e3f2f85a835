use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use steptest_core::error::ParseError;
use steptest_core::parser::parse_job;

use crate::executor::events::{Event, EventSink, NoOpEventSink};
use crate::executor::http::{HttpClient, ReqwestHttpClient};
use crate::executor::result::{ResultError, RunResult};
use crate::executor::worker::{fetch_worker, QueuedJob};

const DEFAULT_VIRTUAL_USERS: usize = 100;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("the server is not in a running state")]
    NotRunning,
    #[error("the server is not accepting new jobs")]
    NotAccepting,
    #[error("failed to build the default transport: {0}")]
    Transport(String),
}

/// Count of jobs submitted but not yet completed. `wait` parks until the
/// count returns to zero, which gates queue closure behind every pending
/// enqueue and every in-flight job.
pub(crate) struct Outstanding {
    count: AtomicUsize,
    notify: Notify,
}

impl Outstanding {
    fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub(crate) fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Shared state between the server handle and its spawned tasks.
struct Inner {
    // Queue sender lives in a slot so shutdown can drop it; enqueuer tasks
    // hold clones, so the queue only closes once every pending send is done.
    job_tx: StdMutex<Option<mpsc::Sender<QueuedJob>>>,
    job_rx: Arc<AsyncMutex<mpsc::Receiver<QueuedJob>>>,

    batch_tx: StdMutex<Option<mpsc::UnboundedSender<Vec<RunResult>>>>,
    batch_rx: StdMutex<Option<mpsc::UnboundedReceiver<Vec<RunResult>>>>,

    submitted_tx: StdMutex<Option<mpsc::UnboundedSender<()>>>,
    submitted_rx: StdMutex<Option<mpsc::UnboundedReceiver<()>>>,
    completed_tx: StdMutex<Option<mpsc::UnboundedSender<()>>>,
    completed_rx: StdMutex<Option<mpsc::UnboundedReceiver<()>>>,

    submitted_count: AtomicUsize,
    completed_count: AtomicUsize,

    /// Appended to only by the single result collector task.
    results: RwLock<Vec<RunResult>>,

    outstanding: Arc<Outstanding>,
    running: AtomicBool,
    stopping: AtomicBool,
    started_at: RwLock<Option<Instant>>,
    finished_at: RwLock<Option<Instant>>,

    workers: StdMutex<Vec<JoinHandle<()>>>,
    collectors: StdMutex<Vec<JoinHandle<()>>>,
}

/// The load-test server: parses submitted jobs and runs them on a pool of
/// virtual users, aggregating results and counters.
///
/// All methods take `&self`; a `Server` is usually wrapped in an `Arc` and
/// shared between the submitting side and whoever awaits `wait_done`. It
/// must live inside a tokio runtime.
pub struct Server {
    virtual_users: usize,
    transport: Arc<dyn HttpClient>,
    event_sink: Arc<dyn EventSink>,
    inner: Arc<Inner>,
}

impl Server {
    /// Build a server with `virtual_users` workers (0 means the default of
    /// 100) and a request timeout of `timeout_ms` (0 means 30000). The
    /// timeout only applies to the default transport; a supplied transport
    /// handles its own.
    pub fn new(
        virtual_users: usize,
        timeout_ms: u64,
        transport: Option<Arc<dyn HttpClient>>,
    ) -> Result<Self, EngineError> {
        let virtual_users = if virtual_users == 0 {
            DEFAULT_VIRTUAL_USERS
        } else {
            virtual_users
        };
        let timeout_ms = if timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            timeout_ms
        };

        let transport: Arc<dyn HttpClient> = match transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestHttpClient::with_timeout(Duration::from_millis(timeout_ms))
                    .map_err(|e| EngineError::Transport(e.to_string()))?,
            ),
        };

        let (job_tx, job_rx) = mpsc::channel(1);
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let (submitted_tx, submitted_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        Ok(Self {
            virtual_users,
            transport,
            event_sink: Arc::new(NoOpEventSink),
            inner: Arc::new(Inner {
                job_tx: StdMutex::new(Some(job_tx)),
                job_rx: Arc::new(AsyncMutex::new(job_rx)),
                batch_tx: StdMutex::new(Some(batch_tx)),
                batch_rx: StdMutex::new(Some(batch_rx)),
                submitted_tx: StdMutex::new(Some(submitted_tx)),
                submitted_rx: StdMutex::new(Some(submitted_rx)),
                completed_tx: StdMutex::new(Some(completed_tx)),
                completed_rx: StdMutex::new(Some(completed_rx)),
                submitted_count: AtomicUsize::new(0),
                completed_count: AtomicUsize::new(0),
                results: RwLock::new(Vec::new()),
                outstanding: Arc::new(Outstanding::new()),
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                started_at: RwLock::new(None),
                finished_at: RwLock::new(None),
                workers: StdMutex::new(Vec::new()),
                collectors: StdMutex::new(Vec::new()),
            }),
        })
    }

    /// Replace the default no-op event sink. Call before `start`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Parse a job text and queue it for execution. Parse failures return
    /// immediately and enqueue nothing. The actual enqueue happens on a
    /// spawned task, so a full queue never blocks the submitter.
    pub fn add_job(&self, steps: &str, vars: BTreeMap<String, String>) -> Result<(), EngineError> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Err(EngineError::NotAccepting);
        }
        let Some(job_tx) = lock(&self.inner.job_tx).clone() else {
            return Err(EngineError::NotAccepting);
        };

        let job = parse_job(steps, vars)?;
        let queued = QueuedJob {
            id: Uuid::new_v4(),
            job,
        };

        self.inner.outstanding.add();
        let submitted_tx = lock(&self.inner.submitted_tx).clone();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match job_tx.send(queued).await {
                Ok(()) => {
                    if let Some(submitted_tx) = submitted_tx {
                        let _ = submitted_tx.send(());
                    }
                }
                // Queue closed under us; release the gate so a drain in
                // progress can finish.
                Err(_) => inner.outstanding.done(),
            }
        });

        Ok(())
    }

    /// Spawn the result collector, the counter collectors and the fetch
    /// workers. Idempotent; jobs may be submitted before or after.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        *write(&self.inner.started_at) = Some(Instant::now());

        let mut collectors = lock(&self.inner.collectors);

        if let Some(mut batch_rx) = lock(&self.inner.batch_rx).take() {
            let inner = Arc::clone(&self.inner);
            collectors.push(tokio::spawn(async move {
                while let Some(batch) = batch_rx.recv().await {
                    write(&inner.results).extend(batch);
                }
            }));
        }
        if let Some(mut submitted_rx) = lock(&self.inner.submitted_rx).take() {
            let inner = Arc::clone(&self.inner);
            collectors.push(tokio::spawn(async move {
                while submitted_rx.recv().await.is_some() {
                    inner.submitted_count.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        if let Some(mut completed_rx) = lock(&self.inner.completed_rx).take() {
            let inner = Arc::clone(&self.inner);
            collectors.push(tokio::spawn(async move {
                while completed_rx.recv().await.is_some() {
                    inner.completed_count.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        drop(collectors);

        let batch_tx = lock(&self.inner.batch_tx).clone();
        let completed_tx = lock(&self.inner.completed_tx).clone();
        let (Some(batch_tx), Some(completed_tx)) = (batch_tx, completed_tx) else {
            return;
        };

        let mut workers = lock(&self.inner.workers);
        for _ in 0..self.virtual_users {
            workers.push(tokio::spawn(fetch_worker(
                Arc::clone(&self.inner.job_rx),
                Arc::clone(&self.transport),
                Arc::clone(&self.event_sink),
                completed_tx.clone(),
                batch_tx.clone(),
                Arc::clone(&self.inner.outstanding),
            )));
        }
        drop(workers);

        let events = Arc::clone(&self.event_sink);
        let virtual_users = self.virtual_users;
        tokio::spawn(async move {
            events.emit(Event::ServerStarted { virtual_users }).await;
        });
    }

    /// Block until every submitted job has been executed, then shut the
    /// pool down and drain the collectors. Counters and results are exact
    /// afterwards.
    pub async fn wait_done(&self) {
        self.inner.outstanding.wait().await;
        self.shutdown().await;
    }

    /// Stop accepting new jobs, drain what was already submitted, and shut
    /// down. Errors when the server is not running.
    pub async fn stop_running(&self) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.outstanding.wait().await;
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        // Closing the queue: drop our sender; enqueuer tasks hold clones,
        // so pending sends complete first. Workers exit on queue close.
        lock(&self.inner.job_tx).take();

        let workers: Vec<_> = lock(&self.inner.workers).drain(..).collect();
        for handle in workers {
            let _ = handle.await;
        }

        // With the workers gone, dropping our ends of the batch and counter
        // channels lets the collectors drain and finish.
        lock(&self.inner.batch_tx).take();
        lock(&self.inner.submitted_tx).take();
        lock(&self.inner.completed_tx).take();

        let collectors: Vec<_> = lock(&self.inner.collectors).drain(..).collect();
        for handle in collectors {
            let _ = handle.await;
        }

        if self.inner.running.swap(false, Ordering::SeqCst) {
            *write(&self.inner.finished_at) = Some(Instant::now());
            self.event_sink.emit(Event::ServerStopped).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn number_of_virtual_users(&self) -> usize {
        self.virtual_users
    }

    /// Jobs submitted so far. Eventually consistent while running; exact
    /// after `wait_done`/`stop_running`.
    pub fn number_of_jobs(&self) -> usize {
        self.inner.submitted_count.load(Ordering::Relaxed)
    }

    /// Jobs executed so far. Same consistency as `number_of_jobs`.
    pub fn number_of_requests(&self) -> usize {
        self.inner.completed_count.load(Ordering::Relaxed)
    }

    pub fn number_of_errors(&self) -> usize {
        read(&self.inner.results)
            .iter()
            .filter(|r| r.err.is_some())
            .count()
    }

    pub fn results(&self) -> Vec<RunResult> {
        read(&self.inner.results).clone()
    }

    pub fn error_messages(&self) -> Vec<ResultError> {
        read(&self.inner.results)
            .iter()
            .filter_map(|r| r.err.clone())
            .collect()
    }

    /// Mean duration of the jobs that finished without an error, in
    /// milliseconds. Errored jobs count toward neither sum nor divisor.
    pub fn average_fetch_time_ms(&self) -> u64 {
        let results = read(&self.inner.results);
        let mut total = Duration::ZERO;
        let mut count: u32 = 0;
        for result in results.iter().filter(|r| r.err.is_none()) {
            total += result.duration;
            count += 1;
        }
        if count == 0 {
            return 0;
        }
        (total / count).as_millis() as u64
    }

    /// Wall time from `start` to shutdown, in whole seconds; 0 while the
    /// run has not finished.
    pub fn total_run_time_secs(&self) -> u64 {
        match (*read(&self.inner.started_at), *read(&self.inner.finished_at)) {
            (Some(started), Some(finished)) => finished.duration_since(started).as_secs(),
            _ => 0,
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
