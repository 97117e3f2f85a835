use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use steptest_core::types::Job;

use crate::executor::events::EventSink;
use crate::executor::http::HttpClient;
use crate::executor::job_runner;
use crate::executor::result::RunResult;
use crate::executor::server::Outstanding;

/// A parsed job on its way through the queue, tagged with the id its
/// result will carry.
pub(crate) struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
}

/// One virtual user: dequeue jobs until the queue closes, run each to
/// completion, and hand over the accumulated result batch on exit.
///
/// The receiver is shared behind a mutex; the lock is held only while
/// waiting for a job, never while running one.
pub(crate) async fn fetch_worker(
    queue: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    transport: Arc<dyn HttpClient>,
    events: Arc<dyn EventSink>,
    completed: mpsc::UnboundedSender<()>,
    batches: mpsc::UnboundedSender<Vec<RunResult>>,
    outstanding: Arc<Outstanding>,
) {
    let mut results = Vec::new();

    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(queued) = next else {
            break;
        };

        let result =
            job_runner::run_job(queued.job, queued.id, transport.as_ref(), events.as_ref()).await;
        results.push(result);

        let _ = completed.send(());
        outstanding.done();
    }

    let _ = batches.send(results);
}
