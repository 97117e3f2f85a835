use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

/// Lifecycle events emitted by the engine while jobs run.
#[derive(Debug, Clone)]
pub enum Event {
    ServerStarted { virtual_users: usize },
    ServerStopped,
    JobStarted { job_id: Uuid },
    StepCompleted {
        job_id: Uuid,
        method: String,
        url: String,
        status: i32,
    },
    JobFinished { job_id: Uuid, failed: bool },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}

/// Emits each event as a JSON line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        let json = match event {
            Event::ServerStarted { virtual_users } => {
                json!({ "type": "server.started", "virtual_users": virtual_users })
            }
            Event::ServerStopped => json!({ "type": "server.stopped" }),
            Event::JobStarted { job_id } => {
                json!({ "type": "job.started", "job_id": job_id.to_string() })
            }
            Event::StepCompleted {
                job_id,
                method,
                url,
                status,
            } => {
                json!({
                    "type": "step.completed",
                    "job_id": job_id.to_string(),
                    "method": method,
                    "url": url,
                    "status": status,
                })
            }
            Event::JobFinished { job_id, failed } => {
                json!({ "type": "job.finished", "job_id": job_id.to_string(), "failed": failed })
            }
        };
        println!("{}", serde_json::to_string(&json).unwrap_or_default());
    }
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}
