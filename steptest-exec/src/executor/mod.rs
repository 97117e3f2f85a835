pub mod cookies;
pub mod events;
pub mod extract;
pub mod http;
pub mod job_runner;
pub mod request;
pub mod result;
mod server;
pub mod step_runner;
mod worker;

pub use events::{CompositeEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink};
pub use http::{HttpClient, HttpError, HttpRequestParts, HttpResponseParts, ReqwestHttpClient};
pub use result::{ResultError, ResultStep, RunResult};
pub use server::{EngineError, Server};
