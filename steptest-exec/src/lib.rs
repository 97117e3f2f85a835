#![forbid(unsafe_code)]

//! Execution engine for steptest jobs: a pool of concurrent virtual users
//! consuming parsed jobs from a queue, each carrying variables and cookies
//! across its steps and reporting timing and error information.
//!
//! Job parsing and the data model live in `steptest-core`.

pub mod executor;

pub use crate::executor::{
    CompositeEventSink, EngineError, Event, EventSink, HttpClient, HttpError, HttpRequestParts,
    HttpResponseParts, NoOpEventSink, ReqwestHttpClient, ResultError, ResultStep, RunResult,
    Server, StdoutEventSink,
};
