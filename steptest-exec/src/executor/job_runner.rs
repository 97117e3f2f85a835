use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use steptest_core::template;
use steptest_core::types::Job;

use crate::executor::events::{Event, EventSink};
use crate::executor::http::HttpClient;
use crate::executor::result::{ResultStep, RunResult};
use crate::executor::step_runner;

/// Run a job end-to-end: steps in declared order, for-loop values in list
/// order, first error terminates the job.
pub async fn run_job(
    mut job: Job,
    job_id: Uuid,
    transport: &dyn HttpClient,
    events: &dyn EventSink,
) -> RunResult {
    events.emit(Event::JobStarted { job_id }).await;

    let start_time = Utc::now();
    let started = Instant::now();
    let mut steps: Vec<ResultStep> = Vec::new();
    let mut status = 0;
    let mut err = None;

    for index in 0..job.steps.len() {
        if job.steps[index].for_loop.is_active() {
            // Loop values may reference arrays and variables, including ones
            // produced by extraction in earlier steps, so expansion happens
            // here rather than at parse time.
            let mut for_loop = job.steps[index].for_loop.clone();
            template::expand_loop_values(&mut for_loop.values, &job.vars, &job.arrays);

            'values: for value in &for_loop.values {
                job.vars.insert(for_loop.var_name.clone(), value.clone());

                for inner in &for_loop.steps {
                    let (result, step_err) =
                        step_runner::run_step(&mut job, inner.clone(), transport).await;
                    emit_step(events, job_id, &result).await;
                    status = result.status;
                    steps.push(result);
                    if step_err.is_some() {
                        err = step_err;
                        break 'values;
                    }
                }
            }
        } else {
            let step = job.steps[index].clone();
            let (result, step_err) = step_runner::run_step(&mut job, step, transport).await;
            emit_step(events, job_id, &result).await;
            status = result.status;
            steps.push(result);
            err = step_err;
        }

        if err.is_some() {
            break;
        }
    }

    let failed = err.is_some();
    let result = RunResult {
        job_id,
        start_time,
        status,
        duration: started.elapsed(),
        steps,
        err,
    };
    events.emit(Event::JobFinished { job_id, failed }).await;
    result
}

async fn emit_step(events: &dyn EventSink, job_id: Uuid, result: &ResultStep) {
    events
        .emit(Event::StepCompleted {
            job_id,
            method: result.method.map(|m| m.as_str()).unwrap_or("").to_string(),
            url: result.url.clone(),
            status: result.status,
        })
        .await;
}
