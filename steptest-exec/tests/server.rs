use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use steptest_exec::{
    EngineError, HttpClient, HttpError, HttpRequestParts, HttpResponseParts, Server,
};

struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponseParts, HttpError>>>,
    requests: Mutex<Vec<HttpRequestParts>>,
}

impl MockHttpClient {
    fn always_ok() -> Arc<Self> {
        Self::returning(Vec::new())
    }

    fn returning(responses: Vec<Result<HttpResponseParts, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }
}

fn ok(status: u16, body: &str) -> Result<HttpResponseParts, HttpError> {
    Ok(HttpResponseParts {
        status,
        headers: Vec::new(),
        body: body.as_bytes().to_vec(),
    })
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, req: HttpRequestParts) -> Result<HttpResponseParts, HttpError> {
        self.requests.lock().unwrap().push(req);
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| ok(200, ""))
    }
}

fn server(virtual_users: usize, transport: Arc<MockHttpClient>) -> Server {
    Server::new(virtual_users, 0, Some(transport as Arc<dyn HttpClient>))
        .expect("server should build")
}

#[tokio::test]
async fn zero_virtual_users_falls_back_to_the_default() {
    let srv = server(0, MockHttpClient::always_ok());
    assert_eq!(srv.number_of_virtual_users(), 100);
}

#[tokio::test]
async fn the_requested_virtual_user_count_is_kept() {
    let srv = server(7, MockHttpClient::always_ok());
    assert_eq!(srv.number_of_virtual_users(), 7);
}

#[tokio::test]
async fn a_parse_failure_enqueues_nothing() {
    let srv = server(2, MockHttpClient::always_ok());

    let err = srv.add_job("- teleport https://a/", BTreeMap::new()).unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));

    srv.start();
    srv.wait_done().await;
    assert_eq!(srv.number_of_jobs(), 0);
    assert!(srv.results().is_empty());
}

#[tokio::test]
async fn every_submitted_job_produces_exactly_one_result() {
    let transport = MockHttpClient::always_ok();
    let srv = server(4, Arc::clone(&transport));

    for _ in 0..5 {
        srv.add_job("- GET https://a/\n- GET https://b/", BTreeMap::new())
            .expect("job should be accepted");
    }

    srv.start();
    assert!(srv.is_running());
    srv.wait_done().await;

    assert!(!srv.is_running());
    assert_eq!(srv.number_of_jobs(), 5);
    assert_eq!(srv.number_of_requests(), 5);
    assert_eq!(srv.number_of_errors(), 0);
    assert_eq!(srv.results().len(), 5);
    assert_eq!(transport.request_urls().len(), 10);
    for result in srv.results() {
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.status, 200);
    }
}

#[tokio::test]
async fn jobs_keep_their_own_variables() {
    let transport = MockHttpClient::always_ok();
    let srv = server(3, Arc::clone(&transport));

    for host in ["one", "two", "three"] {
        let vars: BTreeMap<String, String> =
            [("host".to_string(), host.to_string())].into_iter().collect();
        srv.add_job("- GET https://{{host}}/", vars).expect("job should be accepted");
    }

    srv.start();
    srv.wait_done().await;

    let mut urls: Vec<String> = srv
        .results()
        .iter()
        .flat_map(|r| r.steps.iter().map(|s| s.url.clone()))
        .collect();
    urls.sort();
    assert_eq!(urls, vec!["https://one/", "https://three/", "https://two/"]);
}

#[tokio::test]
async fn errors_are_counted_and_reported() {
    // One worker, two identical jobs: exactly one of them hits the 404.
    let transport = MockHttpClient::returning(vec![ok(404, "gone"), ok(200, "")]);
    let srv = server(1, Arc::clone(&transport));

    srv.add_job("- GET https://a/", BTreeMap::new()).expect("first job");
    srv.add_job("- GET https://a/", BTreeMap::new()).expect("second job");
    srv.start();
    srv.wait_done().await;

    assert_eq!(srv.results().len(), 2);
    assert_eq!(srv.number_of_errors(), 1);
    let errors = srv.error_messages();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].status, 404);
    assert_eq!(errors[0].body, "gone");
}

#[tokio::test]
async fn average_fetch_time_ignores_errored_jobs() {
    let transport = MockHttpClient::returning(vec![ok(500, "boom")]);
    let srv = server(1, Arc::clone(&transport));

    srv.add_job("- GET https://bad/", BTreeMap::new()).expect("failing job");
    srv.add_job("- GET https://good/", BTreeMap::new()).expect("clean job");
    srv.start();
    srv.wait_done().await;

    assert_eq!(srv.results().len(), 2);
    assert_eq!(srv.number_of_errors(), 1);
    // Exactly one non-error result feeds the average; with an instant mock
    // transport it rounds down to zero milliseconds.
    assert_eq!(srv.average_fetch_time_ms(), 0);
}

#[tokio::test]
async fn stop_running_requires_a_running_server() {
    let srv = server(1, MockHttpClient::always_ok());
    let err = srv.stop_running().await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning));
}

#[tokio::test]
async fn stop_running_drains_submitted_jobs_and_refuses_new_ones() {
    let transport = MockHttpClient::always_ok();
    let srv = server(2, Arc::clone(&transport));

    for _ in 0..3 {
        srv.add_job("- GET https://a/", BTreeMap::new()).expect("job should be accepted");
    }
    srv.start();
    srv.stop_running().await.expect("stop should succeed");

    assert!(!srv.is_running());
    assert_eq!(srv.results().len(), 3);

    let err = srv.add_job("- GET https://a/", BTreeMap::new()).unwrap_err();
    assert!(matches!(err, EngineError::NotAccepting));
}

#[tokio::test]
async fn total_run_time_is_zero_until_the_run_finishes() {
    let srv = server(1, MockHttpClient::always_ok());
    assert_eq!(srv.total_run_time_secs(), 0);

    srv.add_job("- GET https://a/", BTreeMap::new()).expect("job should be accepted");
    srv.start();
    srv.wait_done().await;

    // An in-memory run finishes far inside the first second.
    assert_eq!(srv.total_run_time_secs(), 0);
    assert!(!srv.is_running());
}

#[tokio::test]
async fn the_two_step_example_runs_end_to_end() {
    let transport = MockHttpClient::always_ok();
    let srv = server(2, Arc::clone(&transport));

    let mut text = String::from("- GET https://{{url}}\n");
    text.push_str("  var { \"name\": \"url\", \"value\": \"google.com\" }");
    text.push_str("\n\n");
    text.push_str("- POST https://www.sunet.se/");

    srv.add_job(&text, BTreeMap::new()).expect("job should be accepted");
    srv.start();
    srv.wait_done().await;

    assert_eq!(
        transport.request_urls(),
        vec!["https://google.com", "https://www.sunet.se/"]
    );
    let results = srv.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].steps[0].url, "https://google.com");
    assert_eq!(results[0].steps[1].url, "https://www.sunet.se/");
}
