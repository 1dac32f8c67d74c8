//! Test doubles: a scripted in-process HTTP server and a fake job backend.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex as TokioMutex;

use civic_ledger_core::sync::{DbStats, JobStatus, SyncJob};

use crate::client::SyncJobApi;
use crate::error::{ChainSyncError, Result};
use crate::types::{CreateSyncJobRequest, CreateSyncJobResponse, JobResultResponse};

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum MockOutcome {
    DropConnection,
    Respond {
        status: u16,
        body: String,
        delay_ms: u64,
    },
}

impl MockOutcome {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockOutcome::Respond {
            status,
            body: body.to_string(),
            delay_ms: 0,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        MockOutcome::Respond {
            status,
            body: body.to_string(),
            delay_ms: 0,
        }
    }
}

/// Responses scripted per request path, consumed in order. The last
/// response for a path is repeated once the queue runs dry.
#[derive(Debug, Default)]
pub struct MockRoutes {
    routes: HashMap<String, VecDeque<MockOutcome>>,
}

impl MockRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, path: &str, outcomes: Vec<MockOutcome>) -> Self {
        self.routes
            .entry(path.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    fn next(&mut self, path: &str) -> Option<MockOutcome> {
        let queue = self.routes.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

pub struct MockServer {
    pub base_url: String,
    pub captured: Arc<TokioMutex<Vec<CapturedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn requests_to(&self, path: &str) -> Vec<CapturedRequest> {
        self.captured
            .lock()
            .await
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

fn header_end_offset(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
    let mut buffer = Vec::new();
    loop {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if header_end_offset(&buffer).is_some() {
            break;
        }
    }

    let header_end = header_end_offset(&buffer)?;
    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?.to_string();
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Some(CapturedRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn write_http_response(
    stream: &mut tokio::net::TcpStream,
    status: u16,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text(status),
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

pub async fn start_mock_server(routes: MockRoutes) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
    let routes = Arc::new(TokioMutex::new(routes));
    let captured_clone = Arc::clone(&captured);

    let handle = tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(value) => value,
                Err(_) => break,
            };
            let captured_inner = Arc::clone(&captured_clone);
            let routes_inner = Arc::clone(&routes);
            tokio::spawn(async move {
                let Some(request) = read_http_request(&mut stream).await else {
                    return;
                };
                let path = request.path.clone();
                captured_inner.lock().await.push(request);

                let outcome = routes_inner.lock().await.next(&path).unwrap_or(
                    MockOutcome::Respond {
                        status: 404,
                        body: r#"{"error":"Not found"}"#.to_string(),
                        delay_ms: 0,
                    },
                );

                match outcome {
                    MockOutcome::DropConnection => {}
                    MockOutcome::Respond {
                        status,
                        body,
                        delay_ms,
                    } => {
                        if delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        }
                        let _ = write_http_response(&mut stream, status, &body).await;
                    }
                }
            });
        }
    });

    MockServer {
        base_url: format!("http://{}", addr),
        captured,
        handle,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fake job backend
// ─────────────────────────────────────────────────────────────────────────────

pub fn job(status: JobStatus, progress: i64, message: &str) -> SyncJob {
    SyncJob {
        status,
        progress: Some(progress),
        message: Some(message.to_string()),
        error: None,
    }
}

/// Scripted [`SyncJobApi`]. Once the status script runs out every poll
/// reports a running job, so loops only end through limits or cancellation.
#[derive(Default)]
pub struct FakeJobApi {
    create_responses: Mutex<VecDeque<Result<CreateSyncJobResponse>>>,
    statuses: Mutex<VecDeque<Result<SyncJob>>>,
    results: Mutex<VecDeque<Result<JobResultResponse>>>,
    stats: Mutex<DbStats>,
    status_delay: Mutex<Duration>,
    pub create_requests: Mutex<Vec<CreateSyncJobRequest>>,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    in_flight_polls: AtomicUsize,
    pub max_in_flight_polls: AtomicUsize,
}

impl FakeJobApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id(self, job_id: &str) -> Self {
        self.create_responses
            .lock()
            .expect("create lock")
            .push_back(Ok(CreateSyncJobResponse {
                job_id: job_id.to_string(),
                status_url: Some(format!("/api/blockchain/sync/status/{}", job_id)),
                result_url: Some(format!("/api/blockchain/sync/result/{}", job_id)),
            }));
        self
    }

    pub fn with_create_error(self, err: ChainSyncError) -> Self {
        self.create_responses
            .lock()
            .expect("create lock")
            .push_back(Err(err));
        self
    }

    pub fn with_status(self, job: SyncJob) -> Self {
        self.statuses.lock().expect("status lock").push_back(Ok(job));
        self
    }

    pub fn with_status_error(self, err: ChainSyncError) -> Self {
        self.statuses.lock().expect("status lock").push_back(Err(err));
        self
    }

    pub fn with_result(self, result: serde_json::Value) -> Self {
        self.results
            .lock()
            .expect("result lock")
            .push_back(Ok(JobResultResponse {
                result,
                completed_at: Some("2026-10-19T08:00:00Z".to_string()),
            }));
        self
    }

    pub fn with_result_error(self, err: ChainSyncError) -> Self {
        self.results.lock().expect("result lock").push_back(Err(err));
        self
    }

    pub fn with_stats(self, stats: DbStats) -> Self {
        *self.stats.lock().expect("stats lock") = stats;
        self
    }

    pub fn with_status_delay(self, delay: Duration) -> Self {
        *self.status_delay.lock().expect("delay lock") = delay;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncJobApi for FakeJobApi {
    async fn create_sync_job(&self, req: &CreateSyncJobRequest) -> Result<CreateSyncJobResponse> {
        self.create_requests
            .lock()
            .expect("requests lock")
            .push(req.clone());
        let scripted = self.create_responses.lock().expect("create lock").pop_front();
        scripted.unwrap_or_else(|| {
            Ok(CreateSyncJobResponse {
                job_id: uuid::Uuid::new_v4().to_string(),
                ..CreateSyncJobResponse::default()
            })
        })
    }

    async fn get_job_status(&self, _job_id: &str) -> Result<SyncJob> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight_polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_polls
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.status_delay.lock().expect("delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.statuses.lock().expect("status lock").pop_front();
        self.in_flight_polls.fetch_sub(1, Ordering::SeqCst);
        scripted.unwrap_or_else(|| Ok(job(JobStatus::Running, 50, "Scanning blocks")))
    }

    async fn get_job_result(&self, job_id: &str) -> Result<JobResultResponse> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.results.lock().expect("result lock").pop_front();
        scripted.unwrap_or_else(|| {
            Err(ChainSyncError::api(
                404,
                format!("No result for job {}", job_id),
            ))
        })
    }

    async fn fetch_db_stats(&self) -> DbStats {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.lock().expect("stats lock").clone()
    }
}
