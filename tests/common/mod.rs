//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use instrument_harness::config::HarnessConfig;
use instrument_harness::export::{ExportPipeline, InMemoryExporter, PipelineSettings};

/// One request received by the mock ingest endpoint.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

/// Local HTTP endpoint standing in for the remote ingest service.
#[allow(dead_code)]
pub struct MockIngest {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

#[allow(dead_code)]
impl MockIngest {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// DSN pointing at this endpoint.
    pub fn dsn(&self, token: &str) -> String {
        format!("http://{token}@{}/7", self.addr)
    }
}

/// Start a mock ingest endpoint that answers every request with `status`.
#[allow(dead_code)]
pub async fn start_mock_ingest(status: u16) -> MockIngest {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let captured = captured.clone();
                    tokio::spawn(async move {
                        if let Some(request) = read_request(&mut socket).await {
                            captured.lock().unwrap().push(request);
                        }
                        let status_text = match status {
                            200 => "200 OK",
                            202 => "202 Accepted",
                            401 => "401 Unauthorized",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {status_text}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockIngest { addr, requests }
}

#[allow(dead_code)]
async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        head,
        body: String::from_utf8_lossy(&buf[body_start..]).to_string(),
    })
}

/// Pipeline that exports every measurement individually and never on a timer.
#[allow(dead_code)]
pub fn memory_pipeline() -> (ExportPipeline, InMemoryExporter) {
    let exporter = InMemoryExporter::new();
    let settings = PipelineSettings {
        max_batch_size: 64,
        export_interval: Duration::from_secs(3600),
        flush_timeout: Duration::from_secs(5),
        ..PipelineSettings::default()
    };
    (ExportPipeline::start(Arc::new(exporter.clone()), settings), exporter)
}

/// Config with fast emitters and a short collection interval.
#[allow(dead_code)]
pub fn fast_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.exporter.export_interval_ms = 20;
    config.exporter.collect_interval_ms = 10;
    config.workload.counter_interval_ms = 1;
    config.workload.up_down_interval_ms = 1;
    config.workload.histogram_interval_ms = 1;
    config.workload.cache_interval_ms = 1;
    config
}
