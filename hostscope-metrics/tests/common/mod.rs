use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostscope_metrics::{MetricsClient, MetricsConfig, RetryPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the stub answers to one incoming request.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum Reply {
    Json(u16, String),
    /// Accepts the request and never answers
    Stall,
}

/// Minimal HTTP/1.1 responder replaying scripted replies in arrival order.
pub struct StubServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        tokio::spawn(async move {
            let mut replies = VecDeque::from(replies);
            while let Ok((stream, _)) = listener.accept().await {
                let reply = replies
                    .pop_front()
                    .unwrap_or_else(|| Reply::Json(500, "no scripted reply".into()));
                let log = log.clone();
                tokio::spawn(async move { serve(stream, reply, log).await });
            }
        });

        Self { addr, requests }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request lines received so far, e.g. `GET /api/v1/query?query=up HTTP/1.1`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(mut stream: TcpStream, reply: Reply, log: Arc<Mutex<Vec<String>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default().to_string();
    log.lock().unwrap().push(request_line);

    match reply {
        Reply::Json(status, body) => {
            let response = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        Reply::Stall => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

pub fn vector_body(samples: &[(&str, &str)]) -> String {
    let result: Vec<String> = samples
        .iter()
        .map(|(ident, value)| {
            format!(
                r#"{{"metric":{{"__name__":"cpu_usage_active","ident":"{}"}},"value":[1704067200,"{}"]}}"#,
                ident, value
            )
        })
        .collect();
    format!(
        r#"{{"status":"success","data":{{"resultType":"vector","result":[{}]}}}}"#,
        result.join(",")
    )
}

pub fn client_for(endpoint: &str, max_retries: u32, timeout: Duration) -> MetricsClient {
    let cfg = MetricsConfig::new(
        endpoint,
        timeout,
        RetryPolicy::new(max_retries, Duration::from_millis(20)),
    );
    MetricsClient::new(cfg).unwrap()
}
