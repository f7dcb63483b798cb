//! 共享测试工具：本地 mock API 服务器
//!
//! Every accepted request is rebuilt as an `http::Request<Bytes>` and checked
//! with the same [`Signer`] the client uses, so tests see both what the
//! client sent and whether its signature holds on the server side.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cdn_orchestrator_provider::{
    CdnClient, Credentials, DEFAULT_ALLOWED_SKEW, SignatureError, Signer,
};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const APP_ID: &str = "test-app";
pub const APP_SECRET: &str = "testsecret";

/// 断言 `Option` 为 `Some`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let opt = $expr;
        assert!(opt.is_some(), "{}", format_args!($($msg)+));
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// 断言 `Result` 为 `Ok`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

// ============ Scripted replies ============

/// What the server does with one connection.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    /// Read the request, then hold the connection open without answering.
    Stall(Duration),
}

impl Reply {
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::raw(status, body.to_string())
    }

    /// `200` with `status.code = 1` and the given `data`.
    pub fn success(data: Value) -> Self {
        Self::json(
            200,
            &json!({ "status": { "code": 1, "message": "success" }, "data": data }),
        )
    }

    /// `200` with a business failure.
    pub fn business(code: i64, message: &str) -> Self {
        Self::json(
            200,
            &json!({ "status": { "code": code, "message": message }, "data": null }),
        )
    }

    #[must_use]
    pub fn with_header(self, name: &str, value: &str) -> Self {
        match self {
            Self::Respond {
                status,
                mut headers,
                body,
            } => {
                headers.push((name.to_string(), value.to_string()));
                Self::Respond {
                    status,
                    headers,
                    body,
                }
            }
            stall @ Self::Stall(_) => stall,
        }
    }
}

// ============ Captured requests ============

/// A request as the server saw it.
#[derive(Debug)]
pub struct Captured {
    pub request: http::Request<Bytes>,
    /// Server-side verification result, with the default clock-skew window.
    pub verified: Result<(), SignatureError>,
}

impl Captured {
    pub fn method(&self) -> &str {
        self.request.method().as_str()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn query(&self) -> &str {
        self.request.uri().query().unwrap_or_default()
    }

    /// All values of `key` in the query string, decoded.
    pub fn query_values(&self, key: &str) -> Vec<String> {
        self.query()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(k, _)| *k == key)
            .filter_map(|(_, v)| {
                urlencoding::decode(&v.replace('+', " "))
                    .ok()
                    .map(|decoded| decoded.into_owned())
            })
            .collect()
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_values(key).into_iter().next()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(self.request.body()).ok()
    }
}

// ============ Server ============

/// One-connection-per-reply HTTP/1.1 server on `127.0.0.1`.
///
/// Replies are served in order; every response carries `Connection: close`
/// so each client attempt opens a fresh connection.
#[derive(Debug)]
pub struct MockServer {
    endpoint: String,
    captured: Arc<Mutex<Vec<Captured>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(replies: Vec<Reply>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);

        let task = tokio::spawn(async move {
            let signer = Signer::new(Credentials::new(APP_ID, APP_SECRET));
            for reply in replies {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                if let Err(e) = serve(stream, reply, &signer, &sink).await {
                    eprintln!("mock server: {e}");
                }
            }
        });

        Ok(Self {
            endpoint: format!("http://{addr}"),
            captured,
            task,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Client pointed at this server, signing with [`APP_ID`]/[`APP_SECRET`].
    pub fn client(&self, max_retries: u32) -> cdn_orchestrator_provider::Result<CdnClient> {
        CdnClient::builder(Credentials::new(APP_ID, APP_SECRET))
            .endpoint(self.endpoint.clone())
            .client_ip("203.0.113.7")
            .request_timeout(Duration::from_secs(5))
            .max_retries(max_retries)
            .build()
    }

    /// Drain the requests received so far.
    pub fn take_requests(&self) -> Vec<Captured> {
        self.captured
            .lock()
            .map(|mut captured| std::mem::take(&mut *captured))
            .unwrap_or_default()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    reply: Reply,
    signer: &Signer,
    sink: &Mutex<Vec<Captured>>,
) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    let verified = signer.verify_with_skew(&request, chrono::Utc::now(), DEFAULT_ALLOWED_SKEW);
    if let Ok(mut captured) = sink.lock() {
        captured.push(Captured { request, verified });
    }

    match reply {
        Reply::Respond {
            status,
            headers,
            body,
        } => {
            let reason = http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            let mut response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                body.len()
            );
            for (name, value) in headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&body);
            stream.write_all(response.as_bytes()).await?;
            stream.shutdown().await
        }
        Reply::Stall(duration) => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}

fn invalid(detail: impl ToString) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, detail.to_string())
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<http::Request<Bytes>> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(invalid("connection closed before end of headers"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(invalid(format!("bad request line: {request_line}")));
    };

    let mut builder = http::Request::builder().method(method).uri(target);
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().map_err(invalid)?;
        }
        builder = builder.header(name.trim(), value);
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    builder.body(Bytes::from(body)).map_err(invalid)
}
