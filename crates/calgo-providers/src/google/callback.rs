//! Loopback HTTP listener for the OAuth redirect.
//!
//! The listener binds `127.0.0.1` on an OS-assigned port and answers every
//! request on any path. The first request that carries either an
//! authorization code or an error resolves the completion channel; later
//! requests still get a response but are otherwise ignored.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Error reported when the redirect carries neither a code nor an error.
pub const NO_CODE_ERROR: &str = "no authorization code received";

/// How long a single connection may take to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on header lines drained per request.
const MAX_HEADER_LINES: usize = 100;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
<h1>Authorization Successful!</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>
"#;

const FAILURE_BODY: &str = "Authorization failed\n";

/// What the browser redirect delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// An authorization code, with the state echoed back if present.
    Code { code: String, state: Option<String> },
    /// The provider's `error` parameter, or [`NO_CODE_ERROR`].
    Error(String),
}

type Completion = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// A running loopback listener.
///
/// Dropping the handle aborts the accept loop and every open connection,
/// releasing the port.
#[derive(Debug)]
pub struct CallbackListener {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CallbackListener {
    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the handle and the receiver that resolves with the first
    /// outcome.
    pub async fn start() -> ProviderResult<(Self, oneshot::Receiver<CallbackOutcome>)> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| {
                ProviderError::authentication(format!("failed to start callback server: {}", e))
                    .with_source(e)
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| {
                ProviderError::authentication(format!("failed to read callback port: {}", e))
                    .with_source(e)
            })?
            .port();

        let (tx, rx) = oneshot::channel();
        let completion: Completion = Arc::new(Mutex::new(Some(tx)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, completion, shutdown_rx));

        debug!(port, "callback listener started");
        Ok((
            Self {
                port,
                shutdown: Some(shutdown_tx),
                task,
            },
            rx,
        ))
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting connections, drops open ones and waits for the port
    /// to be released.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
        debug!(port = self.port, "callback listener closed");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    completion: Completion,
    mut shutdown: oneshot::Receiver<()>,
) {
    // Owned here so that aborting this task also aborts the connections.
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let completion = Arc::clone(&completion);
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, &completion).await {
                            debug!(%peer, "callback connection failed: {}", e);
                        }
                    });
                }
                Err(e) => warn!("failed to accept callback connection: {}", e),
            },
        }
    }
    connections.shutdown().await;
}

async fn handle_connection(stream: TcpStream, completion: &Completion) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request_line = tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut reader))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "request head timed out"))??;

    // Preconnects open a socket and never send anything.
    let Some(request_line) = request_line else {
        return Ok(());
    };

    let outcome = outcome_from_request_line(&request_line);
    let response = match &outcome {
        CallbackOutcome::Code { .. } => {
            http_response("200 OK", "text/html; charset=utf-8", SUCCESS_PAGE)
        }
        CallbackOutcome::Error(_) => {
            http_response("400 Bad Request", "text/plain; charset=utf-8", FAILURE_BODY)
        }
    };
    deliver(completion, outcome);

    write_half.write_all(response.as_bytes()).await?;
    write_half.shutdown().await
}

/// Reads the request line and drains the headers up to the blank line.
///
/// Returns `None` if the peer closed without sending a request.
async fn read_request_head<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 || request_line.trim().is_empty() {
        return Ok(None);
    }

    let mut header = String::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }
    Ok(Some(request_line))
}

/// Extracts the outcome from `GET /?code=...&state=... HTTP/1.1`.
fn outcome_from_request_line(request_line: &str) -> CallbackOutcome {
    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or_default();

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match code.filter(|c| !c.is_empty()) {
        Some(code) => CallbackOutcome::Code { code, state },
        None => CallbackOutcome::Error(
            error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| NO_CODE_ERROR.to_string()),
        ),
    }
}

/// Resolves the completion channel unless an earlier request already did.
fn deliver(completion: &Completion, outcome: CallbackOutcome) {
    let sender = match completion.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match sender {
        Some(tx) => {
            if tx.send(outcome).is_err() {
                debug!("callback outcome dropped, receiver gone");
            }
        }
        None => debug!("ignoring callback after completion"),
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get(port: u16, path_and_query: &str) -> reqwest::Response {
        reqwest::get(format!("http://127.0.0.1:{port}{path_and_query}"))
            .await
            .unwrap()
    }

    #[test]
    fn parses_code_and_state() {
        let outcome = outcome_from_request_line("GET /?code=4%2F0Ab%2Bc&state=xyz HTTP/1.1\r\n");
        assert_eq!(
            outcome,
            CallbackOutcome::Code {
                code: "4/0Ab+c".into(),
                state: Some("xyz".into()),
            }
        );
    }

    #[test]
    fn parses_errors() {
        assert_eq!(
            outcome_from_request_line("GET /?error=access_denied HTTP/1.1"),
            CallbackOutcome::Error("access_denied".into())
        );
        assert_eq!(
            outcome_from_request_line("GET /?code=&state=s HTTP/1.1"),
            CallbackOutcome::Error(NO_CODE_ERROR.into())
        );
        assert_eq!(
            outcome_from_request_line("GET /favicon.ico HTTP/1.1"),
            CallbackOutcome::Error(NO_CODE_ERROR.into())
        );
    }

    #[tokio::test]
    async fn delivers_code() {
        let (listener, rx) = CallbackListener::start().await.unwrap();
        assert_ne!(listener.port(), 0);

        let response = get(listener.port(), "/?code=abc&state=xyz").await;
        assert_eq!(response.status(), 200);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert_eq!(content_type, "text/html; charset=utf-8");
        assert!(response.text().await.unwrap().contains("Authorization Successful"));

        assert_eq!(
            rx.await.unwrap(),
            CallbackOutcome::Code {
                code: "abc".into(),
                state: Some("xyz".into()),
            }
        );
        listener.close().await;
    }

    #[tokio::test]
    async fn delivers_error() {
        let (listener, rx) = CallbackListener::start().await.unwrap();

        let response = get(listener.port(), "/?error=access_denied").await;
        assert_eq!(response.status(), 400);
        assert_eq!(response.text().await.unwrap().trim(), "Authorization failed");

        assert_eq!(rx.await.unwrap(), CallbackOutcome::Error("access_denied".into()));
        listener.close().await;
    }

    #[tokio::test]
    async fn first_request_wins() {
        let (listener, rx) = CallbackListener::start().await.unwrap();

        let first = get(listener.port(), "/?code=first&state=s").await;
        assert_eq!(first.status(), 200);
        let second = get(listener.port(), "/?code=second&state=s").await;
        assert_eq!(second.status(), 200);

        match rx.await.unwrap() {
            CallbackOutcome::Code { code, .. } => assert_eq!(code, "first"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        listener.close().await;
    }

    #[tokio::test]
    async fn silent_connection_is_ignored() {
        let (listener, rx) = CallbackListener::start().await.unwrap();

        let idle = TcpStream::connect(("127.0.0.1", listener.port())).await.unwrap();
        drop(idle);

        let response = get(listener.port(), "/?code=abc").await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            rx.await.unwrap(),
            CallbackOutcome::Code {
                code: "abc".into(),
                state: None,
            }
        );
        listener.close().await;
    }

    #[tokio::test]
    async fn close_releases_port() {
        let (listener, _rx) = CallbackListener::start().await.unwrap();
        let port = listener.port();
        listener.close().await;

        assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }

    #[tokio::test]
    async fn close_drops_idle_connections() {
        use tokio::io::AsyncReadExt;

        let (listener, _rx) = CallbackListener::start().await.unwrap();
        let mut idle = TcpStream::connect(("127.0.0.1", listener.port())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        listener.close().await;

        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
            .await
            .expect("connection still open after close");
        assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");
    }

    #[tokio::test]
    async fn drop_aborts_idle_connections() {
        use tokio::io::AsyncReadExt;

        let (listener, _rx) = CallbackListener::start().await.unwrap();
        let mut idle = TcpStream::connect(("127.0.0.1", listener.port())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(listener);

        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
            .await
            .expect("connection still open after drop");
        assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");
    }

    #[tokio::test]
    async fn drop_releases_port() {
        let (listener, _rx) = CallbackListener::start().await.unwrap();
        let port = listener.port();
        drop(listener);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }
}
