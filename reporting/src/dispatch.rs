use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Upper bound on a single report delivery, covering connect, send, and
/// response.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers one payload to the reporting endpoint: a single POST, no retry,
/// no backoff. Every failure mode (request build, network, timeout,
/// non-200 status) is logged and swallowed; this function never raises
/// back to its caller.
///
/// Only status 200 counts as accepted. The response body is read solely
/// for the diagnostic log line on rejection; that read happens inside the
/// timeout so a rejecting endpoint that stalls the body cannot hold the
/// attempt open past the bound.
pub async fn dispatch(client: &reqwest::Client, endpoint: &Url, payload: String) {
    let attempt = async {
        let response = client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = if status == StatusCode::OK {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        Ok::<_, reqwest::Error>((status, body))
    };

    match timeout(DISPATCH_TIMEOUT, attempt).await {
        Err(_) => {
            tracing::warn!(endpoint = %endpoint, "error report timed out, dropping it");
        }
        Ok(Err(err)) => {
            tracing::warn!(endpoint = %endpoint, error = %err, "failed to deliver error report");
        }
        Ok(Ok((status, _))) if status == StatusCode::OK => {
            tracing::debug!(endpoint = %endpoint, "error report accepted");
        }
        Ok(Ok((status, body))) => {
            tracing::warn!(
                endpoint = %endpoint,
                status = %status,
                body = %body,
                "error endpoint rejected report"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use std::convert::Infallible;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Sink that records every request body it receives and answers with
    /// the given status.
    async fn start_sink(status: u16) -> (u16, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind sink");
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let tx = tx.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let tx = tx.clone();
                        async move {
                            let body = req
                                .into_body()
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_else(|_| Bytes::new());
                            let _ = tx.send(String::from_utf8_lossy(&body).into_owned());

                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .body(Full::new(Bytes::from_static(b"{}")))
                                    .unwrap(),
                            )
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        (port, rx)
    }

    #[tokio::test]
    async fn test_dispatch_delivers_payload() {
        let (port, mut rx) = start_sink(200).await;
        let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/errors")).unwrap();

        let client = reqwest::Client::new();
        dispatch(&client, &endpoint, "{\"message\":\"boom\"}".to_string()).await;

        let received = rx.recv().await.expect("sink saw the report");
        assert_eq!(received, "{\"message\":\"boom\"}");
    }

    #[tokio::test]
    async fn test_dispatch_swallows_rejection() {
        let (port, mut rx) = start_sink(503).await;
        let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/errors")).unwrap();

        let client = reqwest::Client::new();
        // Must not panic or propagate the 503.
        dispatch(&client, &endpoint, "{}".to_string()).await;
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_connection_failure() {
        // Nothing is listening here.
        let endpoint = Url::parse("http://127.0.0.1:1/errors").unwrap();
        let client = reqwest::Client::new();
        dispatch(&client, &endpoint, "{}".to_string()).await;
    }

    #[tokio::test]
    async fn test_dispatch_abandons_stalled_rejection_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind sink");
        let port = listener.local_addr().unwrap().port();

        // Rejecting endpoint that promises a 100-byte body, sends 5 bytes,
        // and then holds the socket open.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\nhello",
                )
                .await;
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(stream);
        });

        let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/errors")).unwrap();
        let client = reqwest::Client::new();

        let started = std::time::Instant::now();
        dispatch(&client, &endpoint, "{}".to_string()).await;
        let elapsed = started.elapsed();
        assert!(
            elapsed < DISPATCH_TIMEOUT + Duration::from_secs(1),
            "took {elapsed:?}"
        );
    }
}
