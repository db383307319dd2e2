use crate::config::ReportingConfig;
use crate::dispatch::dispatch;
use crate::event::{FailureEvent, FailureKind, RequestMeta};
use crate::tenant;
use crate::trace::{self, SourceLocation};
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Once};

/// What the panic hook saw at the moment of the panic: the structured
/// source location the platform hands the hook, plus the backtrace text
/// captured on the panicking thread itself. Capturing at the origin keeps
/// the real frames visible even though recovery runs later, in a different
/// stack.
struct PanicOrigin {
    location: Option<(String, u32)>,
    backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicOrigin>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Installs a process-wide panic hook that records the panic origin for the
/// recovery middleware, then chains to the previously installed hook.
/// Idempotent; call once at startup before serving traffic.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let origin = PanicOrigin {
                location: info
                    .location()
                    .map(|loc| (loc.file().to_string(), loc.line())),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(origin));
            previous(info);
        }));
    });
}

fn take_panic_origin() -> Option<PanicOrigin> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Shared state for building and delivering failure reports: the immutable
/// reporting configuration and the outbound HTTP client, which is safe for
/// concurrent reuse across dispatch tasks.
pub struct ReportContext {
    config: ReportingConfig,
    client: reqwest::Client,
}

impl ReportContext {
    pub fn new(config: ReportingConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ReportingConfig {
        &self.config
    }

    /// Turns a recovered panic into a generic 500 response, launching a
    /// detached dispatch task for the report. The response never waits on
    /// the dispatch.
    fn recover<E>(&self, payload: Box<dyn Any + Send>, meta: RequestMeta) -> Response<BoxBody<Bytes, E>> {
        let message = panic_message(payload.as_ref());
        tracing::error!(
            message = %message,
            method = %meta.method,
            path = %meta.path,
            "recovered panic while handling request"
        );

        let origin = take_panic_origin().unwrap_or_else(|| PanicOrigin {
            location: None,
            backtrace: Backtrace::force_capture().to_string(),
        });

        let board_id = tenant::resolve(&meta, &self.config);
        let source = located_source(&origin);

        let event = FailureEvent::new(
            FailureKind::Panic,
            message.clone(),
            origin.backtrace,
            source,
            board_id,
            meta,
        );
        self.spawn_dispatch(event);

        error_response(&message)
    }

    /// Encodes the event and hands it to a detached task. Each report owns
    /// its payload exclusively; under a sustained failure storm this spawns
    /// one task per recovered panic with no queue limit.
    fn spawn_dispatch(&self, event: FailureEvent) {
        let Some(endpoint) = self.config.endpoint_url.clone() else {
            tracing::warn!("{} is not set, skipping error report", crate::config::ENDPOINT_URL_VAR);
            return;
        };

        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode error report");
                return;
            }
        };

        tracing::info!(endpoint = %endpoint, "sending error report");
        let client = self.client.clone();
        tokio::spawn(async move {
            dispatch(&client, &endpoint, payload).await;
        });
    }

    /// Best-effort report for a failure during process startup (config,
    /// store, bind). Unlike the request path this awaits the delivery,
    /// bounded by the dispatch timeout, since the caller is about to exit
    /// with a non-zero status anyway.
    pub async fn report_startup_failure(&self, message: String) {
        tracing::error!(message = %message, "application failed to start");

        let Some(endpoint) = &self.config.endpoint_url else {
            return;
        };

        let backtrace = Backtrace::force_capture().to_string();
        let meta = RequestMeta::startup();
        let board_id = tenant::resolve(&meta, &self.config);
        let source = trace::locate(&backtrace);

        let event = FailureEvent::new(
            FailureKind::Error,
            message,
            backtrace,
            source,
            board_id,
            meta,
        );

        match event.encode() {
            Ok(payload) => dispatch(&self.client, endpoint, payload).await,
            Err(err) => tracing::warn!(error = %err, "failed to encode startup error report"),
        }
    }
}

/// Prefers the structured location the panic hook captured, as long as it
/// does not point into the stdlib or toolchain; otherwise falls back to
/// scanning the backtrace text.
fn located_source(origin: &PanicOrigin) -> Option<SourceLocation> {
    origin
        .location
        .as_ref()
        .filter(|(path, line)| *line > 0 && trace::path_allowed(path))
        .map(|(path, line)| SourceLocation {
            file: trace::file_name(path).to_string(),
            line: *line,
        })
        .or_else(|| trace::locate(&origin.backtrace))
}

fn error_response<E>(message: &str) -> Response<BoxBody<Bytes, E>> {
    let body = serde_json::json!({
        "error": "An error occurred while processing your request",
        "message": message,
    });

    let mut response = Response::new(
        Full::new(Bytes::from(body.to_string()))
            .map_err(|never| match never {})
            .boxed(),
    );
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Middleware that absorbs panics from the wrapped service. Non-panicking
/// responses, including deliberately returned errors, pass through
/// untouched; a panic is converted into a generic 500 JSON response and a
/// fire-and-forget failure report.
#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
    ctx: Arc<ReportContext>,
}

impl<S> RecoveryService<S> {
    pub fn new(inner: S, ctx: Arc<ReportContext>) -> Self {
        Self { inner, ctx }
    }
}

impl<S, B, E> Service<Request<B>> for RecoveryService<S>
where
    S: Service<Request<B>, Response = Response<BoxBody<Bytes, E>>, Error = E>,
    S::Future: Send + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        // Captured up front: the request is consumed by the inner service
        // and unrecoverable once it panics.
        let meta = RequestMeta::capture(&req);
        let ctx = self.ctx.clone();

        // The inner call itself may panic before returning a future.
        let attempt = std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req)));

        Box::pin(async move {
            let outcome = match attempt {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(payload) => Err(payload),
            };

            match outcome {
                Ok(result) => result,
                Err(payload) => Ok(ctx.recover(payload, meta)),
            }
        })
    }
}
