use crate::docs;
use crate::store::Store;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub type ApiBody = BoxBody<Bytes, ApiError>;

/// Errors that can occur while handling an API request
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Response serialization error: {0}")]
    ResponseSerialization(#[from] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson(_) | ApiError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::ResponseSerialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Request body for creating or updating a project.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProjectInput {
    name: String,
}

const COLLECTION_PATH: &str = "/api/projects";
const ITEM_PREFIX: &str = "/api/projects/";

/// The CRUD API over the projects table, plus the service info, health,
/// and OpenAPI endpoints. Application-level failures become JSON error
/// responses here; only panics escape to the recovery wrapper.
#[derive(Clone)]
pub struct ApiService {
    store: Store,
}

impl ApiService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Service<Request<Incoming>> for ApiService {
    type Response = Response<ApiBody>;
    type Error = ApiError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let store = self.store.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            match route(&store, req).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    tracing::error!(method = %method, path = %path, error = %err, "request failed");
                    Ok(json_response(
                        err.status(),
                        serde_json::json!({ "error": err.to_string() }),
                    ))
                }
            }
        })
    }
}

async fn route(store: &Store, req: Request<Incoming>) -> Result<Response<ApiBody>, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.as_str(), path.as_str()) {
        ("GET", "/") => Ok(json_response(
            StatusCode::OK,
            serde_json::json!({
                "message": "Backend API is running",
                "status": "ok",
                "api": COLLECTION_PATH,
                "docs": "/swagger.json",
            }),
        )),
        ("GET", "/health") => Ok(json_response(
            StatusCode::OK,
            serde_json::json!({ "status": "healthy", "service": "Backend API" }),
        )),
        ("GET", "/swagger.json") => Ok(json_response(StatusCode::OK, docs::openapi())),
        // Trailing slash on the collection is accepted; an empty id after
        // the prefix is treated as the collection as well.
        _ if path == COLLECTION_PATH || path == ITEM_PREFIX => collection(store, req).await,
        _ if path.starts_with(ITEM_PREFIX) => match path[ITEM_PREFIX.len()..].parse::<i64>() {
            Ok(id) => item(store, id, req).await,
            Err(_) => Ok(error_json(StatusCode::BAD_REQUEST, "Invalid ID")),
        },
        _ => Ok(error_json(StatusCode::NOT_FOUND, "Not found")),
    }
}

async fn collection(store: &Store, req: Request<Incoming>) -> Result<Response<ApiBody>, ApiError> {
    let method = req.method().clone();

    if method == Method::GET {
        let projects = store.list()?;
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_value(projects)?,
        ))
    } else if method == Method::POST {
        let input: ProjectInput = read_json(req).await?;
        let project = store.create(&input.name)?;
        Ok(json_response(
            StatusCode::CREATED,
            serde_json::to_value(project)?,
        ))
    } else {
        Ok(error_json(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ))
    }
}

async fn item(store: &Store, id: i64, req: Request<Incoming>) -> Result<Response<ApiBody>, ApiError> {
    let method = req.method().clone();

    if method == Method::GET {
        match store.get(id)? {
            Some(project) => Ok(json_response(
                StatusCode::OK,
                serde_json::to_value(project)?,
            )),
            None => Ok(error_json(StatusCode::NOT_FOUND, "Project not found")),
        }
    } else if method == Method::PUT {
        let input: ProjectInput = read_json(req).await?;
        match store.update(id, &input.name)? {
            Some(project) => Ok(json_response(
                StatusCode::OK,
                serde_json::to_value(project)?,
            )),
            None => Ok(error_json(StatusCode::NOT_FOUND, "Project not found")),
        }
    } else if method == Method::DELETE {
        if store.delete(id)? {
            Ok(json_response(
                StatusCode::OK,
                serde_json::json!({ "message": "Deleted successfully" }),
            ))
        } else {
            Ok(error_json(StatusCode::NOT_FOUND, "Project not found"))
        }
    } else {
        Ok(error_json(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ))
    }
}

async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, ApiError> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|err| ApiError::RequestBody(err.to_string()))?
        .to_bytes();
    serde_json::from_slice(&bytes).map_err(|err| ApiError::InvalidJson(err.to_string()))
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<ApiBody> {
    let mut response = Response::new(
        Full::new(Bytes::from(value.to_string()))
            .map_err(|never| match never {})
            .boxed(),
    );
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_json(status: StatusCode, message: &str) -> Response<ApiBody> {
    json_response(status, serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::CorsService;
    use crate::store::Project;
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use reporting::{RecoveryService, ReportContext, ReportingConfig};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Full service stack as wired in main: recovery outermost, then CORS,
    /// then the API.
    async fn start_server() -> u16 {
        let store = Store::open_in_memory().unwrap();
        let ctx = Arc::new(ReportContext::new(ReportingConfig::default()));
        let service = RecoveryService::new(CorsService::new(ApiService::new(store)), ctx);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let svc = service.clone();

                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await;
                });
            }
        });

        port
    }

    #[tokio::test]
    async fn test_crud_flow() {
        let port = start_server().await;
        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();

        // Empty collection.
        let list: Vec<Project> = client
            .get(format!("{base}/api/projects"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(list.is_empty());

        // Create.
        let response = client
            .post(format!("{base}/api/projects"))
            .json(&serde_json::json!({ "Name": "first board" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let created: Project = response.json().await.unwrap();
        assert_eq!(created.name, "first board");

        // Read back.
        let fetched: Project = client
            .get(format!("{base}/api/projects/{}", created.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched, created);

        // Update.
        let response = client
            .put(format!("{base}/api/projects/{}", created.id))
            .json(&serde_json::json!({ "Name": "renamed" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let updated: Project = response.json().await.unwrap();
        assert_eq!(updated.name, "renamed");

        // Delete, then the row is gone.
        let response = client
            .delete(format!("{base}/api/projects/{}", created.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let response = client
            .get(format!("{base}/api/projects/{}", created.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_collection_trailing_slash() {
        let port = start_server().await;
        let response = reqwest::get(format!("http://127.0.0.1:{port}/api/projects/"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request() {
        let port = start_server().await;
        let response = reqwest::get(format!("http://127.0.0.1:{port}/api/projects/abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let port = start_server().await;
        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://127.0.0.1:{port}/api/projects"))
            .header(CONTENT_TYPE.as_str(), "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_allowed() {
        let port = start_server().await;
        let client = reqwest::Client::new();
        let response = client
            .patch(format!("http://127.0.0.1:{port}/api/projects"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let port = start_server().await;
        let response = reqwest::get(format!("http://127.0.0.1:{port}/api/boards"))
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let port = start_server().await;
        let base = format!("http://127.0.0.1:{port}");

        let root: serde_json::Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(root["status"], "ok");

        let health: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let port = start_server().await;
        let doc: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{port}/swagger.json"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(doc["openapi"], "3.0.0");
        assert!(doc["paths"]["/api/projects"].is_object());
    }

    #[tokio::test]
    async fn test_cors_headers_present() {
        let port = start_server().await;
        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();

        // Preflight short-circuits with 200.
        let response = client
            .request(reqwest::Method::OPTIONS, format!("{base}/api/projects"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        // Normal responses carry the headers too.
        let response = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
    }
}
