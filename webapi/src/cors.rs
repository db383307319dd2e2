use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderMap, HeaderValue,
};
use hyper::service::Service;
use hyper::{Method, Request, Response};
use std::future::Future;
use std::pin::Pin;

/// Adds permissive CORS headers to every response and short-circuits
/// `OPTIONS` preflight requests with an empty 200.
#[derive(Clone)]
pub struct CorsService<S> {
    inner: S,
}

impl<S> CorsService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn apply_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

impl<S, B, E> Service<Request<B>> for CorsService<S>
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
        if req.method() == Method::OPTIONS {
            return Box::pin(async move {
                let mut response = Response::new(
                    Empty::<Bytes>::new()
                        .map_err(|never| match never {})
                        .boxed(),
                );
                apply_headers(response.headers_mut());
                Ok(response)
            });
        }

        let future = self.inner.call(req);
        Box::pin(async move {
            let mut response = future.await?;
            apply_headers(response.headers_mut());
            Ok(response)
        })
    }
}
