/// HTTP middleware for request metrics and timing
///
/// - `MetricsLayer` records request count, duration and in-flight requests
/// - `track_timing` logs each request's duration and adds it as a response header

use super::*;
use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Response header carrying the request duration in milliseconds
pub const PROCESS_TIME_HEADER: &str = "x-process-time-ms";

/// Label value for requests that matched no route
pub const UNMATCHED_PATH: &str = "unmatched";

/// Route template of the request; raw paths never become label values
fn route_path(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or(UNMATCHED_PATH)
        .to_string()
}

/// Tower layer for metrics collection
#[derive(Clone)]
pub struct MetricsLayer {
    config: Arc<MetricsConfig>,
}

impl MetricsLayer {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for MetricsLayer {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Tower service for metrics collection
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    config: Arc<MetricsConfig>,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if !self.config.enabled {
            return Box::pin(self.inner.call(req));
        }

        let method = req.method().to_string();
        let path = route_path(&req);
        if self.config.is_path_excluded(&path) {
            return Box::pin(self.inner.call(req));
        }

        let histograms = self.config.enable_histograms;
        HTTP_REQUESTS_IN_FLIGHT.inc();
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            HTTP_REQUESTS_IN_FLIGHT.dec();

            match result {
                Ok(response) => {
                    let status = response.status().as_u16().to_string();
                    HTTP_REQUESTS_TOTAL
                        .with_label_values(&[&method, &path, &status])
                        .inc();
                    if histograms {
                        HTTP_REQUEST_DURATION_SECONDS
                            .with_label_values(&[&method, &path])
                            .observe(start.elapsed().as_secs_f64());
                    }
                    Ok(response)
                }
                Err(e) => {
                    ERRORS_TOTAL
                        .with_label_values(&["http_middleware", "request_error"])
                        .inc();
                    Err(e)
                }
            }
        })
    }
}

/// Log `METHOD path in X.XX ms` and set the process time header
pub async fn track_timing(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    tracing::info!(
        status = response.status().as_u16(),
        "{} {} in {:.2} ms",
        method,
        path,
        elapsed_ms
    );

    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", elapsed_ms)) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}
