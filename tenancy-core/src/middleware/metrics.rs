//! Request observability: correlation id, route-level metrics, override auditing

use axum::{body::Body, extract::MatchedPath, http::Request, response::Response};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

use super::auth::ADMIN_OVERRIDE_HEADER;

const REQUEST_ID_HEADER: &str = "x-request-id";
const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone)]
pub struct ObservabilityLayer;

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct ObservabilityMiddleware<S> {
    inner: S,
}

/// Labels captured before the request is handed on
#[derive(Debug, Clone, PartialEq)]
struct RequestLabels {
    method: String,
    route: String,
    admin_override: bool,
}

impl RequestLabels {
    fn from_request(request: &Request<Body>) -> Self {
        // Route templates keep `{table}` and `{id}` out of label values
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

        Self {
            method: request.method().to_string(),
            route,
            admin_override: request.headers().contains_key(ADMIN_OVERRIDE_HEADER),
        }
    }
}

fn request_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

impl<S> Service<Request<Body>> for ObservabilityMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let labels = RequestLabels::from_request(&request);
        let request_id = request_id(&request);
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            route = %labels.route,
            admin_override = labels.admin_override,
        );

        gauge!("tenancy_http_requests_in_flight").increment(1.0);
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(request).await;
                gauge!("tenancy_http_requests_in_flight").decrement(1.0);
                let mut response = result?;

                let status = response.status();
                counter!(
                    "tenancy_http_requests_total",
                    "method" => labels.method.clone(),
                    "route" => labels.route.clone(),
                    "status" => status.as_u16().to_string()
                )
                .increment(1);
                histogram!(
                    "tenancy_http_request_duration_seconds",
                    "method" => labels.method,
                    "route" => labels.route
                )
                .record(start.elapsed().as_secs_f64());

                if labels.admin_override {
                    let outcome = if status.is_success() { "applied" } else { "refused" };
                    counter!("tenancy_admin_override_requests_total", "outcome" => outcome)
                        .increment(1);
                }

                if let Ok(value) = request_id.parse() {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
