//! Hyper-based HTTP server
//!
//! Manual routing straight on Hyper, no framework in between. The server is
//! only constructed around an already loaded model, so nothing is routable
//! until the model is ready.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use hyper::body::to_bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::models::VectorizationService;
use crate::protocol::http::{HealthResponse, HttpErrorResponse, VectorizeRequest};
use crate::BoxError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for request handlers
#[derive(Clone)]
struct ServerState {
    service: VectorizationService,
}

/// Bound HTTP server, ready to serve
pub struct HttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: ServerState,
}

impl HttpServer {
    /// Bind the listening socket for `service`
    pub async fn bind(addr: SocketAddr, service: VectorizationService) -> Result<Self, BoxError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        // Nagle buffering adds latency to small JSON responses
        socket.set_nodelay(true)?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(1024)?;
        let local_addr = listener.local_addr()?;

        info!("📡 Bound to {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            state: ServerState { service },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl+C
    pub async fn serve(self) -> Result<(), BoxError> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("❌ Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("🛑 Shutdown signal received");
        })
        .await
    }

    /// Serve until `signal` completes, then drain in-flight requests
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = self.state;
        let make_svc = make_service_fn(move |_| {
            let state = state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = state.clone();
                    handle_request(req, state)
                }))
            }
        });

        let server = Server::from_tcp(self.listener.into_std()?)?
            .http1_keepalive(true)
            .http1_half_close(false)
            .tcp_nodelay(true)
            .tcp_sleep_on_accept_errors(true)
            .serve(make_svc)
            .with_graceful_shutdown(signal);

        info!("✅ HTTP server listening on {}", self.local_addr);
        info!("📍 Endpoints:");
        info!("   POST /vectorize  - Text to vectors");
        info!("   GET  /health     - Health check");

        server.await?;
        info!("👋 Server stopped");
        Ok(())
    }
}

/// Route a request and decorate the response with CORS and request-id headers
async fn handle_request(req: Request<Body>, state: ServerState) -> Result<Response<Body>, Infallible> {
    let request_id = Uuid::new_v4();
    let origin = req
        .headers()
        .get("origin")
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = match (&method, path.as_str()) {
        (&Method::POST, "/vectorize") => handle_vectorize(req, state, request_id).await,
        (&Method::GET, "/health") => handle_health(state),
        (&Method::OPTIONS, "/vectorize") | (&Method::OPTIONS, "/health") => handle_options(),
        (_, "/vectorize") | (_, "/health") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &HttpErrorResponse::method_not_allowed(),
        ),
        _ => json_response(StatusCode::NOT_FOUND, &HttpErrorResponse::not_found()),
    };

    debug!("{} {} -> {}", method, path, response.status());

    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    Ok(response)
}

/// OPTIONS handler for CORS preflight
fn handle_options() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn handle_health(state: ServerState) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &HealthResponse::ok(state.service.model_name()),
    )
}

async fn handle_vectorize(req: Request<Body>, state: ServerState, request_id: Uuid) -> Response<Body> {
    let start_time = Instant::now();

    let body_bytes = match to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("⚠️  Failed to read request body: {}", e);
            return json_response(StatusCode::BAD_REQUEST, &HttpErrorResponse::unreadable_body());
        }
    };

    let request = match VectorizeRequest::from_slice(&body_bytes) {
        Ok(req) => req,
        Err(e) => {
            debug!("Rejected request body: {}", e);
            return json_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &HttpErrorResponse::validation(&e),
            );
        }
    };

    let span = tracing::info_span!(
        "vectorize",
        request_id = %request_id,
        text_count = request.text.len()
    );

    async move {
        match state.service.vectorize(request.text).await {
            Ok(output) => {
                debug!(
                    "⏱️  Vectorized {} texts in {:?}",
                    output.vector.len(),
                    start_time.elapsed()
                );
                json_response(StatusCode::OK, &output)
            }
            Err(e) => {
                error!("❌ {}", e);
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &HttpErrorResponse::vectorization_failed(e.to_string()),
                )
            }
        }
    }
    .instrument(span)
    .await
}

/// Serialize `body` as the JSON payload of a response
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("❌ Failed to serialize response: {}", e);
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
