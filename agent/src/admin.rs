//! Liveness and readiness endpoint for the agent pod.

use futures::future;
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{info, instrument};

#[instrument(skip(ready))]
pub async fn serve(addr: SocketAddr, ready: watch::Receiver<bool>) -> Result<(), hyper::Error> {
    let server =
        hyper::server::Server::bind(&addr).serve(hyper::service::make_service_fn(move |_conn| {
            let ready = ready.clone();
            future::ok::<_, hyper::Error>(hyper::service::service_fn(
                move |req: Request<Body>| future::ok::<_, hyper::Error>(handle(&ready, req)),
            ))
        }));
    let addr = server.local_addr();
    info!(%addr, "admin server listening");
    server.await
}

fn handle(ready: &watch::Receiver<bool>, req: Request<Body>) -> Response<Body> {
    match *req.method() {
        hyper::Method::GET | hyper::Method::HEAD => match req.uri().path() {
            "/live" => plain(StatusCode::OK, "live\n"),
            "/ready" => {
                if *ready.borrow() {
                    plain(StatusCode::OK, "ready\n")
                } else {
                    plain(StatusCode::INTERNAL_SERVER_ERROR, "not ready\n")
                }
            }
            _ => plain(StatusCode::NOT_FOUND, "not found\n"),
        },
        _ => plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n"),
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "text/plain")
        .body(body.into())
        .expect("static response must build")
}
