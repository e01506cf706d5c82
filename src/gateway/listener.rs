/// Push mode: receive uploads the gateway POSTs to us
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;

use super::{charset_of, decode_body, GatewayError};
use crate::dispatch::dispatch_document;
use crate::models::RecordLabels;
use crate::output::LineSink;

#[derive(Clone)]
struct UploadState {
    labels: Arc<RecordLabels>,
    sink: Arc<LineSink>,
}

/// Routes accepting uploads on any path
pub fn router(labels: RecordLabels, sink: Arc<LineSink>) -> Router {
    let state = UploadState {
        labels: Arc::new(labels),
        sink,
    };
    Router::new()
        .route("/", post(upload))
        .route("/{*path}", post(upload))
        .with_state(state)
}

/// The gateway only needs an acknowledgement; it always gets 200
async fn upload(
    State(state): State<UploadState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let charset = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_of);

    match decode_body(&body, charset) {
        Ok(document) => {
            dispatch_document(&document, &state.labels, &state.sink);
        }
        Err(e) => warn!("Dropping upload: {}", e),
    }

    (StatusCode::OK, [(CONTENT_TYPE, "text/plain")])
}

/// Serve uploads on `hostname:port` until the task is dropped
pub async fn serve(
    hostname: &str,
    port: u16,
    labels: RecordLabels,
    sink: Arc<LineSink>,
) -> Result<(), GatewayError> {
    let listener = TcpListener::bind((hostname, port)).await?;
    info!("Listening for gateway uploads on {}", listener.local_addr()?);
    axum::serve(listener, router(labels, sink)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sink::SharedBuffer;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    const UPLOAD: &str = "<rainforest macId=\"0xd8d5b9000000\" timestamp=\"1471242537s\">\
        <InstantaneousDemand>\
        <DeviceMacId>0xdeadbeef0000661a</DeviceMacId>\
        <MeterMacId>0xdeadbeef00e33f60</MeterMacId>\
        <TimeStamp>0x1f441da9</TimeStamp>\
        <Demand>0x000b79</Demand>\
        <Multiplier>0x00000001</Multiplier>\
        <Divisor>0x000003e8</Divisor>\
        </InstantaneousDemand>\
        </rainforest>";

    fn app() -> (Router, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let labels = RecordLabels {
            measurement: "eagle".to_string(),
            host: None,
        };
        (router(labels, Arc::new(LineSink::new(buffer.clone()))), buffer)
    }

    fn upload_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_emits_record() {
        let (app, buffer) = app();
        let response = app.oneshot(upload_request("/", UPLOAD)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(
            buffer.contents(),
            "eagle,device=de-ad-be-ef-00-00-66-1a,meter=de-ad-be-ef-00-e3-3f-60,type=demand \
             value=2937.000000 1471242537000000000\n"
        );
    }

    #[tokio::test]
    async fn accepts_any_upload_path() {
        let (app, buffer) = app();
        let response = app
            .oneshot(upload_request("/eagle/upload", UPLOAD))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(buffer.contents().lines().count(), 1);
    }

    #[tokio::test]
    async fn garbage_is_acknowledged_without_output() {
        let (app, buffer) = app();
        let response = app
            .oneshot(upload_request("/", "this is not xml <"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(buffer.contents(), "");
    }

    #[tokio::test]
    async fn only_post_is_routed() {
        let (app, _) = app();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
