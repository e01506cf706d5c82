pub mod client;
pub mod listener;

use thiserror::Error;

use crate::decoder::DecodeError;

pub use client::GatewayClient;
pub use listener::serve;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid gateway address: {0}")]
    Address(#[from] url::ParseError),
    #[error("invalid request uri: {0}")]
    Uri(#[from] http::uri::InvalidUri),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),
    #[error("gateway answered {0}")]
    Status(http::StatusCode),
    #[error("unexpected {0} response")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("invalid usage document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Extract the `charset` parameter of a Content-Type header value
pub fn charset_of(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Decode a body in the given charset, UTF-8 when unspecified
pub fn decode_body(body: &[u8], charset: Option<&str>) -> Result<String, DecodeError> {
    let charset = charset.unwrap_or("utf-8").to_ascii_lowercase();
    match charset.as_str() {
        "iso-8859-1" | "latin1" | "latin-1" => Ok(body.iter().map(|&b| b as char).collect()),
        _ => String::from_utf8(body.to_vec()).map_err(|_| DecodeError::Encoding { charset }),
    }
}
