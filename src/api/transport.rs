use std::io;
use std::time::Duration;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

use super::redact_url;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server could not be reached or answered with a failure status.
    #[error("{0}")]
    Connection(String),
    #[error("{0}")]
    Other(String),
}

/// Sends one request and returns the raw response body.
pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<String, TransportError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(REQUEST_TIMEOUT)
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<String, TransportError> {
        let method: &'static str = request.method.into();
        let call = self.agent.request(method, &request.url);
        let result = match &request.body {
            Some(body) => call
                .set("Content-Type", "application/json")
                .send_string(body),
            None => call.call(),
        };
        let response = result.map_err(map_ureq_error)?;
        response.into_string().map_err(map_read_error)
    }
}

/// ureq's transport errors lead with the full request URL, so the detail is
/// redacted before it can reach a log line or a result item.
fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code, response) => {
            let reason = response.status_text().to_owned();
            TransportError::Connection(format!("HTTP Error {code}: {reason}"))
        }
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::Dns
            | ureq::ErrorKind::ConnectionFailed
            | ureq::ErrorKind::Io
            | ureq::ErrorKind::TooManyRedirects
            | ureq::ErrorKind::BadStatus
            | ureq::ErrorKind::ProxyConnect => {
                TransportError::Connection(redact_url(&transport.to_string()))
            }
            _ => TransportError::Other(redact_url(&transport.to_string())),
        },
    }
}

fn map_read_error(err: io::Error) -> TransportError {
    TransportError::Connection(format!("reading response body: {err}"))
}
