use std::fmt;
use thiserror::Error;

/// Failure while converting between a URI (or proxy map) and a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
  #[error("unsupported scheme: {0}")]
  UnsupportedScheme(String),

  #[error("malformed {scheme} payload: {reason}")]
  MalformedPayload { scheme: &'static str, reason: String },

  #[error("unsupported protocol: {0}")]
  UnsupportedProtocol(String),
}

impl CodecError {
  pub(crate) fn malformed(scheme: &'static str, reason: impl Into<String>) -> Self {
    CodecError::MalformedPayload {
      scheme,
      reason: reason.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
  Timeout,
  Connection,
  HttpStatus(u16),
  InvalidUrl,
}

impl NetworkErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NetworkErrorKind::Timeout => "timeout",
      NetworkErrorKind::Connection => "connection",
      NetworkErrorKind::HttpStatus(_) => "http-status",
      NetworkErrorKind::InvalidUrl => "invalid-url",
    }
  }

  /// Whether another attempt may succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      NetworkErrorKind::Timeout | NetworkErrorKind::Connection => true,
      NetworkErrorKind::HttpStatus(status) => is_retryable_status(*status),
      NetworkErrorKind::InvalidUrl => false,
    }
  }
}

impl fmt::Display for NetworkErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NetworkErrorKind::HttpStatus(status) => write!(f, "http-status {status}"),
      other => f.write_str(other.as_str()),
    }
  }
}

/// 408, 429 and 5xx are transient.
pub fn is_retryable_status(status: u16) -> bool {
  status == 408 || status == 429 || (500..600).contains(&status)
}

/// Terminal outcome of a fetch. Never carries the transport's own error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NetworkError {
  pub kind: NetworkErrorKind,
  pub message: String,
}

impl NetworkError {
  pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn timeout(message: impl Into<String>) -> Self {
    Self::new(NetworkErrorKind::Timeout, message)
  }

  pub fn connection(message: impl Into<String>) -> Self {
    Self::new(NetworkErrorKind::Connection, message)
  }

  pub fn invalid_url(message: impl Into<String>) -> Self {
    Self::new(NetworkErrorKind::InvalidUrl, message)
  }

  pub fn http_status(status: u16) -> Self {
    Self::new(NetworkErrorKind::HttpStatus(status), format!("server answered {status}"))
  }
}

impl From<reqwest::Error> for NetworkError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      NetworkError::timeout(e.to_string())
    } else if e.is_builder() {
      NetworkError::invalid_url(e.to_string())
    } else if let Some(status) = e.status() {
      NetworkError::new(NetworkErrorKind::HttpStatus(status.as_u16()), e.to_string())
    } else {
      NetworkError::connection(e.to_string())
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
  #[error("{0}")]
  Unreachable(String),

  #[error("unsupported protocol")]
  UnsupportedProtocol,
}

impl ProbeError {
  pub fn connection_failed() -> Self {
    ProbeError::Unreachable("connection failed".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retryable_statuses() {
    assert!(is_retryable_status(503));
    assert!(is_retryable_status(429));
    assert!(is_retryable_status(408));
    assert!(!is_retryable_status(404));
    assert!(!is_retryable_status(200));
    assert!(!NetworkErrorKind::InvalidUrl.is_retryable());
    assert!(NetworkErrorKind::Timeout.is_retryable());
  }

  #[test]
  fn network_error_display_names_kind() {
    let e = NetworkError::http_status(502);
    assert_eq!(e.kind.as_str(), "http-status");
    assert!(e.to_string().starts_with("http-status 502"));
    assert_eq!(ProbeError::UnsupportedProtocol.to_string(), "unsupported protocol");
  }
}
