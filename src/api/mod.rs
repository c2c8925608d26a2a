//! SonarQube web API access
//!
//! Every call is a single authenticated GET that returns a typed, validated
//! response or a classified [`ApiError`]. The HTTP layer sits behind the
//! [`Transport`] trait so collection logic can run against an in-memory
//! server in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use sonarscope::api::{SonarClient, UreqTransport, ClientConfig};
//!
//! let config = ClientConfig::new("https://sonar.example.com", "squ_...");
//! let client = SonarClient::new(UreqTransport::new(&config), config);
//! let status = client.preflight()?;
//! ```

mod client;
mod transport;
pub mod types;

pub use client::{ClientConfig, PreflightReport, SonarClient};
pub use transport::{ApiRequest, Transport, UreqTransport};

use thiserror::Error;

/// Errors that can occur talking to the analysis server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("cannot reach server: {0}")]
    Connectivity(String),

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("unexpected HTTP {status} from {path}")]
    UnexpectedStatus { status: u16, path: String },

    #[error("response from {path} did not match the expected shape: {message}")]
    Decode { path: String, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, path: &str) -> Self {
        match status {
            401 | 403 => ApiError::Auth { status },
            404 => ApiError::NotFound {
                path: path.to_string(),
            },
            500..=599 => ApiError::Server { status },
            _ => ApiError::UnexpectedStatus {
                status,
                path: path.to_string(),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
