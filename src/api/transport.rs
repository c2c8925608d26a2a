//! HTTP transport seam
//!
//! Uses ureq (sync HTTP), so no async runtime is needed.

use super::{ApiError, ApiResult, ClientConfig};
use std::time::Duration;
use tracing::debug;

/// A single GET against the analysis server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path below the server base URL, e.g. `/api/projects/search`
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Attach the bearer credential
    pub authenticated: bool,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn get(path: &str, timeout: Duration) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
            authenticated: true,
            timeout,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add the `branch` parameter when a branch is given
    pub fn branch(self, branch: Option<&str>) -> Self {
        match branch {
            Some(name) => self.param("branch", name),
            None => self,
        }
    }

    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Lookup a query parameter (used by in-memory transports)
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Executes raw requests and returns the decoded JSON body.
///
/// Implementations must map non-2xx responses through [`ApiError::from_status`].
pub trait Transport: Send + Sync {
    fn get(&self, request: &ApiRequest) -> ApiResult<serde_json::Value>;
}

/// ureq-backed transport
pub struct UreqTransport {
    base_url: String,
    token: String,
    agent: ureq::Agent,
}

fn make_agent(insecure: bool) -> ureq::Agent {
    let tls = ureq::tls::TlsConfig::builder()
        .disable_verification(insecure)
        .build();
    ureq::config::Config::builder()
        .http_status_as_error(false) // Status codes are classified in `get`
        .tls_config(tls)
        .build()
        .new_agent()
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        if config.insecure {
            tracing::warn!(
                "TLS certificate validation is disabled for {}",
                config.base_url
            );
        }
        Self {
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            agent: make_agent(config.insecure),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &ApiRequest) -> ApiResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("GET {} {:?}", url, request.query);

        let mut req = self
            .agent
            .get(&url)
            .config()
            .timeout_global(Some(request.timeout))
            .build()
            .header("Accept", "application/json");

        if request.authenticated {
            req = req.header("Authorization", &format!("Bearer {}", self.token));
        }
        for (key, value) in &request.query {
            req = req.query(key, value);
        }

        let response = req
            .call()
            .map_err(|e| ApiError::Connectivity(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, &request.path));
        }

        response
            .into_body()
            .read_json::<serde_json::Value>()
            .map_err(|e| ApiError::Decode {
                path: request.path.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::get("/api/issues/search", Duration::from_secs(30))
            .param("p", 2)
            .param("resolved", "false")
            .branch(Some("develop"));
        assert_eq!(req.query_value("p"), Some("2"));
        assert_eq!(req.query_value("branch"), Some("develop"));
        assert!(req.authenticated);

        let anon = ApiRequest::get("/api/system/status", Duration::from_secs(10))
            .branch(None)
            .anonymous();
        assert!(anon.query.is_empty());
        assert!(!anon.authenticated);
    }
}
