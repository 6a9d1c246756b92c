//! Declarative API contract model.
//!
//! A contract file describes a remote API that was mapped by hand: base URL,
//! credential placement, and one entry per endpoint with its pagination
//! style. Adding an endpoint is a data change, not a code change.

use prospector_core::EndpointName;
use serde::{Deserialize, Serialize};

/// HTTP method for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    #[default]
    Get,
    /// POST request
    Post,
}

/// How the credential is attached to requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSpec {
    /// Header name the credential goes in
    #[serde(default = "default_auth_header")]
    pub header: String,
    /// Scheme prefix inside the header value
    #[serde(default = "default_auth_scheme")]
    pub scheme: String,
}

impl Default for AuthSpec {
    fn default() -> Self {
        Self {
            header: default_auth_header(),
            scheme: default_auth_scheme(),
        }
    }
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_auth_scheme() -> String {
    "Bearer".to_string()
}

/// Pagination style of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Pagination {
    /// Single request returns everything
    #[default]
    None,
    /// Incrementing page parameter until an empty page comes back
    PageNumber {
        /// Query parameter carrying the page number
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Optional query parameter for page size
        #[serde(default)]
        per_page_param: Option<String>,
        /// Page size sent when `per_page_param` is set
        #[serde(default = "default_per_page")]
        per_page: u32,
    },
    /// Opaque cursor threaded from each response into the next request
    Cursor {
        /// Query parameter carrying the cursor
        #[serde(default = "default_cursor_param")]
        cursor_param: String,
        /// Response field holding the next cursor
        #[serde(default = "default_cursor_field")]
        cursor_field: String,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_per_page() -> u32 {
    20
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

fn default_cursor_field() -> String {
    "next_cursor".to_string()
}

/// One endpoint entry in the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEndpoint {
    /// Endpoint name; also the `api_<name>` table suffix
    pub name: EndpointName,
    /// Path relative to the contract's base URL
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: HttpMethod,
    /// Whether the credential header is attached
    #[serde(default = "default_true")]
    pub auth_required: bool,
    /// Pagination style
    #[serde(default)]
    pub pagination: Pagination,
    /// Dotted path to the record array inside the response body. When
    /// absent, common wrapper keys are probed before falling back to the
    /// body itself.
    #[serde(default)]
    pub response_path: Option<String>,
    /// Disabled endpoints are kept in the file but skipped at run time
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// A complete API contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiContract {
    /// Base URL all endpoint paths are joined to
    pub base_url: String,
    /// Credential placement
    #[serde(default)]
    pub auth: AuthSpec,
    /// Endpoints, replayed in declared order
    pub endpoints: Vec<ContractEndpoint>,
}

impl ApiContract {
    /// Validate the contract, collecting every problem found.
    ///
    /// # Errors
    /// Returns the list of per-field reasons when the contract is unusable.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut reasons = Vec::new();

        match url::Url::parse(&self.base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => reasons.push(format!("base_url has scheme '{}'", parsed.scheme())),
            Err(e) => reasons.push(format!("base_url is not a valid URL: {e}")),
        }

        if self.endpoints.is_empty() {
            reasons.push("contract declares no endpoints".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            // Names arrive through serde untouched; re-check the table-name
            // format here before any DDL is derived from them.
            if EndpointName::new(endpoint.name.as_str()).is_err() {
                reasons.push(format!("invalid endpoint name '{}'", endpoint.name));
            }
            if !endpoint.path.starts_with('/') {
                reasons.push(format!(
                    "endpoint '{}': path must start with '/'",
                    endpoint.name
                ));
            }
            if !seen.insert(endpoint.name.as_str()) {
                reasons.push(format!("duplicate endpoint name '{}'", endpoint.name));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons)
        }
    }

    /// Endpoints that will actually be replayed, in declared order.
    pub fn active_endpoints(&self) -> impl Iterator<Item = &ContractEndpoint> {
        self.endpoints.iter().filter(|e| e.enabled)
    }
}
