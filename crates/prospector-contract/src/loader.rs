//! Contract file loading.

use std::path::Path;

use crate::definition::ApiContract;
use crate::error::{FetchError, Result};

/// Load and validate a contract from a JSON file.
///
/// # Errors
/// Returns `FetchError::Io` if the file can't be read and
/// `FetchError::InvalidContract` if it doesn't parse or validate.
pub fn load_contract(path: impl AsRef<Path>) -> Result<ApiContract> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;

    let contract: ApiContract = serde_json::from_str(&raw)
        .map_err(|e| FetchError::InvalidContract(format!("{}: {e}", path.display())))?;

    contract
        .validate()
        .map_err(|reasons| FetchError::InvalidContract(reasons.join("; ")))?;

    tracing::info!(
        path = %path.display(),
        endpoints = contract.endpoints.len(),
        "Loaded API contract"
    );

    Ok(contract)
}
