//! Loading schema files and documents.
//!
//! Handles loading JSON from files, strings, and HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::registry::{Registry, RegistryBuilder};
use crate::schema::SchemaFile;
use crate::types::CodecOptions;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load JSON from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    let content = read_file(path)?;
    load_json_str(&content)
}

/// Parse JSON from a string.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load JSON from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the status is
/// not a success, or the body isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    tracing::debug!(url, "fetching document");
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load JSON from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Build a registry from a schema file on disk.
///
/// # Errors
///
/// IO and JSON errors as for [`load_json`], plus `LoadError::Schema` when
/// the declarations do not classify.
pub fn load_registry(path: &Path, options: CodecOptions) -> Result<Registry, LoadError> {
    let content = read_file(path)?;
    load_registry_str(&content, options)
}

/// Build a registry from schema file text.
pub fn load_registry_str(content: &str, options: CodecOptions) -> Result<Registry, LoadError> {
    let file: SchemaFile =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    tracing::debug!(
        resources = file.resources.len(),
        links = file.links.len(),
        meta = file.meta.len(),
        "loaded schema file"
    );
    Ok(RegistryBuilder::from_schema_file(file).options(options).build()?)
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}
