//! Application error types.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Application error carrying a kind and a small key/value payload.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration error
    Config,
    /// File system error
    Io,
    /// Network error (timeout, connection failure, unexpected status)
    Network,
    /// Remote version descriptor is missing or malformed
    VersionDescriptor,
    /// A required update file is not reachable
    Verification,
    /// Backup snapshot error
    Backup,
    /// Update step error
    Update,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Config => 2001,
            Self::Io => 2002,
            Self::Network => 2003,
            Self::VersionDescriptor => 3001,
            Self::Verification => 3002,
            Self::Backup => 4001,
            Self::Update => 4002,
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Network, message)
    }

    pub fn network_with_url(url: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Network,
            HashMap::from([
                ("url".to_string(), url.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn version_descriptor(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::VersionDescriptor, message)
    }

    pub fn file_unreachable(file: &str, status: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Verification,
            HashMap::from([
                ("file".to_string(), file.to_string()),
                ("status".to_string(), status.into()),
            ]),
        )
    }

    pub fn backup(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Backup, message)
    }

    pub fn update(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Update, message)
    }

    pub fn missing_after_update(files: &[String]) -> Self {
        Self::new(
            ErrorKind::Update,
            HashMap::from([("missing".to_string(), files.join(","))]),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let mut pairs: Vec<String> = self
                .payload
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<walkdir::Error> for AppError {
    fn from(err: walkdir::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_payload_in_key_order() {
        let err = AppError::network_with_url("http://host/list.txt", "404 Not Found");
        assert_eq!(
            err.to_string(),
            "Network: detail=404 Not Found, url=http://host/list.txt"
        );
    }

    #[test]
    fn empty_detail_has_empty_payload() {
        let err = AppError::backup("");
        assert_eq!(err.to_string(), "Backup");
        assert_eq!(err.kind().code(), 4001);
    }

    #[test]
    fn serializes_code_and_payload() {
        let err = AppError::file_unreachable("plugin.py", "404");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 3002);
        assert_eq!(json["payload"]["file"], "plugin.py");
    }
}
