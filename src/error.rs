use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Unsupported,
    Transport,
    Parse,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::Unsupported => "Unsupported",
            ErrorCode::Transport => "Transport",
            ErrorCode::Parse => "Parse",
            ErrorCode::Internal => "Internal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchError {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl Error for SearchError {}

pub fn search_err(code: ErrorCode, message: impl Into<String>) -> SearchError {
    SearchError {
        code,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_code_and_message() {
        let err = search_err(ErrorCode::Transport, "connection refused");
        assert_eq!(err.to_string(), "Transport: connection refused");
    }

    #[test]
    fn test_roundtrips_through_json() {
        let err = search_err(ErrorCode::NotFound, "no such reference");
        let json = serde_json::to_string(&err).unwrap();
        let back: SearchError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, ErrorCode::NotFound);
        assert_eq!(back.message, "no such reference");
    }
}
