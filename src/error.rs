//! Error types for wiring the card into a page.
//!
//! Audio failures never show up here: they are logged and retried by the
//! playback bootstrapper. Only setup problems surface, and they cross the
//! `wasm-bindgen` boundary as a rejected `start_card()`.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Result type for card operations
pub type Result<T> = std::result::Result<T, CardError>;

#[derive(Error, Debug)]
pub enum CardError {
    /// A required element (or the window / document itself) is absent
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// A DOM call threw; carries the stringified JS exception
    #[error("DOM error: {0}")]
    Dom(String),

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<JsValue> for CardError {
    fn from(value: JsValue) -> Self {
        let msg = value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}"));
        CardError::Dom(msg)
    }
}

impl From<CardError> for JsValue {
    fn from(err: CardError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(feature = "serde_json")]
impl From<serde_json::Error> for CardError {
    fn from(err: serde_json::Error) -> Self {
        CardError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = CardError::MissingElement("#letter-title".into());
        assert_eq!(err.to_string(), "Missing element: #letter-title");
        let err = CardError::Config("min distance exceeds max".into());
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn json_errors_become_config_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(CardError::from(parse), CardError::Config(_)));
    }
}
