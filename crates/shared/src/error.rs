use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    DuplicateEntry,
    NotFound,
    InUse,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Positional argument of a catalog message.
///
/// `Localized` holds a catalog key that is itself resolved in the render
/// locale, which is how field labels end up translated inside messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageArg {
    Text(String),
    Localized(String),
}

impl MessageArg {
    pub fn text(value: impl fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    pub fn localized(key: impl Into<String>) -> Self {
        Self::Localized(key.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub key: String,
    #[serde(default)]
    pub args: Vec<MessageArg>,
}

impl FieldError {
    pub fn field(field: impl Into<String>, key: impl Into<String>, args: Vec<MessageArg>) -> Self {
        Self {
            field: Some(field.into()),
            key: key.into(),
            args,
        }
    }

    pub fn object(key: impl Into<String>, args: Vec<MessageArg>) -> Self {
        Self {
            field: None,
            key: key.into(),
            args,
        }
    }
}

/// A user-facing failure: message keys to render plus the submitted object
/// the form should be re-populated with.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError<D> {
    pub code: ErrorCode,
    pub errors: Vec<FieldError>,
    pub target: D,
}

impl<D> ValidationError<D> {
    pub fn new(code: ErrorCode, key: impl Into<String>, target: D, args: Vec<MessageArg>) -> Self {
        Self {
            code,
            errors: vec![FieldError::object(key, args)],
            target,
        }
    }

    pub fn fields(errors: Vec<FieldError>, target: D) -> Self {
        Self {
            code: ErrorCode::Validation,
            errors,
            target,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.key.as_str())
    }
}

impl<D> fmt::Display for ValidationError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:", self.code)?;
        for error in &self.errors {
            write!(f, " {}", error.key)?;
        }
        Ok(())
    }
}

impl<D: fmt::Debug> std::error::Error for ValidationError<D> {}

#[derive(Debug, Error)]
#[error("unsupported locale '{0}'")]
pub struct UnsupportedLocale(pub String);
