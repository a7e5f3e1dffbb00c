use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Success";
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// JSON envelope shared by every endpoint the frontend consumes.
#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    success: bool,
    message: String,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_message(data, DEFAULT_SUCCESS_MESSAGE)
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    /// Field-level validation failures, keyed by input field name
    pub fn validation(errors: BTreeMap<String, String>) -> Self {
        Self {
            success: false,
            message: VALIDATION_FAILED_MESSAGE.to_string(),
            data: None,
            errors: Some(errors),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn errors(&self) -> Option<&BTreeMap<String, String>> {
        self.errors.as_ref()
    }
}
