//! # Request Extraction & Validation
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and funnel it through
//! [`extract_json`] or [`extract_validated_json`] so that every body error
//! comes back in the standard error shape.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business rules a request DTO checks beyond what serde enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body.
///
/// Well-formed JSON with the wrong shape or invalid values (an unknown
/// trigger, a negative amount) is a 422; anything else is a 400.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| match err {
        JsonRejection::JsonDataError(e) => AppError::Validation(e.body_text()),
        other => AppError::BadRequest(other.body_text()),
    })
}

/// Extract a JSON body and run its [`Validate`] rules.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}
