//! Data models for the Venture application.
//!
//! Field names serialize in camelCase to match the client's document shapes.

mod admin;
mod bucket;
mod category;
mod friend;
mod goal;
mod user;

pub use admin::*;
pub use bucket::*;
pub use category::*;
pub use friend::*;
pub use goal::*;
pub use user::*;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::errors::AppError;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parse a `YYYY-MM-DD` calendar date into midnight UTC.
///
/// `label` names the field in the validation message, e.g. "due date".
pub fn parse_local_date(value: &str, label: &str) -> Result<DateTime<Utc>, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Validation(format!("Please enter a valid {} (YYYY-MM-DD)", label)))
}

/// Collapse blank strings to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
