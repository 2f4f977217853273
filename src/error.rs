// src/error.rs
//! Error taxonomy for the alert pipeline. Every variant here is recoverable:
//! the caller logs it and moves on to the next feed, subscriber or channel.

use std::time::Duration;

use thiserror::Error;

/// Upstream feed could not produce a usable report this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed request timed out after {0:?}")]
    Timeout(Duration),
    #[error("feed returned HTTP {0}")]
    Status(u16),
    #[error("malformed feed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid feed field: {0}")]
    Parse(String),
    #[error("feed reported error code {0}")]
    Upstream(i64),
}

/// Rendering an alert failed; only that subscriber's notification is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Computing a subscriber's impact estimate failed.
#[derive(Debug, Error, PartialEq)]
pub enum EvaluateError {
    #[error("subscriber `{name}` has an invalid home location ({latitude}, {longitude})")]
    InvalidLocation {
        name: String,
        latitude: f64,
        longitude: f64,
    },
    #[error("non-finite impact estimate for subscriber `{0}`")]
    NonFinite(String),
}

/// One delivery task failed. Other tasks for the same alert are unaffected.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("delivery endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("could not build mail message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("invalid recipient address `{0}`")]
    Address(String),
    #[error("no usable recipients")]
    NoRecipients,
    #[error("delivery task aborted: {0}")]
    TaskAborted(String),
}
