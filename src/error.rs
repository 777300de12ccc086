//! Structured error types for the ingestion engine.
//!
//! Leaf errors are `thiserror` enums so callers can match on a variant
//! (e.g. a decoding error vs a sequencing gap); call chains that only need
//! to propagate and annotate use `anyhow::Result` on top, the same layering
//! the rest of the workspace uses.

use thiserror::Error;

/// Errors raised while decoding exchange payloads or store query results.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing field `{field}` in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    #[error("field `{field}` in {context} had unexpected shape: {detail}")]
    UnexpectedShape {
        field: &'static str,
        context: &'static str,
        detail: String,
    },

    #[error("numeric conversion failed for `{field}`: {detail}")]
    NumericConversion { field: &'static str, detail: String },
}

/// Errors raised by a `PointStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),

    #[error("store query failed: {0}")]
    Query(String),
}

/// Errors raised while loading or validating configuration. These are all
/// fatal-init errors per the error-handling design: the process exits
/// immediately rather than retrying.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by the sequencing/gap-detection machinery (order book
/// reconstruction, missing-trade reconciliation). These are logged, never
/// panicked on.
#[derive(Debug, Error)]
pub enum SequencingError {
    #[error("sequence gap on market {market}: have {have}, got {got}")]
    BookSequenceGap {
        market: String,
        have: i64,
        got: i64,
    },

    #[error("trade id gap on market {market}: [{from}, {to})")]
    TradeIdGap {
        market: String,
        from: i64,
        to: i64,
    },
}

/// Errors returned by the exchange collaborator traits (the REST/WebSocket
/// clients themselves). Those clients are external collaborators this crate
/// does not implement, so the boundary is kept deliberately thin: a decode
/// failure on an otherwise-successful response, or an opaque transport
/// failure the request executor's retry loop treats uniformly.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("request to collaborator failed: {0}")]
    Transport(#[from] anyhow::Error),
}
