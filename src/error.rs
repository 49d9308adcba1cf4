//! Crate-wide error taxonomy.
//!
//! Mirrors the failure modes a batch conversion run actually needs to tell
//! apart: whether the *dictionary* was never recognised, whether it parsed
//! but decoding failed partway, or whether the underlying I/O failed. Per
//! article problems (bad references, unterminated escapes) are downgraded to
//! `log::warn!` at the point they are discovered rather than propagated as
//! errors -- see `duden::text::reference`.

use std::path::PathBuf;

pub type DYNERR = Box<dyn std::error::Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}: not a recognised dictionary file")]
    NotRecognised(PathBuf),

    #[error("unsupported format version 0x{version:06x}")]
    UnsupportedVersion { version: u32 },

    #[error("decode failure: {0}")]
    DecodeFailure(String),

    #[error("i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseError(String),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::DecodeFailure(msg.into())
    }
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::ParseError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
