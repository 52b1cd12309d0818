//! Error taxonomy for the deobfuscation pipeline.
//!
//! Per spec: only a parse failure is caller-visible. Every other failure
//! mode (evaluation error during decoder side-load or call, unexpected AST
//! shape, proxy lookup mismatch) is handled locally inside the pipeline and
//! never escapes as an `Err` — see `tracing::warn!` call sites throughout
//! `deobfuscate`. Codegen itself (`oxc_codegen::Codegen::build`) is
//! infallible, so there is no second caller-visible variant to report it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("failed to parse source: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
