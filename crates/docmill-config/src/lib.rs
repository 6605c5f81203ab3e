#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Typed configuration for the docmill services.
//!
//! # Design
//! - Pure data carriers in `model.rs`; environment loading in `loader.rs`;
//!   invariant checks in `validate.rs`.
//! - Configuration is resolved once at startup into an immutable
//!   [`ConfigSnapshot`]; request handlers never mutate it.

mod defaults;
mod error;
mod loader;
mod model;
mod validate;

pub use error::ConfigError;
pub use loader::{load_from_env, load_with_lookup};
pub use model::{
    ConfigSnapshot, ConvertPolicy, CsrfPolicy, RateLimitPolicy, ServiceProfile, SweepPolicy,
    UploadPolicy,
};
pub use validate::validate_snapshot;
