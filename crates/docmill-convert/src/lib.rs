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

//! Conversion domain: upload validation, job dispatch, and the pluggable
//! conversion engines.
//!
//! Layout: `model.rs` (jobs and results), `validate.rs` (upload checks),
//! `sniff.rs` (magic-byte inspection), `sanitize.rs` (filename hygiene),
//! `tool.rs` (subprocess boundary), `engine/` (one engine per operation),
//! `dispatcher.rs` (operation registry), `bundle.rs` (multi-output zip).

mod bundle;
mod dispatcher;
mod engine;
mod error;
mod model;
mod sanitize;
mod sniff;
mod tool;
mod validate;

pub use bundle::{ZIP_MIME, bundle_outputs};
pub use dispatcher::Dispatcher;
pub use engine::ConvertEngine;
pub use error::{ConversionError, ValidationError};
pub use model::{
    ConversionJob, ConversionResult, ImageFormat, JobOptions, Operation, PageRange,
    UploadDescriptor,
};
pub use sanitize::{derived_file_name, sanitize_file_name, split_stem};
pub use sniff::{DetectedKind, sniff};
pub use tool::ExternalTool;
pub use validate::{CheckedUpload, SniffMode, UploadValidator};
