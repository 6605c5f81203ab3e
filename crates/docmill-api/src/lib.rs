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

//! HTTP surface for the Docmill conversion service.
//!
//! [`ApiServer`] wires the routes, middleware stack, and shared state;
//! everything else is internal to the crate. Conversion requests walk a
//! fixed pipeline (receive, validate, stage, convert, stream, clean) and
//! failures map onto RFC 9457 problem responses.

pub mod models;

mod http;
mod state;

pub use http::router::ApiServer;
pub use models::{CsrfTokenResponse, ProblemDetails};
