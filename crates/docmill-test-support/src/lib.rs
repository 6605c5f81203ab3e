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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (document and image fixtures), tools.rs (external tool probes).

pub mod fixtures;
pub mod tools;

pub use fixtures::{pdf_with_pages, png_rgb};
pub use tools::tool_available;
