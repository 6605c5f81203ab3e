//! Pluggable conversion engines, one per operation.
//!
//! Each engine performs exactly one delegated call into its external
//! capability (a subprocess or a library) and writes results into the request
//! workspace. Engines never retry: conversion failures are deterministic for
//! a given input.

pub(crate) mod assemble;
pub(crate) mod office;
pub(crate) mod pages;
pub(crate) mod poppler;

use async_trait::async_trait;
use docmill_workspace::Workspace;

use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, Operation};

/// A conversion capability bound to one operation.
#[async_trait]
pub trait ConvertEngine: Send + Sync {
    /// Operation this engine implements.
    fn operation(&self) -> Operation;

    /// Run the job against staged inputs, writing outputs into `workspace`.
    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError>;
}
