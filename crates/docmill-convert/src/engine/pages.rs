//! PDF page surgery: merge and range extraction, via `lopdf`.
//!
//! Document parsing and serialisation are CPU-bound, so both engines run the
//! `lopdf` work on the blocking pool.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docmill_workspace::Workspace;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::engine::ConvertEngine;
use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, Operation};
use crate::sanitize::derived_file_name;

const PDF_MIME: &str = "application/pdf";

/// Merges uploaded PDFs into one document, preserving upload order.
pub(crate) struct PdfMergeEngine;

#[async_trait]
impl ConvertEngine for PdfMergeEngine {
    fn operation(&self) -> Operation {
        Operation::PdfMerge
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let output_name = derived_file_name(&format!("{}-merged", job.output_stem()), "pdf");
        let output = workspace.output_path(&output_name)?;
        let inputs: Vec<PathBuf> = job
            .inputs
            .iter()
            .map(|input| input.staged_path.clone())
            .collect();

        let target = output.clone();
        let pages = tokio::task::spawn_blocking(move || {
            let mut sources = Vec::with_capacity(inputs.len());
            for path in &inputs {
                sources.push(load_document(path)?);
            }
            let mut merged = merge_documents(sources)?;
            let pages = merged.get_pages().len();
            save_document(&mut merged, &target)?;
            Ok::<_, ConversionError>(pages)
        })
        .await
        .map_err(join_failure)??;

        debug!(inputs = job.inputs.len(), pages, "pdfs merged");
        Ok(ConversionResult {
            outputs: vec![output],
            mime: PDF_MIME,
            extension: "pdf",
        })
    }
}

/// Extracts an inclusive page range into a new PDF.
pub(crate) struct PdfExtractEngine;

#[async_trait]
impl ConvertEngine for PdfExtractEngine {
    fn operation(&self) -> Operation {
        Operation::PdfExtract
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let input = job.inputs.first().ok_or(ConversionError::Unsupported {
            detail: "pdf_extract requires one staged input".to_string(),
        })?;
        let range = job.options.pages.ok_or(ConversionError::Unsupported {
            detail: "pdf_extract requires a page range".to_string(),
        })?;

        let output_name = derived_file_name(
            &format!("{}-pages-{}-{}", input.stem, range.start, range.end),
            "pdf",
        );
        let output = workspace.output_path(&output_name)?;
        let source_path = input.staged_path.clone();

        let target = output.clone();
        tokio::task::spawn_blocking(move || {
            let mut document = load_document(&source_path)?;
            let total = u32::try_from(document.get_pages().len()).unwrap_or(u32::MAX);
            if range.end > total {
                return Err(ConversionError::MalformedInput {
                    detail: format!(
                        "page range {}-{} exceeds document length {total}",
                        range.start, range.end
                    ),
                });
            }

            let discard: Vec<u32> = (1..=total)
                .filter(|page| *page < range.start || *page > range.end)
                .collect();
            if !discard.is_empty() {
                document.delete_pages(&discard);
            }
            document.prune_objects();
            save_document(&mut document, &target)
        })
        .await
        .map_err(join_failure)??;

        debug!(start = range.start, end = range.end, "pages extracted");
        Ok(ConversionResult {
            outputs: vec![output],
            mime: PDF_MIME,
            extension: "pdf",
        })
    }
}

fn load_document(path: &Path) -> Result<Document, ConversionError> {
    Document::load(path).map_err(|err| ConversionError::MalformedInput {
        detail: err.to_string(),
    })
}

fn save_document(document: &mut Document, path: &Path) -> Result<(), ConversionError> {
    document.save(path).map_err(|err| ConversionError::Io {
        operation: "save_pdf",
        path: path.to_path_buf(),
        source: io::Error::other(err),
    })?;
    Ok(())
}

fn join_failure(err: tokio::task::JoinError) -> ConversionError {
    ConversionError::Io {
        operation: "blocking_task",
        path: PathBuf::new(),
        source: io::Error::other(err),
    }
}

fn object_kind(object: &Object) -> Option<&str> {
    let name = object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()?;
    std::str::from_utf8(name).ok()
}

/// Combine source documents into one, renumbering objects so identifiers
/// never collide and rebuilding a single page tree in input order.
fn merge_documents(sources: Vec<Document>) -> Result<Document, ConversionError> {
    let mut max_id = 1;
    let mut page_objects: Vec<(ObjectId, Object)> = Vec::new();
    let mut carried: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut source in sources {
        source.renumber_objects_with(max_id);
        max_id = source.max_id + 1;
        for object_id in source.get_pages().into_values() {
            let object = source
                .get_object(object_id)
                .map_err(|err| ConversionError::MalformedInput {
                    detail: err.to_string(),
                })?
                .to_owned();
            page_objects.push((object_id, object));
        }
        carried.extend(source.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut pages_root: Option<(ObjectId, Dictionary)> = None;
    let mut catalog: Option<(ObjectId, Dictionary)> = None;

    for (object_id, object) in carried {
        match object_kind(&object) {
            Some("Catalog") => {
                if catalog.is_none()
                    && let Ok(dict) = object.as_dict()
                {
                    catalog = Some((object_id, dict.clone()));
                }
            }
            Some("Pages") => {
                if let Ok(dict) = object.as_dict() {
                    if let Some((_, existing)) = &mut pages_root {
                        existing.extend(dict);
                    } else {
                        pages_root = Some((object_id, dict.clone()));
                    }
                }
            }
            // Page nodes are re-parented below; outlines are not merged.
            Some("Page" | "Outlines" | "Outline") => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, mut pages_dict) =
        pages_root.ok_or_else(|| ConversionError::MalformedInput {
            detail: "no page tree found in inputs".to_string(),
        })?;
    let (catalog_id, mut catalog_dict) =
        catalog.ok_or_else(|| ConversionError::MalformedInput {
            detail: "no document catalog found in inputs".to_string(),
        })?;

    for (object_id, object) in &page_objects {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged.objects.insert(*object_id, Object::Dictionary(dict));
        }
    }

    pages_dict.set(
        "Count",
        i64::try_from(page_objects.len()).unwrap_or(i64::MAX),
    );
    pages_dict.set(
        "Kids",
        page_objects
            .iter()
            .map(|(object_id, _)| Object::Reference(*object_id))
            .collect::<Vec<_>>(),
    );
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    catalog_dict.set("Pages", pages_id);
    catalog_dict.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = u32::try_from(merged.objects.len()).unwrap_or(u32::MAX);
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}
