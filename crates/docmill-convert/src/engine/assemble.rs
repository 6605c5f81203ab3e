//! Image to PDF assembly: one page per uploaded image, in upload order.
//!
//! Images are decoded to raw RGB and embedded as image XObjects; each page's
//! media box matches the image's pixel dimensions, one point per pixel.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docmill_workspace::Workspace;
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref};
use tracing::debug;

use crate::engine::ConvertEngine;
use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, Operation};
use crate::sanitize::derived_file_name;

const PDF_MIME: &str = "application/pdf";
const IMAGE_NAME: &[u8] = b"Im0";

struct PageImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

/// Assembles uploaded raster images into a single PDF document.
pub(crate) struct ImagesToPdfEngine;

#[async_trait]
impl ConvertEngine for ImagesToPdfEngine {
    fn operation(&self) -> Operation {
        Operation::ImagesToPdf
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let output_name = derived_file_name(job.output_stem(), "pdf");
        let output = workspace.output_path(&output_name)?;
        let inputs: Vec<PathBuf> = job
            .inputs
            .iter()
            .map(|input| input.staged_path.clone())
            .collect();

        let target = output.clone();
        tokio::task::spawn_blocking(move || {
            let mut pages = Vec::with_capacity(inputs.len());
            for path in &inputs {
                pages.push(decode_image(path)?);
            }
            let bytes = render_pdf(&pages);
            fs::write(&target, bytes).map_err(|source| ConversionError::Io {
                operation: "write_pdf",
                path: target.clone(),
                source,
            })
        })
        .await
        .map_err(|err| ConversionError::Io {
            operation: "blocking_task",
            path: PathBuf::new(),
            source: io::Error::other(err),
        })??;

        debug!(images = job.inputs.len(), "images assembled into pdf");
        Ok(ConversionResult {
            outputs: vec![output],
            mime: PDF_MIME,
            extension: "pdf",
        })
    }
}

fn decode_image(path: &Path) -> Result<PageImage, ConversionError> {
    let decoded = image::open(path)
        .map_err(|err| ConversionError::MalformedInput {
            detail: err.to_string(),
        })?
        .to_rgb8();
    Ok(PageImage {
        width: decoded.width(),
        height: decoded.height(),
        rgb: decoded.into_raw(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn render_pdf(pages: &[PageImage]) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let pages_id = alloc.bump();

    let plans: Vec<(Ref, Ref, Ref)> = pages
        .iter()
        .map(|_| (alloc.bump(), alloc.bump(), alloc.bump()))
        .collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(plans.iter().map(|(page_id, _, _)| *page_id))
        .count(i32::try_from(plans.len()).unwrap_or(i32::MAX));

    for (page, (page_id, content_id, image_id)) in pages.iter().zip(&plans) {
        let width = page.width as f32;
        let height = page.height as f32;

        let mut xobject = pdf.image_xobject(*image_id, &page.rgb);
        xobject.width(i32::try_from(page.width).unwrap_or(i32::MAX));
        xobject.height(i32::try_from(page.height).unwrap_or(i32::MAX));
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();

        let mut content = Content::new();
        content
            .save_state()
            .transform([width, 0.0, 0.0, height, 0.0, 0.0])
            .x_object(Name(IMAGE_NAME))
            .restore_state();
        pdf.stream(*content_id, &content.finish());

        pdf.page(*page_id)
            .media_box(Rect::new(0.0, 0.0, width, height))
            .parent(pages_id)
            .contents(*content_id)
            .resources()
            .x_objects()
            .pair(Name(IMAGE_NAME), *image_id);
    }

    pdf.finish()
}
