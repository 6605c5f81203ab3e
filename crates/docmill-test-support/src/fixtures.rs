//! Document and image fixtures built in memory.

use std::io::Cursor;

use image::{ImageBuffer, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// Build a valid PDF with the given number of pages, one line of text each.
///
/// # Panics
///
/// Panics if the fixture cannot be serialised, which indicates a broken test
/// environment rather than a failing assertion.
#[must_use]
pub fn pdf_with_pages(pages: u32) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {page}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("fixture content encodes"),
        ));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(pages),
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .expect("fixture pdf serialises");
    bytes
}

/// Build a valid RGB PNG of the given dimensions with a deterministic
/// gradient fill.
///
/// # Panics
///
/// Panics if the fixture cannot be encoded.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn png_rgb(width: u32, height: u32) -> Vec<u8> {
    let pixels = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 31) % 256) as u8,
            ((y * 57) % 256) as u8,
            (((x + y) * 13) % 256) as u8,
        ])
    });
    let mut cursor = Cursor::new(Vec::new());
    pixels
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("fixture png encodes");
    cursor.into_inner()
}
