//! Page geometry extraction
//!
//! The only PDF parsing the engine does: read the first page's MediaBox so
//! the merged document can reproduce the source page size. Extraction happens
//! once at submission time; the result is immutable for the life of the job.

use lopdf::{Document, Object};

use crate::error::BatchError;
use docx_compose::PageSize;

/// First-page dimensions in points. MediaBox may be inherited from an
/// ancestor page-tree node, so the lookup walks `Parent` links.
pub fn pdf_page_size(bytes: &[u8]) -> Result<PageSize, BatchError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| BatchError::Input(format!("unreadable PDF: {e}")))?;

    let pages = doc.get_pages();
    let (_, &first_page) = pages
        .iter()
        .next()
        .ok_or_else(|| BatchError::Input("PDF has no pages".into()))?;

    let mut node = first_page;
    // Page trees are shallow; the bound guards against malformed Parent cycles.
    for _ in 0..32 {
        let dict = doc
            .get_object(node)
            .and_then(Object::as_dict)
            .map_err(|e| BatchError::Input(format!("invalid page object: {e}")))?;

        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = match media_box {
                Object::Reference(id) => doc
                    .get_object(*id)
                    .map_err(|e| BatchError::Input(format!("invalid MediaBox: {e}")))?,
                other => other,
            };
            return parse_media_box(media_box);
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = parent,
            Err(_) => break,
        }
    }

    Ok(PageSize::LETTER)
}

fn parse_media_box(obj: &Object) -> Result<PageSize, BatchError> {
    let arr = obj
        .as_array()
        .map_err(|_| BatchError::Input("MediaBox is not an array".into()))?;
    if arr.len() != 4 {
        return Err(BatchError::Input("MediaBox must have 4 numbers".into()));
    }

    let mut coords = [0.0f32; 4];
    for (slot, value) in coords.iter_mut().zip(arr) {
        *slot = as_points(value)
            .ok_or_else(|| BatchError::Input("non-numeric MediaBox entry".into()))?;
    }

    Ok(PageSize {
        width_pt: (coords[2] - coords[0]).abs(),
        height_pt: (coords[3] - coords[1]).abs(),
    })
}

fn as_points(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
