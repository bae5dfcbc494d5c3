//! DOCX composition
//!
//! Combines multiple DOCX documents into a single multi-section document,
//! preserving the page geometry of each source document.
//!
//! Each appended document becomes a new section (a hard section break, not a
//! soft page break) so that landscape and portrait sources can coexist in the
//! combined output.

pub mod compose;
pub mod error;

pub use compose::{merge_documents, MergeItem};
pub use error::ComposeError;

use serde::Serialize;

/// Page dimensions in PostScript points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter portrait, the fallback when a source page box is unreadable.
    pub const LETTER: PageSize = PageSize {
        width_pt: 612.0,
        height_pt: 792.0,
    };

    pub fn is_landscape(&self) -> bool {
        self.width_pt > self.height_pt
    }
}
