//! Result archive packaging
//!
//! Builds the downloadable ZIP for a finished job: one deflate-compressed
//! entry per converted file, in input order, plus the optional combined
//! document. Filtering rebuilds the whole archive because the format has no
//! cheap deletion primitive.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::BatchError;

/// One named payload destined for the result archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

fn deflate() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Build the result archive. Entry order equals input order; the combined
/// document, when present, goes last.
pub fn build_archive(
    entries: &[ArchiveEntry],
    combined: Option<&ArchiveEntry>,
) -> Result<Vec<u8>, BatchError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries.iter().chain(combined) {
        writer
            .start_file(entry.name.as_str(), deflate())
            .map_err(|e| BatchError::Archive(e.to_string()))?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| BatchError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| BatchError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Rebuild an archive without the entries whose name matches `drop`.
pub fn strip_entries(
    archive: &[u8],
    drop: impl Fn(&str) -> bool,
) -> Result<Vec<u8>, BatchError> {
    let mut reader = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| BatchError::Archive(e.to_string()))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..reader.len() {
        let mut entry = reader
            .by_index(index)
            .map_err(|e| BatchError::Archive(e.to_string()))?;
        if drop(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| BatchError::Archive(e.to_string()))?;
        writer
            .start_file(name, deflate())
            .map_err(|e| BatchError::Archive(e.to_string()))?;
        writer
            .write_all(&bytes)
            .map_err(|e| BatchError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| BatchError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COMBINED_SUFFIX;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let mut reader = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..reader.len())
            .map(|i| reader.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_build_preserves_entry_order() {
        let archive = build_archive(
            &[
                entry("c.docx", b"ccc"),
                entry("a.docx", b"aaa"),
                entry("b.docx", b"bbb"),
            ],
            Some(&entry("plans_COMBINED.docx", b"merged")),
        )
        .unwrap();

        assert_eq!(
            entry_names(&archive),
            vec!["c.docx", "a.docx", "b.docx", "plans_COMBINED.docx"]
        );
    }

    #[test]
    fn test_build_without_combined() {
        let archive = build_archive(&[entry("a.docx", b"aaa")], None).unwrap();
        assert_eq!(entry_names(&archive), vec!["a.docx"]);
    }

    #[test]
    fn test_strip_drops_combined_entry() {
        let full = build_archive(
            &[entry("a.docx", b"aaa"), entry("b.docx", b"bbb")],
            Some(&entry("plans_COMBINED.docx", b"a much larger merged payload")),
        )
        .unwrap();

        let stripped = strip_entries(&full, |name| name.ends_with(COMBINED_SUFFIX)).unwrap();

        let names = entry_names(&stripped);
        assert_eq!(names, vec!["a.docx", "b.docx"]);
        assert!(names.iter().all(|n| !n.ends_with(COMBINED_SUFFIX)));
        assert!(stripped.len() <= full.len());
    }

    #[test]
    fn test_strip_keeps_entry_contents() {
        let full = build_archive(
            &[entry("a.docx", b"payload-a")],
            Some(&entry("x_COMBINED.docx", b"merged")),
        )
        .unwrap();

        let stripped = strip_entries(&full, |name| name.ends_with(COMBINED_SUFFIX)).unwrap();

        let mut reader = ZipArchive::new(Cursor::new(stripped.as_slice())).unwrap();
        let mut file = reader.by_name("a.docx").unwrap();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"payload-a");
    }
}
