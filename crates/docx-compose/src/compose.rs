//! DOCX merge algorithm
//!
//! The algorithm:
//! 1. If empty, return error
//! 2. Use `items[0]` as the base package: styles, relationships and content
//!    types carry over from it unchanged
//! 3. For each item, splice its body content into the base `word/document.xml`,
//!    terminated by a section break carrying that item's page geometry
//! 4. Rewrite the base package with the composed document part
//!
//! Section properties are rebuilt from scratch for every section: orientation
//! follows the source page box (landscape iff width > height), page size is
//! taken verbatim in twips, and all four margins are forced to 12pt so the
//! full source page area stays usable. Style definitions are resolved against
//! the base package's part set; conflicting style ids in later items fall back
//! to the base definitions.

use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ComposeError;
use crate::PageSize;

const DOCUMENT_PART: &str = "word/document.xml";

/// Twentieths of a point, the WordprocessingML length unit.
const TWIPS_PER_POINT: f32 = 20.0;

/// 12pt margins on every edge of every merged section.
const MARGIN_TWIPS: i64 = 240;

/// One converted document to fold into the combined output.
#[derive(Debug, Clone)]
pub struct MergeItem {
    pub bytes: Vec<u8>,
    pub page_size: PageSize,
}

/// Merge multiple DOCX documents into one multi-section document.
///
/// Item order is preserved; each item keeps its own page geometry.
pub fn merge_documents(items: &[MergeItem]) -> Result<Vec<u8>, ComposeError> {
    if items.is_empty() {
        return Err(ComposeError::NoDocuments);
    }

    let base_xml = read_part(&items[0].bytes, DOCUMENT_PART)?;
    let base_body = locate_body(&base_xml)?;

    let mut body = String::new();
    for (index, item) in items.iter().enumerate() {
        let content = if index == 0 {
            base_body.content.clone()
        } else {
            let xml = read_part(&item.bytes, DOCUMENT_PART)?;
            locate_body(&xml)?.content
        };
        body.push_str(&content);

        if index + 1 < items.len() {
            // Hard section break: the sectPr inside a paragraph terminates the
            // section holding the content that precedes it.
            body.push_str(&section_break(item.page_size));
        } else {
            // The body-level sectPr closes the final section.
            body.push_str(&section_properties(item.page_size));
        }
    }

    let merged_xml = format!(
        "{}{}{}",
        &base_xml[..base_body.content_start],
        body,
        &base_xml[base_body.body_end..]
    );

    rewrite_package(&items[0].bytes, DOCUMENT_PART, merged_xml.as_bytes())
}

/// Byte spans of interest inside a `word/document.xml` part.
#[derive(Debug, Clone)]
struct BodySlices {
    /// Offset just past the `<w:body>` start tag.
    content_start: usize,
    /// Offset of the `</w:body>` end tag.
    body_end: usize,
    /// Body content with any trailing body-level `sectPr` stripped.
    content: String,
}

/// Find the body content span and the trailing section properties, if any.
fn locate_body(xml: &str) -> Result<BodySlices, ComposeError> {
    let mut reader = Reader::from_str(xml);

    let mut content_start: Option<usize> = None;
    let mut body_end: Option<usize> = None;
    let mut sect_pr_start: Option<usize> = None;
    let mut open_sect_pr: Option<usize> = None;
    let mut in_body = false;
    let mut depth = 0usize;

    loop {
        let token_start = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !in_body {
                    if e.local_name().as_ref() == b"body" {
                        in_body = true;
                        content_start = Some(reader.buffer_position() as usize);
                    }
                } else {
                    if depth == 0 && e.local_name().as_ref() == b"sectPr" {
                        open_sect_pr = Some(token_start);
                    }
                    depth += 1;
                }
            }
            Ok(Event::Empty(e)) => {
                if in_body && depth == 0 && e.local_name().as_ref() == b"sectPr" {
                    sect_pr_start = Some(token_start);
                }
            }
            Ok(Event::End(e)) => {
                if in_body {
                    if depth == 0 {
                        if e.local_name().as_ref() == b"body" {
                            body_end = Some(token_start);
                            break;
                        }
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            if let Some(start) = open_sect_pr.take() {
                                if e.local_name().as_ref() == b"sectPr" {
                                    sect_pr_start = Some(start);
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ComposeError::Xml(e.to_string())),
            _ => {}
        }
    }

    let content_start =
        content_start.ok_or_else(|| ComposeError::Xml("no <w:body> element".into()))?;
    let body_end = body_end.ok_or_else(|| ComposeError::Xml("unterminated <w:body>".into()))?;

    // A body-level sectPr applies to the last section only; it gets replaced
    // by the geometry of the item it belongs to.
    let content_end = sect_pr_start.unwrap_or(body_end);
    let content = xml[content_start..content_end].to_string();

    Ok(BodySlices {
        content_start,
        body_end,
        content,
    })
}

/// Section properties for one page geometry.
fn section_properties(page: PageSize) -> String {
    let w = (page.width_pt * TWIPS_PER_POINT).round() as i64;
    let h = (page.height_pt * TWIPS_PER_POINT).round() as i64;
    let orient = if page.is_landscape() {
        r#" w:orient="landscape""#
    } else {
        ""
    };
    format!(
        concat!(
            r#"<w:sectPr><w:type w:val="nextPage"/>"#,
            r#"<w:pgSz w:w="{w}" w:h="{h}"{orient}/>"#,
            r#"<w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" "#,
            r#"w:header="0" w:footer="0" w:gutter="0"/></w:sectPr>"#
        ),
        w = w,
        h = h,
        orient = orient,
        m = MARGIN_TWIPS,
    )
}

/// An empty paragraph carrying section properties, i.e. a section break.
fn section_break(page: PageSize) -> String {
    format!("<w:p><w:pPr>{}</w:pPr></w:p>", section_properties(page))
}

/// Read a text part out of a DOCX package.
fn read_part(docx: &[u8], name: &str) -> Result<String, ComposeError> {
    let mut archive = ZipArchive::new(Cursor::new(docx))
        .map_err(|e| ComposeError::Package(e.to_string()))?;
    let mut part = archive
        .by_name(name)
        .map_err(|_| ComposeError::MissingPart(name.to_string()))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| ComposeError::Package(e.to_string()))?;
    Ok(xml)
}

/// Rewrite one part of a DOCX package, copying every other part verbatim.
fn rewrite_package(docx: &[u8], name: &str, contents: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut archive = ZipArchive::new(Cursor::new(docx))
        .map_err(|e| ComposeError::Package(e.to_string()))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ComposeError::Package(e.to_string()))?;
        if entry.name() == name {
            continue;
        }
        let entry_name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ComposeError::Package(e.to_string()))?;
        writer
            .start_file(entry_name, options)
            .map_err(|e| ComposeError::Package(e.to_string()))?;
        writer
            .write_all(&bytes)
            .map_err(|e| ComposeError::Package(e.to_string()))?;
    }

    writer
        .start_file(name, options)
        .map_err(|e| ComposeError::Package(e.to_string()))?;
    writer
        .write_all(contents)
        .map_err(|e| ComposeError::Package(e.to_string()))?;

    let cursor = writer
        .finish()
        .map_err(|e| ComposeError::Package(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper to create a minimal DOCX package with one identifiable paragraph
    fn create_test_docx(text: &str) -> Vec<u8> {
        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                r#"<w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p>"#,
                r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr>"#,
                r#"</w:body></w:document>"#
            ),
            text
        );

        let content_types = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
            r#"</Types>"#
        );

        let rels = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
            r#"</Relationships>"#
        );

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in [
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", rels.as_bytes()),
            ("word/document.xml", document.as_bytes()),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn portrait() -> PageSize {
        PageSize {
            width_pt: 612.0,
            height_pt: 792.0,
        }
    }

    fn landscape() -> PageSize {
        PageSize {
            width_pt: 792.0,
            height_pt: 612.0,
        }
    }

    fn document_xml(docx: &[u8]) -> String {
        read_part(docx, DOCUMENT_PART).unwrap()
    }

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(&[]);
        assert!(matches!(result, Err(ComposeError::NoDocuments)));
    }

    #[test]
    fn test_merge_two_documents_combines_bodies() {
        let merged = merge_documents(&[
            MergeItem {
                bytes: create_test_docx("First document"),
                page_size: portrait(),
            },
            MergeItem {
                bytes: create_test_docx("Second document"),
                page_size: portrait(),
            },
        ])
        .unwrap();

        let xml = document_xml(&merged);
        assert!(xml.contains("First document"));
        assert!(xml.contains("Second document"));
        // Body order must match item order
        assert!(xml.find("First document").unwrap() < xml.find("Second document").unwrap());
    }

    #[test]
    fn test_merge_creates_one_section_per_item() {
        let items: Vec<MergeItem> = (0..3)
            .map(|i| MergeItem {
                bytes: create_test_docx(&format!("Doc{}", i)),
                page_size: portrait(),
            })
            .collect();

        let merged = merge_documents(&items).unwrap();
        let xml = document_xml(&merged);

        assert_eq!(xml.matches("<w:sectPr>").count(), 3);
        // Two in-paragraph breaks, one body-level closer
        assert_eq!(xml.matches("<w:pPr><w:sectPr>").count(), 2);
    }

    #[test]
    fn test_merge_strips_source_section_properties() {
        let merged = merge_documents(&[
            MergeItem {
                bytes: create_test_docx("A"),
                page_size: portrait(),
            },
            MergeItem {
                bytes: create_test_docx("B"),
                page_size: portrait(),
            },
        ])
        .unwrap();

        // The source packages carry their own body-level sectPr (bare pgSz, no
        // margins). Those must not survive: two items -> exactly two sections,
        // every one rebuilt with explicit margins.
        let xml = document_xml(&merged);
        assert_eq!(xml.matches("<w:sectPr>").count(), 2);
        assert_eq!(xml.matches("<w:pgMar").count(), 2);
    }

    #[test]
    fn test_landscape_orientation_follows_page_size() {
        let merged = merge_documents(&[
            MergeItem {
                bytes: create_test_docx("Portrait page"),
                page_size: portrait(),
            },
            MergeItem {
                bytes: create_test_docx("Landscape page"),
                page_size: landscape(),
            },
        ])
        .unwrap();

        let xml = document_xml(&merged);
        assert_eq!(xml.matches(r#"w:orient="landscape""#).count(), 1);
        // Portrait section: 612pt x 792pt -> 12240 x 15840 twips
        assert!(xml.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));
        // Landscape section carries the orientation attribute
        assert!(xml.contains(r#"<w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>"#));
    }

    #[test]
    fn test_margins_forced_to_twelve_points() {
        let merged = merge_documents(&[
            MergeItem {
                bytes: create_test_docx("A"),
                page_size: portrait(),
            },
            MergeItem {
                bytes: create_test_docx("B"),
                page_size: portrait(),
            },
        ])
        .unwrap();

        let xml = document_xml(&merged);
        assert_eq!(xml.matches(r#"w:top="240""#).count(), 2);
        assert_eq!(xml.matches(r#"w:left="240""#).count(), 2);
    }

    #[test]
    fn test_single_document_still_gets_geometry_applied() {
        let merged = merge_documents(&[MergeItem {
            bytes: create_test_docx("Only"),
            page_size: landscape(),
        }])
        .unwrap();

        let xml = document_xml(&merged);
        assert!(xml.contains("Only"));
        assert_eq!(xml.matches("<w:sectPr>").count(), 1);
        assert!(xml.contains(r#"w:orient="landscape""#));
    }

    #[test]
    fn test_merged_package_keeps_other_parts() {
        let merged = merge_documents(&[
            MergeItem {
                bytes: create_test_docx("A"),
                page_size: portrait(),
            },
            MergeItem {
                bytes: create_test_docx("B"),
                page_size: portrait(),
            },
        ])
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(merged.as_slice())).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"[Content_Types].xml".to_string()));
        assert!(names.contains(&"_rels/.rels".to_string()));
        assert!(names.contains(&"word/document.xml".to_string()));
    }
}
