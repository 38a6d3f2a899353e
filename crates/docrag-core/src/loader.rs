//! Block loaders: turn raw file bytes into an ordered paragraph/table stream.
//!
//! `.docx` is read straight from its OOXML parts (`word/document.xml`, plus
//! `word/styles.xml` to map localized style ids to names). `.txt` treats blank
//! lines as paragraph breaks.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::types::{Block, Paragraph, SourceDocument, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Docx,
    Text,
}

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Load the block stream of a document, dispatching on its extension.
pub fn load_blocks(doc: &SourceDocument) -> Result<Vec<Block>> {
    match DocumentFormat::from_filename(&doc.filename) {
        Some(DocumentFormat::Docx) => read_docx(&doc.bytes).map_err(|e| Error::parse(&doc.filename, e)),
        Some(DocumentFormat::Text) => Ok(read_text(&doc.bytes)),
        None => Err(Error::parse(&doc.filename, "unsupported document format")),
    }
}

pub fn read_text(bytes: &[u8]) -> Vec<Block> {
    let text = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(Block::Paragraph(Paragraph::plain(current.join("\n"))));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(Block::Paragraph(Paragraph::plain(current.join("\n"))));
    }
    blocks
}

pub fn read_docx(bytes: &[u8]) -> anyhow::Result<Vec<Block>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let styles = match read_part(&mut archive, "word/styles.xml") {
        Ok(xml) => parse_style_names(&xml)?,
        Err(_) => HashMap::new(),
    };
    let document = read_part(&mut archive, "word/document.xml")
        .map_err(|e| anyhow::anyhow!("missing word/document.xml: {}", e))?;
    parse_document_xml(&document, &styles)
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> anyhow::Result<String> {
    let mut file = archive.by_name(name)?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Map `w:styleId` → human style name from `word/styles.xml`.
pub fn parse_style_names(xml: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut names = HashMap::new();
    let mut current_id: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.name().as_ref() == b"w:style" => {
                current_id = attr_value(e, b"w:styleId");
            }
            Event::Empty(ref e) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(name)) = (current_id.as_ref(), attr_value(e, b"w:val")) {
                    names.insert(id.clone(), name);
                }
            }
            Event::End(ref e) if e.name().as_ref() == b"w:style" => current_id = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

pub fn parse_document_xml(xml: &str, styles: &HashMap<String, String>) -> anyhow::Result<Vec<Block>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();

    let mut para_text = String::new();
    let mut para_style: Option<String> = None;
    let mut in_text = false;
    // Only the outermost table becomes a block; nested ones flatten into cells.
    let mut table_depth = 0usize;
    let mut table = TableBuilder::default();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:p" => {
                    para_text.clear();
                    para_style = None;
                }
                b"w:t" => in_text = true,
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table = TableBuilder::default();
                    }
                }
                b"w:tr" if table_depth == 1 => table.row.clear(),
                b"w:tc" if table_depth == 1 => table.cell.clear(),
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"w:pStyle" => {
                    para_style = attr_value(e, b"w:val").map(|id| styles.get(&id).cloned().unwrap_or(id));
                }
                b"w:tab" => para_text.push('\t'),
                b"w:br" | b"w:cr" => para_text.push('\n'),
                _ => {}
            },
            Event::Text(ref t) if in_text => {
                para_text.push_str(&t.unescape()?);
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = para_text.trim().to_string();
                    if table_depth > 0 {
                        if !text.is_empty() {
                            table.cell.push(text);
                        }
                    } else if !text.is_empty() {
                        blocks.push(Block::Paragraph(Paragraph { text, style: para_style.take() }));
                    }
                    para_text.clear();
                }
                b"w:tc" if table_depth == 1 => {
                    let cell = table.cell.join(" ");
                    table.row.push(cell);
                    table.cell.clear();
                }
                b"w:tr" if table_depth == 1 => {
                    let row = std::mem::take(&mut table.row);
                    if row.iter().any(|c| !c.is_empty()) {
                        table.rows.push(row);
                    }
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        let rows = std::mem::take(&mut table.rows);
                        if !rows.is_empty() {
                            blocks.push(Block::Table(Table { rows }));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="1"/></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>world &amp; all.</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>2</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p/>
</w:body></w:document>"#;

    #[test]
    fn document_xml_yields_paragraphs_and_tables_in_order() {
        let mut styles = HashMap::new();
        styles.insert("1".to_string(), "heading 1".to_string());
        let blocks = parse_document_xml(DOC, &styles).expect("parse");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::Paragraph(Paragraph::styled("Scope", "heading 1")));
        assert_eq!(blocks[1], Block::Paragraph(Paragraph::plain("Hello world & all.")));
        match &blocks[2] {
            Block::Table(t) => assert_eq!(t.rows, vec![vec!["A", "B"], vec!["1", "2"]]),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn style_names_resolve_from_styles_part() {
        let xml = r#"<w:styles xmlns:w="x"><w:style w:type="paragraph" w:styleId="1"><w:name w:val="heading 1"/></w:style></w:styles>"#;
        let names = parse_style_names(xml).expect("styles");
        assert_eq!(names.get("1").map(String::as_str), Some("heading 1"));
    }

    #[test]
    fn text_paragraphs_split_on_blank_lines() {
        let blocks = read_text(b"First line\nstill first\r\n\r\n\nSecond");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(Paragraph::plain("First line\nstill first")),
                Block::Paragraph(Paragraph::plain("Second")),
            ]
        );
    }

    #[test]
    fn unknown_extension_is_a_parse_error() {
        let doc = SourceDocument::new("slides.pptx", Vec::new());
        assert!(matches!(load_blocks(&doc), Err(Error::Parse { .. })));
    }

    #[test]
    fn corrupt_docx_is_a_parse_error() {
        let doc = SourceDocument::new("broken.docx", b"not a zip".to_vec());
        assert!(matches!(load_blocks(&doc), Err(Error::Parse { .. })));
    }
}
