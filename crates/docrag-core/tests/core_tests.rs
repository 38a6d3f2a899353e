use std::fs;
use std::io::{Cursor, Write};
use tempfile::TempDir;

use docrag_core::config::{ChunkingConfig, Config, ParserConfig};
use docrag_core::chunker::Chunker;
use docrag_core::parser::DocumentParser;
use docrag_core::source::DirectorySource;
use docrag_core::traits::DocumentSource;
use docrag_core::types::SourceDocument;

fn docx_bytes(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let styles = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
</w:styles>"#;
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("word/document.xml", opts).unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    zip.start_file("word/styles.xml", opts).unwrap();
    zip.write_all(styles.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text)
}

fn heading(text: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#, text)
}

#[test]
fn docx_parses_into_sections_and_chunks() {
    let body = [
        heading("Leave policy"),
        para("Employees receive twenty days of paid leave per year. See table below:"),
        "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Years</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Days</w:t></w:r></w:p></w:tc></w:tr>\
         <w:tr><w:tc><w:p><w:r><w:t>0-5</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>20</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"
            .to_string(),
        para("Άρθρο 5"),
        para("Requests are submitted through the staff portal at least one week ahead."),
    ]
    .concat();
    let doc = SourceDocument::new("policies/leave.docx", docx_bytes(&body));

    let parser = DocumentParser::from_config(&ParserConfig::default()).expect("parser");
    let parsed = parser.parse(&doc).expect("parse");
    assert_eq!(parsed.filename, "policies/leave.docx");
    assert_eq!(parsed.content_hash, doc.content_hash());
    assert_eq!(parsed.sections.len(), 2);
    assert_eq!(parsed.sections[0].title.as_deref(), Some("Leave policy"));
    assert_eq!(parsed.sections[0].tables.len(), 1);
    assert_eq!(parsed.sections[1].title.as_deref(), Some("Άρθρο 5"));

    let chunker = Chunker::new(ChunkingConfig::default()).expect("chunker");
    let chunks = chunker.chunk_sections(&parsed.filename, &parsed.sections);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].text.contains("See table below:\n\n[[TABLE]]\nYears | Days\n0-5 | 20\n[[/TABLE]]"));
    assert_eq!(chunks[1].section_index, 1);
    assert_eq!(chunks[1].section_title.as_deref(), Some("Άρθρο 5"));
}

#[test]
fn directory_source_lists_supported_files_sorted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("sub/a.txt"), "alpha").unwrap();
    fs::write(dir.join("~$lock.docx"), "x").unwrap();
    fs::write(dir.join("image.png"), "x").unwrap();

    let docs = DirectorySource::new(dir).documents().expect("documents");
    let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
    assert_eq!(names, vec!["b.txt", "sub/a.txt"]);
    assert_eq!(docs[0].bytes, b"bravo");
}

#[test]
fn missing_directory_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(DirectorySource::new(tmp.path().join("nope")).documents().is_err());
}

#[test]
fn config_merges_toml_over_defaults_and_resolves_paths() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[paths]\ndocs_dir = \"docs\"\n\n[chunking]\nmax_words = 120\noverlap_words = 20\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\ntop_k = 3\n").unwrap();

    let config = Config::load_from(tmp.path(), "test").expect("config");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.chunking.max_words, 120);
    assert_eq!(settings.chunking.overlap_words, 20);
    assert_eq!(settings.chunking.min_words, 5);
    assert_eq!(settings.retrieval.top_k, 3);
    assert_eq!(settings.retrieval.max_answer_chars, 4000);
    assert_eq!(settings.paths.docs_dir, tmp.path().join("docs"));
    assert_eq!(config.get::<usize>("chunking.max_words").unwrap(), 120);
}

#[test]
fn config_rejects_overlap_not_below_max() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[chunking]\nmax_words = 50\noverlap_words = 50\n").unwrap();
    assert!(Config::load_from(tmp.path(), "test").is_err());
}
