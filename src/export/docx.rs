// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Minimal WordprocessingML (.docx) writer
//!
//! A DOCX file is a zip package; only the parts Word needs to open a document
//! with headings, paragraphs and bordered tables are written.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::tables::MarkdownTable;
use crate::Result;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

/// Body content of a document, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    Table(MarkdownTable),
}

/// Write `blocks` as a .docx package at `path`
pub fn write_docx(path: &Path, blocks: &[Block]) -> Result<()> {
    let document = render_document(blocks)?;

    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("word/styles.xml", STYLES.as_bytes()),
        ("word/document.xml", &document),
    ];

    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content)?;
    }

    zip.finish()?;
    Ok(())
}

/// Render `word/document.xml`
fn render_document(blocks: &[Block]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(BytesStart::new("w:document").with_attributes([("xmlns:w", W_NS)])))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    for block in blocks {
        match block {
            Block::Heading(text) => write_paragraph(&mut writer, Some("Heading1"), text, false)?,
            Block::Paragraph(text) => write_paragraph(&mut writer, None, text, false)?,
            Block::Table(table) => {
                write_table(&mut writer, table)?;
                // Word needs a paragraph between adjacent tables and before the section end
                write_paragraph(&mut writer, None, "", false)?;
            }
        }
    }

    writer.write_event(Event::Start(BytesStart::new("w:sectPr")))?;
    writer.write_event(Event::Empty(
        BytesStart::new("w:pgSz").with_attributes([("w:w", "11906"), ("w:h", "16838")]),
    ))?;
    writer.write_event(Event::Empty(BytesStart::new("w:pgMar").with_attributes([
        ("w:top", "1440"),
        ("w:right", "1440"),
        ("w:bottom", "1440"),
        ("w:left", "1440"),
        ("w:header", "708"),
        ("w:footer", "708"),
        ("w:gutter", "0"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("w:sectPr")))?;

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    Ok(writer.into_inner())
}

/// Characters XML 1.0 cannot carry
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\t' || *c == '\n' || !c.is_control())
        .collect()
}

fn write_paragraph(writer: &mut Writer<Vec<u8>>, style: Option<&str>, text: &str, bold: bool) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;

    if let Some(style) = style {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        writer.write_event(Event::Empty(BytesStart::new("w:pStyle").with_attributes([("w:val", style)])))?;
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }

    let text = sanitize(text);
    if !text.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("w:r")))?;
        if bold {
            writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
            writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
            writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        }
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                writer.write_event(Event::Empty(BytesStart::new("w:br")))?;
            }
            writer.write_event(Event::Start(
                BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
            ))?;
            writer.write_event(Event::Text(BytesText::new(line)))?;
            writer.write_event(Event::End(BytesEnd::new("w:t")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_table(writer: &mut Writer<Vec<u8>>, table: &MarkdownTable) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:tbl")))?;

    writer.write_event(Event::Start(BytesStart::new("w:tblPr")))?;
    writer.write_event(Event::Empty(BytesStart::new("w:tblStyle").with_attributes([("w:val", "TableGrid")])))?;
    writer.write_event(Event::Empty(
        BytesStart::new("w:tblW").with_attributes([("w:w", "0"), ("w:type", "auto")]),
    ))?;
    writer.write_event(Event::End(BytesEnd::new("w:tblPr")))?;

    writer.write_event(Event::Start(BytesStart::new("w:tblGrid")))?;
    for _ in 0..table.columns() {
        writer.write_event(Event::Empty(BytesStart::new("w:gridCol")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:tblGrid")))?;

    write_row(writer, &table.headers, true)?;
    for row in &table.rows {
        write_row(writer, row, false)?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:tbl")))?;
    Ok(())
}

fn write_row(writer: &mut Writer<Vec<u8>>, cells: &[String], header: bool) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:tr")))?;
    for cell in cells {
        writer.write_event(Event::Start(BytesStart::new("w:tc")))?;
        write_paragraph(writer, None, cell, header)?;
        writer.write_event(Event::End(BytesEnd::new("w:tc")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:tr")))?;
    Ok(())
}
