//! Word (OOXML) export. The package carries the minimum parts Word needs:
//! content types, the package relationship, styles and the document body.

use std::fmt::Write as _;

use super::{escape_html, paragraphs, zip_package, ExportDocument, PackageEntry};
use crate::error::CoreError;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>
"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>
"#;

// Sizes are half-points.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:pPr><w:spacing w:after="160" w:line="360" w:lineRule="auto"/></w:pPr>
    <w:rPr><w:rFonts w:ascii="Georgia" w:hAnsi="Georgia"/><w:sz w:val="24"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Title">
    <w:name w:val="Title"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:jc w:val="center"/><w:spacing w:before="2400" w:after="480"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="56"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:keepNext/><w:spacing w:before="480" w:after="240"/><w:outlineLvl w:val="0"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="36"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading2">
    <w:name w:val="heading 2"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="1"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="28"/></w:rPr>
  </w:style>
</w:styles>
"#;

pub(super) fn render(doc: &ExportDocument) -> Result<Vec<u8>, CoreError> {
    zip_package(&[
        PackageEntry::new("[Content_Types].xml", CONTENT_TYPES),
        PackageEntry::new("_rels/.rels", PACKAGE_RELS),
        PackageEntry::new("word/_rels/document.xml.rels", DOCUMENT_RELS),
        PackageEntry::new("word/styles.xml", STYLES),
        PackageEntry::new("word/document.xml", document(doc)),
    ])
}

fn document(doc: &ExportDocument) -> String {
    let mut body = Body::default();
    body.styled("Title", &doc.title);
    if let Some(premise) = doc.premise() {
        body.italic_centered(premise);
    }

    for (i, (heading, content)) in doc.sections().into_iter().enumerate() {
        body.page_break();
        match heading {
            Some(heading) => body.styled("Heading1", heading),
            None => body.styled("Heading1", &format!("Chapter {}", i + 1)),
        }
        for paragraph in paragraphs(content) {
            body.plain(paragraph);
        }
    }

    body.page_break();
    body.styled("Heading1", "About This Story");
    for (label, value) in doc.about_fields() {
        body.labelled(label, value);
    }
    for (label, items) in doc.about_lists() {
        body.styled("Heading2", label);
        for item in items {
            body.plain(&format!("\u{2022} {item}"));
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
{}    <w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>
  </w:body>
</w:document>
"#,
        body.xml
    )
}

/// Accumulates `<w:p>` elements.
#[derive(Default)]
struct Body {
    xml: String,
}

impl Body {
    fn styled(&mut self, style: &str, text: &str) {
        let _ = writeln!(
            self.xml,
            r#"    <w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr>{}</w:p>"#,
            run(text, "")
        );
    }

    fn plain(&mut self, text: &str) {
        let _ = writeln!(self.xml, "    <w:p>{}</w:p>", run(text, ""));
    }

    fn italic_centered(&mut self, text: &str) {
        let _ = writeln!(
            self.xml,
            r#"    <w:p><w:pPr><w:jc w:val="center"/></w:pPr>{}</w:p>"#,
            run(text, "<w:i/>")
        );
    }

    fn labelled(&mut self, label: &str, value: &str) {
        let _ = writeln!(
            self.xml,
            "    <w:p>{}{}</w:p>",
            run(&format!("{label}: "), "<w:b/>"),
            run(value, "")
        );
    }

    fn page_break(&mut self) {
        self.xml
            .push_str("    <w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>\n");
    }
}

/// One text run. Line breaks inside a paragraph become `<w:br/>`.
fn run(text: &str, properties: &str) -> String {
    let props = if properties.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{properties}</w:rPr>")
    };
    let lines: Vec<String> = text
        .lines()
        .map(|line| format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape_html(line)))
        .collect();
    format!("<w:r>{props}{}</w:r>", lines.join("<w:br/>"))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use zip::ZipArchive;

    use super::super::tests::doc;
    use super::*;

    fn document_xml(bytes: Vec<u8>) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name("word/document.xml").unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn package_has_the_required_parts() {
        let bytes = render(&doc()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in ["[Content_Types].xml", "_rels/.rels", "word/document.xml", "word/styles.xml"] {
            assert!(names.contains(&part), "missing {part}");
        }
    }

    #[test]
    fn chapters_become_headings_after_page_breaks() {
        let xml = document_xml(render(&doc()).unwrap());
        assert!(xml.contains(r#"<w:pStyle w:val="Title"/></w:pPr><w:r><w:t xml:space="preserve">The Letter</w:t>"#));
        assert!(xml.contains(r#"<w:br w:type="page"/></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">Chapter 2</w:t>"#));
        assert!(xml.contains("Then &lt;wept&gt;."));
        assert!(xml.contains("grandmother&#39;s secret."));
    }

    #[test]
    fn about_section_is_appended() {
        let xml = document_xml(render(&doc()).unwrap());
        assert!(xml.contains("About This Story"));
        assert!(xml.contains(r#"<w:b/></w:rPr><w:t xml:space="preserve">Genre: </w:t></w:r><w:r><w:t xml:space="preserve">Mystery</w:t>"#));
        assert!(xml.contains("\u{2022} A coded letter"));
    }

    #[test]
    fn line_breaks_inside_a_paragraph_are_kept() {
        assert_eq!(
            run("a\nb", ""),
            r#"<w:r><w:t xml:space="preserve">a</w:t><w:br/><w:t xml:space="preserve">b</w:t></w:r>"#
        );
    }
}
