//! EPUB 3 packaging: one XHTML file per chapter plus a title page, an
//! "About This Story" page and the navigation document.

use std::fmt::Write as _;

use super::{escape_html, paragraphs, zip_package, ExportDocument, PackageEntry};
use crate::error::CoreError;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLESHEET: &str = "body { font-family: Georgia, serif; line-height: 1.6; margin: 1em; }
h1 { text-align: center; margin-top: 2em; }
h2 { margin-top: 1.5em; }
p { text-indent: 1.5em; margin: 0 0 0.5em 0; }
.premise { font-style: italic; text-align: center; text-indent: 0; }
";

pub(super) fn render(doc: &ExportDocument) -> Result<Vec<u8>, CoreError> {
    let sections = doc.sections();
    let mut entries = vec![
        PackageEntry::new("mimetype", "application/epub+zip"),
        PackageEntry::new("META-INF/container.xml", CONTAINER_XML),
        PackageEntry::new("OEBPS/content.opf", package_document(doc, sections.len())),
        PackageEntry::new("OEBPS/nav.xhtml", navigation(doc)),
        PackageEntry::new("OEBPS/style.css", STYLESHEET),
        PackageEntry::new("OEBPS/title.xhtml", title_page(doc)),
        PackageEntry::new("OEBPS/about.xhtml", about_page(doc)),
    ];
    for (i, (heading, content)) in sections.iter().enumerate() {
        let heading = heading
            .map(str::to_string)
            .unwrap_or_else(|| format!("Chapter {}", i + 1));
        entries.push(PackageEntry::new(
            format!("OEBPS/chapter_{}.xhtml", i + 1),
            chapter_page(&heading, content),
        ));
    }
    zip_package(&entries)
}

fn package_document(doc: &ExportDocument, chapters: usize) -> String {
    let mut manifest = String::new();
    let mut spine = String::new();
    for n in 1..=chapters {
        let _ = writeln!(
            manifest,
            r#"    <item id="chapter_{n}" href="chapter_{n}.xhtml" media-type="application/xhtml+xml"/>"#
        );
        let _ = writeln!(spine, r#"    <itemref idref="chapter_{n}"/>"#);
    }
    let subject = if doc.metadata.genre.trim().is_empty() {
        String::new()
    } else {
        format!(
            "    <dc:subject>{}</dc:subject>\n",
            escape_html(&doc.metadata.genre)
        )
    };
    let description = doc
        .premise()
        .map(|p| format!("    <dc:description>{}</dc:description>\n", escape_html(p)))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id" xml:lang="en">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">urn:storyforge:{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>en</dc:language>
    <dc:creator>StoryForge AI</dc:creator>
{subject}{description}    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="style" href="style.css" media-type="text/css"/>
    <item id="title" href="title.xhtml" media-type="application/xhtml+xml"/>
{manifest}    <item id="about" href="about.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="title"/>
{spine}    <itemref idref="about"/>
  </spine>
</package>
"#,
        identifier = escape_html(&doc.identifier),
        title = escape_html(&doc.title),
        modified = doc.modified.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

fn navigation(doc: &ExportDocument) -> String {
    let mut items = String::from("      <li><a href=\"title.xhtml\">Title Page</a></li>\n");
    for (i, (heading, _)) in doc.sections().iter().enumerate() {
        let label = heading
            .map(escape_html)
            .unwrap_or_else(|| format!("Chapter {}", i + 1));
        let _ = writeln!(
            items,
            "      <li><a href=\"chapter_{}.xhtml\">{label}</a></li>",
            i + 1
        );
    }
    items.push_str("      <li><a href=\"about.xhtml\">About This Story</a></li>\n");
    xhtml(
        "Contents",
        &format!("<nav epub:type=\"toc\" id=\"toc\">\n    <h1>Contents</h1>\n    <ol>\n{items}    </ol>\n  </nav>"),
    )
}

fn title_page(doc: &ExportDocument) -> String {
    let mut body = format!("<h1>{}</h1>", escape_html(&doc.title));
    if let Some(premise) = doc.premise() {
        let _ = write!(body, "\n  <p class=\"premise\">{}</p>", escape_html(premise));
    }
    xhtml(&doc.title, &body)
}

fn chapter_page(heading: &str, content: &str) -> String {
    let mut body = format!("<h2>{}</h2>", escape_html(heading));
    for paragraph in paragraphs(content) {
        let _ = write!(body, "\n  <p>{}</p>", escape_html(paragraph));
    }
    xhtml(heading, &body)
}

fn about_page(doc: &ExportDocument) -> String {
    let mut body = String::from("<h2>About This Story</h2>");
    for (label, value) in doc.about_fields() {
        let _ = write!(
            body,
            "\n  <p><strong>{label}:</strong> {}</p>",
            escape_html(value)
        );
    }
    for (label, items) in doc.about_lists() {
        let _ = write!(body, "\n  <h3>{label}</h3>\n  <ul>");
        for item in items {
            let _ = write!(body, "\n    <li>{}</li>", escape_html(item));
        }
        body.push_str("\n  </ul>");
    }
    xhtml("About This Story", &body)
}

fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en" xml:lang="en">
<head>
  <title>{}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>
<body>
  {body}
</body>
</html>
"#,
        escape_html(title)
    )
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use zip::ZipArchive;

    use super::super::tests::doc;
    use super::*;

    fn entry(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn mimetype_comes_first() {
        let bytes = render(&doc()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
        assert_eq!(entry(&bytes, "mimetype"), "application/epub+zip");
    }

    #[test]
    fn every_chapter_is_in_the_manifest_and_spine() {
        let bytes = render(&doc()).unwrap();
        let opf = entry(&bytes, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>The Letter</dc:title>"));
        assert!(opf.contains("<dc:subject>Mystery</dc:subject>"));
        assert!(opf.contains(r#"<itemref idref="chapter_2"/>"#));
        assert!(opf.contains("urn:storyforge:story-7"));

        let chapter = entry(&bytes, "OEBPS/chapter_2.xhtml");
        assert!(chapter.contains("<h2>Chapter 2</h2>"));
        assert!(chapter.contains("<p>Then &lt;wept&gt;.</p>"));
    }

    #[test]
    fn about_page_lists_metadata() {
        let bytes = render(&doc()).unwrap();
        let about = entry(&bytes, "OEBPS/about.xhtml");
        assert!(about.contains("<strong>Genre:</strong> Mystery"));
        assert!(about.contains("<strong>Tone:</strong> Not specified"));
        assert!(about.contains("<li>A coded letter</li>"));
        assert!(!about.contains("Key Symbols"));
    }

    #[test]
    fn chapterless_story_gets_one_chapter() {
        let d = ExportDocument {
            title: "T".into(),
            content: "Body.".into(),
            ..Default::default()
        };
        let bytes = render(&d).unwrap();
        assert!(entry(&bytes, "OEBPS/chapter_1.xhtml").contains("<h2>Chapter 1</h2>"));
        assert!(entry(&bytes, "OEBPS/nav.xhtml").contains("chapter_1.xhtml"));
    }
}
