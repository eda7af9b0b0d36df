//! Rendering a story into downloadable formats.
//!
//! Text formats are built as strings here; the packaged formats live in
//! their own submodules and return raw bytes.

mod docx;
mod epub;
mod pdf;

use std::fmt::Write as _;
use std::io::{Cursor, Write as _};
use std::str::FromStr;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ai_response::StoryMetadata;
use crate::error::CoreError;
use crate::types::Timestamp;

/// Output formats for story export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Markdown,
    Html,
    Pdf,
    Docx,
    Epub,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Epub => "application/epub+zip",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Epub => "epub",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "md" | "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            "docx" | "word" => Ok(Self::Docx),
            "epub" => Ok(Self::Epub),
            other => Err(CoreError::Validation(format!(
                "Unsupported export format '{other}'. Must be one of: txt, md, html, pdf, docx, epub"
            ))),
        }
    }
}

/// The parts of a story that end up in an export.
#[derive(Debug, Clone, Default)]
pub struct ExportDocument {
    /// Stable identifier used by package formats (the EPUB `dc:identifier`).
    pub identifier: String,
    pub title: String,
    pub premise: Option<String>,
    /// Used when the story has no chapters.
    pub content: String,
    pub chapters: Vec<ExportChapter>,
    /// Shown on the "About This Story" page of the book formats.
    pub metadata: StoryMetadata,
    pub modified: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct ExportChapter {
    pub title: String,
    pub content: String,
}

impl ExportDocument {
    /// Chapters to render; a chapterless story becomes a single untitled one.
    fn sections(&self) -> Vec<(Option<&str>, &str)> {
        if self.chapters.is_empty() {
            vec![(None, self.content.as_str())]
        } else {
            self.chapters
                .iter()
                .map(|c| (Some(c.title.as_str()), c.content.as_str()))
                .collect()
        }
    }

    fn premise(&self) -> Option<&str> {
        self.premise.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Label/value rows of the "About This Story" page.
    fn about_fields(&self) -> [(&'static str, &str); 4] {
        let meta = &self.metadata;
        [
            ("Genre", or_unset(&meta.genre)),
            ("Theme", or_unset(&meta.theme)),
            ("Target Audience", or_unset(&meta.target_audience)),
            ("Tone", or_unset(&meta.tone)),
        ]
    }

    /// Titled lists of the "About This Story" page; empty lists are skipped.
    fn about_lists(&self) -> Vec<(&'static str, &[String])> {
        [
            ("Unique Elements", self.metadata.unique_elements.as_slice()),
            ("Key Symbols", self.metadata.key_symbols.as_slice()),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }
}

/// Render `doc` in the requested format.
pub fn render(doc: &ExportDocument, format: ExportFormat) -> Result<Vec<u8>, CoreError> {
    match format {
        ExportFormat::Txt => Ok(render_txt(doc).into_bytes()),
        ExportFormat::Markdown => Ok(render_markdown(doc).into_bytes()),
        ExportFormat::Html => Ok(render_html(doc).into_bytes()),
        ExportFormat::Pdf => pdf::render(doc),
        ExportFormat::Docx => docx::render(doc),
        ExportFormat::Epub => epub::render(doc),
    }
}

fn or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not specified"
    } else {
        value
    }
}

/// Blank-line separated paragraphs of a chapter body.
fn paragraphs(content: &str) -> impl Iterator<Item = &str> {
    content.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// One file inside a zip-based package.
struct PackageEntry {
    path: String,
    body: String,
}

impl PackageEntry {
    fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }
}

/// Zip `entries` in order. The first entry is stored uncompressed so a
/// leading `mimetype` file stays readable at a fixed offset.
fn zip_package(entries: &[PackageEntry]) -> Result<Vec<u8>, CoreError> {
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (i, entry) in entries.iter().enumerate() {
        let options = if i == 0 { stored } else { deflated };
        zip.start_file(entry.path.as_str(), options).map_err(package_error)?;
        zip.write_all(entry.body.as_bytes()).map_err(package_error)?;
    }
    let cursor = zip.finish().map_err(package_error)?;
    Ok(cursor.into_inner())
}

fn package_error(err: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(format!("Failed to build export package: {err}"))
}

fn render_txt(doc: &ExportDocument) -> String {
    let mut out = String::new();
    out.push_str(&doc.title);
    out.push('\n');
    out.push_str(&"=".repeat(doc.title.chars().count()));
    out.push_str("\n\n");
    if let Some(premise) = doc.premise() {
        out.push_str(premise);
        out.push_str("\n\n");
    }
    for (title, content) in doc.sections() {
        if let Some(title) = title {
            out.push_str(title);
            out.push('\n');
            out.push_str(&"-".repeat(title.chars().count()));
            out.push_str("\n\n");
        }
        out.push_str(content.trim());
        out.push_str("\n\n");
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn render_markdown(doc: &ExportDocument) -> String {
    let mut out = format!("# {}\n\n", doc.title);
    if let Some(premise) = doc.premise() {
        let _ = write!(out, "> {premise}\n\n");
    }
    for (title, content) in doc.sections() {
        if let Some(title) = title {
            let _ = write!(out, "## {title}\n\n");
        }
        out.push_str(content.trim());
        out.push_str("\n\n");
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn render_html(doc: &ExportDocument) -> String {
    let title = escape_html(&doc.title);
    let mut out = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );
    if let Some(premise) = doc.premise() {
        let _ = writeln!(out, "<p class=\"premise\"><em>{}</em></p>", escape_html(premise));
    }
    for (heading, content) in doc.sections() {
        if let Some(heading) = heading {
            let _ = writeln!(out, "<h2>{}</h2>", escape_html(heading));
        }
        for paragraph in paragraphs(content) {
            let _ = writeln!(out, "<p>{}</p>", escape_html(paragraph));
        }
    }
    out.push_str("</body>\n</html>\n");
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// File name for the download, derived from the title.
pub fn file_name(title: &str, format: ExportFormat) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "story".to_string() } else { slug };
    format!("{slug}.{}", format.extension())
}
