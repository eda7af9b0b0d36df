//! PDF export on US Letter pages with the built-in Helvetica faces.
//!
//! Layout is computed up front as positioned lines per page; drawing only
//! replays it. Built-in fonts carry no glyph metrics here, so wrapping uses
//! an average character width.

use printpdf::{BuiltinFont, Mm, PdfDocument};

use super::{paragraphs, ExportDocument};
use crate::error::CoreError;

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.0;
const PT_TO_MM: f32 = 0.3528;
const LINE_SPACING: f32 = 1.4;
/// Average Helvetica advance as a fraction of the font size.
const CHAR_WIDTH_EM: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy)]
struct Style {
    face: Face,
    size: f32,
    centered: bool,
    /// Space before the block, in mm.
    space_before: f32,
}

const TITLE: Style = Style {
    face: Face::Bold,
    size: 24.0,
    centered: true,
    space_before: 60.0,
};
const PREMISE: Style = Style {
    face: Face::Italic,
    size: 12.0,
    centered: true,
    space_before: 10.0,
};
const HEADING: Style = Style {
    face: Face::Bold,
    size: 16.0,
    centered: false,
    space_before: 0.0,
};
const SUBHEADING: Style = Style {
    face: Face::Bold,
    size: 13.0,
    centered: false,
    space_before: 6.0,
};
const BODY: Style = Style {
    face: Face::Regular,
    size: 11.0,
    centered: false,
    space_before: 4.0,
};

/// A positioned line of text. Coordinates are mm from the bottom-left.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    face: Face,
    size: f32,
    x: f32,
    y: f32,
}

pub(super) fn render(doc: &ExportDocument) -> Result<Vec<u8>, CoreError> {
    let pages = layout(doc);

    let (pdf, first_page, first_layer) =
        PdfDocument::new(doc.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;
    let italic = pdf
        .add_builtin_font(BuiltinFont::HelveticaOblique)
        .map_err(pdf_error)?;

    for (i, lines) in pages.iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            pdf.get_page(page).get_layer(layer)
        };
        for line in lines {
            let font = match line.face {
                Face::Regular => &regular,
                Face::Bold => &bold,
                Face::Italic => &italic,
            };
            layer.use_text(line.text.as_str(), line.size, Mm(line.x), Mm(line.y), font);
        }
    }

    pdf.save_to_bytes().map_err(pdf_error)
}

fn pdf_error(err: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(format!("Failed to build PDF: {err}"))
}

fn layout(doc: &ExportDocument) -> Vec<Vec<Line>> {
    let mut layout = Layout::new();
    layout.block(&doc.title, TITLE);
    if let Some(premise) = doc.premise() {
        layout.block(premise, PREMISE);
    }

    for (i, (heading, content)) in doc.sections().into_iter().enumerate() {
        layout.new_page();
        match heading {
            Some(heading) => layout.block(heading, HEADING),
            None => layout.block(&format!("Chapter {}", i + 1), HEADING),
        }
        for paragraph in paragraphs(content) {
            layout.block(paragraph, BODY);
        }
    }

    layout.new_page();
    layout.block("About This Story", HEADING);
    for (label, value) in doc.about_fields() {
        layout.block(&format!("{label}: {value}"), BODY);
    }
    for (label, items) in doc.about_lists() {
        layout.block(label, SUBHEADING);
        for item in items {
            layout.block(&format!("- {item}"), BODY);
        }
    }
    layout.finish()
}

struct Layout {
    pages: Vec<Vec<Line>>,
    current: Vec<Line>,
    /// Baseline of the last placed line, in mm from the bottom.
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn block(&mut self, text: &str, style: Style) {
        if !self.current.is_empty() {
            self.cursor -= style.space_before;
        } else if style.centered {
            // Title pages start lower down.
            self.cursor -= style.space_before;
        }

        let height = style.size * LINE_SPACING * PT_TO_MM;
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        let max_chars = (width / char_width(style.size)).floor().max(1.0) as usize;

        for source_line in text.lines() {
            for line in wrap(&sanitize(source_line), max_chars) {
                if self.cursor - height < MARGIN {
                    self.new_page();
                }
                self.cursor -= height;
                let x = if style.centered {
                    let used = line.chars().count() as f32 * char_width(style.size);
                    MARGIN + ((width - used) / 2.0).max(0.0)
                } else {
                    MARGIN
                };
                self.current.push(Line {
                    text: line,
                    face: style.face,
                    size: style.size,
                    x,
                    y: self.cursor,
                });
            }
        }
    }

    fn finish(mut self) -> Vec<Vec<Line>> {
        self.new_page();
        self.pages
    }
}

fn char_width(size: f32) -> f32 {
    size * CHAR_WIDTH_EM * PT_TO_MM
}

/// Greedy word wrap by character count. Words longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > max_chars && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// The built-in fonts only cover ASCII reliably: typographic punctuation is
/// folded to its ASCII form and anything else becomes `?`.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' => out.push('-'),
            '\t' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
