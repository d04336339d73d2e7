//! A4 PDF reports.
//!
//! Reports are assembled as a flat list of [`Block`]s, laid out top to bottom in fixed-size
//! lines and paginated. Every page carries the report title as header and a footer with the
//! generation time and page number. Text uses the built-in Helvetica faces with WinAnsi
//! encoding, so no font files are embedded.

pub mod portfolio;
pub mod renovation;
pub mod valuation;

pub use portfolio::{portfolio_report, write_portfolio_report};
pub use renovation::{renovation_report, write_renovation_report};
pub use valuation::{valuation_report, write_valuation_report};

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Europe::Madrid;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_X: i64 = 50;
const CONTENT_TOP: i64 = 750;
const CONTENT_BOTTOM: i64 = 70;
const VALUE_X: i64 = 250;

const BODY_SIZE: i64 = 10;
const LINE_HEIGHT: i64 = 15;
const SECTION_SIZE: i64 = 12;
const SECTION_HEIGHT: i64 = 26;
const SPACER_HEIGHT: i64 = 10;

/// Characters per line at body size; Helvetica averages roughly half an em per glyph.
const BODY_WRAP: usize = 92;
const VALUE_WRAP: usize = 55;
const BULLET_WRAP: usize = 86;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static [u8] {
        match self {
            Self::Regular => b"F1",
            Self::Bold => b"F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Section(String),
    Row { label: String, value: String },
    Paragraph(String),
    Bullet(String),
    Spacer,
}

/// One positioned run of text on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: i64,
    pub y: i64,
    pub font: Font,
    pub size: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub subtitle: Option<String>,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            blocks: Vec::new(),
        }
    }

    pub fn subtitle(&mut self, subtitle: impl Into<String>) -> &mut Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn section(&mut self, heading: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Section(heading.into()));
        self
    }

    pub fn row(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Row {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Paragraph(text.into()));
        self
    }

    pub fn bullet(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Bullet(text.into()));
        self
    }

    pub fn numbered<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self.blocks
                .push(Block::Paragraph(format!("{}. {}", i + 1, item.as_ref())));
        }
        self
    }

    pub fn spacer(&mut self) -> &mut Self {
        self.blocks.push(Block::Spacer);
        self
    }

    /// Places every block on pages. Always yields at least one page.
    pub fn layout(&self) -> Vec<Vec<TextLine>> {
        let mut cursor = LayoutCursor::new();

        for block in &self.blocks {
            match block {
                Block::Section(heading) => {
                    // Keep a heading on the same page as its first line.
                    cursor.reserve(SECTION_HEIGHT + LINE_HEIGHT);
                    cursor.y -= SECTION_HEIGHT - LINE_HEIGHT;
                    cursor.put(MARGIN_X, Font::Bold, SECTION_SIZE, heading.to_uppercase());
                }
                Block::Row { label, value } => {
                    let lines = wrap(value, VALUE_WRAP);
                    cursor.reserve(LINE_HEIGHT * lines.len() as i64);
                    let y = cursor.y;
                    cursor.put(MARGIN_X, Font::Bold, BODY_SIZE, label.clone());
                    cursor.y = y;
                    for line in lines {
                        cursor.put(VALUE_X, Font::Regular, BODY_SIZE, line);
                    }
                }
                Block::Paragraph(text) => {
                    for line in wrap(text, BODY_WRAP) {
                        cursor.reserve(LINE_HEIGHT);
                        cursor.put(MARGIN_X, Font::Regular, BODY_SIZE, line);
                    }
                }
                Block::Bullet(text) => {
                    for (i, line) in wrap(text, BULLET_WRAP).into_iter().enumerate() {
                        cursor.reserve(LINE_HEIGHT);
                        if i == 0 {
                            let y = cursor.y;
                            cursor.put(MARGIN_X + 6, Font::Regular, BODY_SIZE, "•".to_string());
                            cursor.y = y;
                        }
                        cursor.put(MARGIN_X + 18, Font::Regular, BODY_SIZE, line);
                    }
                }
                Block::Spacer => {
                    if cursor.y - SPACER_HEIGHT >= CONTENT_BOTTOM {
                        cursor.y -= SPACER_HEIGHT;
                    }
                }
            }
        }

        cursor.finish()
    }

    pub fn write_pdf(&self, path: &Path, generated_at: DateTime<Utc>) -> anyhow::Result<()> {
        let pages = self.layout();
        let total = pages.len();
        let stamp = generated_at
            .with_timezone(&Madrid)
            .format("%d/%m/%Y %H:%M")
            .to_string();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_id = doc.add_object(font_dictionary("Helvetica"));
        let bold_id = doc.add_object(font_dictionary("Helvetica-Bold"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let mut kids = Vec::with_capacity(total);
        for (index, lines) in pages.iter().enumerate() {
            let mut operations = Vec::new();
            self.push_header(&mut operations);
            for line in lines {
                push_text(&mut operations, line);
            }
            push_footer(&mut operations, &stamp, index + 1, total);

            let content = Content { operations };
            let encoded = content.encode().context("failed to encode page content")?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let page_tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(total as i64),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(page_tree));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        doc.save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::debug!(path = %path.display(), pages = total, "report written");
        Ok(())
    }

    fn push_header(&self, ops: &mut Vec<Operation>) {
        push_text(
            ops,
            &TextLine {
                x: MARGIN_X,
                y: 800,
                font: Font::Bold,
                size: 16,
                text: self.title.clone(),
            },
        );
        if let Some(subtitle) = &self.subtitle {
            push_text(
                ops,
                &TextLine {
                    x: MARGIN_X,
                    y: 784,
                    font: Font::Regular,
                    size: 9,
                    text: subtitle.clone(),
                },
            );
        }
        push_rule(ops, 772);
    }
}

struct LayoutCursor {
    pages: Vec<Vec<TextLine>>,
    current: Vec<TextLine>,
    y: i64,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: CONTENT_TOP,
        }
    }

    /// Starts a new page when `height` no longer fits above the bottom margin.
    fn reserve(&mut self, height: i64) {
        if self.y - height < CONTENT_BOTTOM && !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
            self.y = CONTENT_TOP;
        }
    }

    fn put(&mut self, x: i64, font: Font, size: i64, text: String) {
        self.current.push(TextLine {
            x,
            y: self.y,
            font,
            size,
            text,
        });
        self.y -= LINE_HEIGHT;
    }

    fn finish(mut self) -> Vec<Vec<TextLine>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn push_text(ops: &mut Vec<Operation>, line: &TextLine) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![
            Object::Name(line.font.resource_name().to_vec()),
            Object::Integer(line.size),
        ],
    ));
    ops.push(Operation::new(
        "Td",
        vec![Object::Integer(line.x), Object::Integer(line.y)],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(encode_win_ansi(&line.text))],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn push_rule(ops: &mut Vec<Operation>, y: i64) {
    ops.push(Operation::new("w", vec![Object::Integer(1)]));
    ops.push(Operation::new(
        "m",
        vec![Object::Integer(MARGIN_X), Object::Integer(y)],
    ));
    ops.push(Operation::new(
        "l",
        vec![Object::Integer(PAGE_WIDTH - MARGIN_X), Object::Integer(y)],
    ));
    ops.push(Operation::new("S", vec![]));
}

fn push_footer(ops: &mut Vec<Operation>, stamp: &str, page: usize, total: usize) {
    push_rule(ops, 50);
    push_text(
        ops,
        &TextLine {
            x: MARGIN_X,
            y: 36,
            font: Font::Regular,
            size: 8,
            text: format!("Generado el {stamp}"),
        },
    );
    push_text(
        ops,
        &TextLine {
            x: PAGE_WIDTH - MARGIN_X - 70,
            y: 36,
            font: Font::Regular,
            size: 8,
            text: format!("Página {page} de {total}"),
        },
    );
}

/// Greedy word wrap on character counts. Words longer than a line are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encodes text for a WinAnsiEncoding font. Characters outside the code page become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Whole euros with `.` thousands separators, e.g. `245.000 €`.
pub fn format_eur(value: f64) -> String {
    if !value.is_finite() {
        return "N/D".to_string();
    }
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}{grouped} €")
}

pub fn format_eur_opt(value: Option<f64>) -> String {
    value.map(format_eur).unwrap_or_else(|| "N/D".to_string())
}

/// Two decimals with a decimal comma, e.g. `6,50%`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%").replace('.', ",")
}

pub fn format_percent_opt(value: Option<f64>) -> String {
    value.map(format_percent).unwrap_or_else(|| "N/D".to_string())
}

pub fn or_not_available<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/D".to_string())
}

pub(crate) fn property_type_label(property_type: &str) -> String {
    match crate::valuation::PropertyType::parse(property_type) {
        Some(crate::valuation::PropertyType::Apartment) => "Apartamento".to_string(),
        Some(crate::valuation::PropertyType::House) => "Casa".to_string(),
        Some(crate::valuation::PropertyType::Villa) => "Villa".to_string(),
        Some(crate::valuation::PropertyType::Studio) => "Estudio".to_string(),
        None => property_type.to_string(),
    }
}

pub(crate) fn condition_label(condition: &str) -> String {
    match condition.trim().to_lowercase().as_str() {
        "excellent" => "Excelente".to_string(),
        "good" => "Bueno".to_string(),
        "fair" => "Regular".to_string(),
        "poor" => "Malo".to_string(),
        _ => condition.to_string(),
    }
}
