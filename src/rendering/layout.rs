//! Block layout for the software capture backend
//!
//! Lays the normalized HTML out as a vertical stack of blocks. Words are
//! measured with the session's [`FontSet`] (glyph advances, no kerning or
//! shaping) and filled greedily into lines. Without a face for a run, a word
//! is sized from its character count instead.

use crate::color::Rgb;
use crate::rendering::fonts::{FaceKind, FontSet};
use crate::surface::{style_property, NormalizedSurface};
use scraper::{ElementRef, Html, Node};

const BASE_FONT_PX: f32 = 16.0;
const LINE_HEIGHT: f32 = 1.6;
const CHAR_WIDTH_EM: f32 = 0.5;
const CODE_CHAR_WIDTH_EM: f32 = 0.6;
const LIST_INDENT_PX: f32 = 24.0;
const QUOTE_INDENT_PX: f32 = 16.0;
const QUOTE_BAR_PX: f32 = 4.0;
const CELL_PADDING_PX: f32 = 6.0;
const HEADING_SIZES: [f32; 6] = [32.0, 24.0, 20.0, 18.0, 16.0, 14.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Heading(u8),
    Paragraph,
    ListItem,
    CodeBlock,
    Quote,
    TableCell,
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Plain,
    Strong,
    Emphasis,
    Code,
    Link,
    Strike,
}

impl RunKind {
    pub fn face(self) -> FaceKind {
        match self {
            RunKind::Strong => FaceKind::Bold,
            RunKind::Emphasis => FaceKind::Italic,
            RunKind::Code => FaceKind::Mono,
            RunKind::Plain | RunKind::Link | RunKind::Strike => FaceKind::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Bullet,
    Checkbox { checked: bool },
}

/// One word (or code fragment) on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Word box spanning the full line height
    pub rect: Rect,
    pub text: String,
    pub font_px: f32,
    /// Baseline of the glyphs, in surface coordinates
    pub baseline: f32,
    pub kind: RunKind,
    pub color: Option<Rgb>,
    pub background: Option<Rgb>,
    /// Horizontal inset of the glyphs inside `rect`
    pub inset: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub elem_type: ElementType,
    pub background: Option<Rgb>,
    pub foreground: Option<Rgb>,
    pub runs: Vec<TextRun>,
    pub marker: Option<Marker>,
}

impl LayoutNode {
    fn block(rect: Rect, elem_type: ElementType) -> Self {
        Self {
            rect,
            elem_type,
            background: None,
            foreground: None,
            runs: Vec::new(),
            marker: None,
        }
    }
}

/// Laid-out surface in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct InlineStyle {
    kind: RunKind,
    color: Option<Rgb>,
    background: Option<Rgb>,
}

impl InlineStyle {
    const PLAIN: InlineStyle = InlineStyle {
        kind: RunKind::Plain,
        color: None,
        background: None,
    };
}

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Text { text: String, style: InlineStyle },
    Break,
}

struct LayoutEngine<'a> {
    fonts: &'a FontSet,
    nodes: Vec<LayoutNode>,
    y: f32,
}

/// Lay out the surface at its configured width.
///
/// The height is the content height plus the surface padding, never less than
/// the surface's minimum height.
pub fn layout_document(surface: &NormalizedSurface, fonts: &FontSet) -> DocumentLayout {
    let style = surface.style();
    let document = Html::parse_fragment(surface.fragment());
    let pad = style.padding_px as f32;
    let content_width = (style.width_px as f32 - 2.0 * pad).max(1.0);

    let mut engine = LayoutEngine {
        fonts,
        nodes: Vec::new(),
        y: pad,
    };
    engine.layout_children(document.root_element(), pad, content_width);

    let height = (engine.y + pad).ceil().max(style.min_height_px as f32) as u32;
    DocumentLayout {
        width: style.width_px,
        height,
        nodes: engine.nodes,
    }
}

impl LayoutEngine<'_> {
    fn layout_children(&mut self, parent: ElementRef, x: f32, width: f32) {
        let mut pending = Vec::new();
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => push_words(text, InlineStyle::PLAIN, &mut pending),
                Node::Element(_) => {
                    let Some(el) = ElementRef::wrap(child) else { continue };
                    if is_block(el.value().name()) {
                        self.flush_paragraph(&mut pending, x, width);
                        self.layout_block(el, x, width);
                    } else {
                        collect_inline(el, InlineStyle::PLAIN, &mut pending);
                    }
                }
                _ => {}
            }
        }
        self.flush_paragraph(&mut pending, x, width);
    }

    fn layout_block(&mut self, el: ElementRef, x: f32, width: f32) {
        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1).clamp(1, 6);
                let font = HEADING_SIZES[level as usize - 1];
                let words = inline_words(el, InlineStyle { kind: RunKind::Strong, ..InlineStyle::PLAIN });
                self.text_block(&words, x, width, font, ElementType::Heading(level));
            }
            "p" => {
                let words = inline_words(el, InlineStyle::PLAIN);
                self.text_block(&words, x, width, BASE_FONT_PX, ElementType::Paragraph);
            }
            "ul" | "ol" => self.layout_list(el, x, width),
            "pre" => self.layout_code_block(el, x, width),
            "blockquote" => {
                let top = self.y;
                self.layout_children(el, x + QUOTE_INDENT_PX, width - QUOTE_INDENT_PX);
                let rect = Rect {
                    x,
                    y: top,
                    width: QUOTE_BAR_PX,
                    height: (self.y - top - gap_after(BASE_FONT_PX)).max(0.0),
                };
                self.nodes.push(LayoutNode::block(rect, ElementType::Quote));
            }
            "table" => self.layout_table(el, x, width),
            "hr" => {
                let rect = Rect { x, y: self.y + 8.0, width, height: 1.0 };
                self.nodes.push(LayoutNode::block(rect, ElementType::Rule));
                self.y += 17.0 + gap_after(BASE_FONT_PX);
            }
            _ => self.layout_children(el, x, width),
        }
    }

    fn flush_paragraph(&mut self, pending: &mut Vec<Word>, x: f32, width: f32) {
        if pending.iter().any(|w| matches!(w, Word::Text { .. })) {
            let words = std::mem::take(pending);
            self.text_block(&words, x, width, BASE_FONT_PX, ElementType::Paragraph);
        }
        pending.clear();
    }

    fn text_block(&mut self, words: &[Word], x: f32, width: f32, font: f32, elem_type: ElementType) {
        if words.is_empty() {
            return;
        }
        let top = self.y;
        let (runs, height) = flow_words(self.fonts, words, x, top, width, font);
        let mut node = LayoutNode::block(Rect { x, y: top, width, height }, elem_type);
        node.runs = runs;
        self.nodes.push(node);
        self.y = top + height + gap_after(font);
    }

    fn layout_list(&mut self, list: ElementRef, x: f32, width: f32) {
        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                continue;
            }
            let top = self.y;
            let line_h = BASE_FONT_PX * LINE_HEIGHT;
            let marker = match checkbox_state(item) {
                Some(checked) => Marker::Checkbox { checked },
                None => Marker::Bullet,
            };
            let size = match marker {
                Marker::Bullet => 6.0,
                Marker::Checkbox { .. } => 12.0,
            };
            let mut node = LayoutNode::block(
                Rect {
                    x: x + (LIST_INDENT_PX - size) / 2.0 - 4.0,
                    y: top + (line_h - size) / 2.0,
                    width: size,
                    height: size,
                },
                ElementType::ListItem,
            );
            node.marker = Some(marker);
            self.nodes.push(node);

            self.layout_children(item, x + LIST_INDENT_PX, width - LIST_INDENT_PX);
            if self.y < top + line_h {
                self.y = top + line_h;
            }
        }
        self.y += gap_after(BASE_FONT_PX) / 2.0;
    }

    fn layout_code_block(&mut self, pre: ElementRef, x: f32, width: f32) {
        let style = pre.value().attr("style").unwrap_or("");
        let background = style_property(style, "background-color").and_then(Rgb::parse_hex);
        let foreground = style_property(style, "color").and_then(Rgb::parse_hex);
        let padding = style_property(style, "padding")
            .and_then(|p| p.trim_end_matches("px").trim().parse::<f32>().ok())
            .unwrap_or(12.0);

        let font = BASE_FONT_PX * 0.875;
        let line_h = font * LINE_HEIGHT;
        let char_w = self
            .fonts
            .advance(FaceKind::Mono, "0", font)
            .filter(|w| *w > 0.0)
            .unwrap_or(font * CODE_CHAR_WIDTH_EM);
        let inner_w = (width - 2.0 * padding).max(char_w);
        let columns = ((inner_w / char_w).floor() as usize).max(1);

        let text: String = pre.text().collect();
        let top = self.y;
        let mut runs = Vec::new();
        let mut row = 0usize;
        for line in text.trim_end_matches('\n').split('\n') {
            let chars: Vec<char> = line.chars().collect();
            let mut col = 0usize;
            while col < chars.len() {
                if chars[col].is_whitespace() {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < chars.len() && !chars[col].is_whitespace() {
                    col += 1;
                }
                // pre-wrap: continue a long token on the next visual row
                let mut from = start;
                while from < col {
                    let line_col = from % columns;
                    let take = (columns - line_col).min(col - from);
                    let visual_row = row + from / columns;
                    let line_top = top + padding + visual_row as f32 * line_h;
                    runs.push(TextRun {
                        rect: Rect {
                            x: x + padding + line_col as f32 * char_w,
                            y: line_top,
                            width: take as f32 * char_w,
                            height: line_h,
                        },
                        text: chars[from..from + take].iter().collect(),
                        font_px: font,
                        baseline: baseline(self.fonts, FaceKind::Mono, font, line_top, line_h),
                        kind: RunKind::Code,
                        color: foreground,
                        background: None,
                        inset: 0.0,
                    });
                    from += take;
                }
            }
            row += chars.len().max(1).div_ceil(columns);
        }

        let height = row as f32 * line_h + 2.0 * padding;
        let mut node = LayoutNode::block(Rect { x, y: top, width, height }, ElementType::CodeBlock);
        node.background = background;
        node.foreground = foreground;
        node.runs = runs;
        self.nodes.push(node);
        self.y = top + height + gap_after(BASE_FONT_PX);
    }

    fn layout_table(&mut self, table: ElementRef, x: f32, width: f32) {
        let rows: Vec<ElementRef> = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
            .collect();
        let columns = rows
            .iter()
            .map(|r| cells(*r).len())
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return;
        }
        let cell_w = width / columns as f32;

        for row in rows {
            let top = self.y;
            let mut row_nodes = Vec::new();
            let mut row_h = BASE_FONT_PX * LINE_HEIGHT + 2.0 * CELL_PADDING_PX;
            for (i, cell) in cells(row).into_iter().enumerate() {
                let base = if cell.value().name() == "th" {
                    InlineStyle { kind: RunKind::Strong, ..InlineStyle::PLAIN }
                } else {
                    InlineStyle::PLAIN
                };
                let words = inline_words(cell, base);
                let cx = x + i as f32 * cell_w;
                let (runs, h) = flow_words(
                    self.fonts,
                    &words,
                    cx + CELL_PADDING_PX,
                    top + CELL_PADDING_PX,
                    cell_w - 2.0 * CELL_PADDING_PX,
                    BASE_FONT_PX,
                );
                row_h = row_h.max(h + 2.0 * CELL_PADDING_PX);
                let mut node = LayoutNode::block(
                    Rect { x: cx, y: top, width: cell_w, height: 0.0 },
                    ElementType::TableCell,
                );
                node.runs = runs;
                row_nodes.push(node);
            }
            for mut node in row_nodes {
                node.rect.height = row_h;
                self.nodes.push(node);
            }
            self.y = top + row_h;
        }
        self.y += gap_after(BASE_FONT_PX);
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "ul" | "ol" | "li" | "pre" | "blockquote"
            | "table" | "hr" | "div" | "section" | "article" | "header" | "footer"
    )
}

fn gap_after(font: f32) -> f32 {
    font * 0.75
}

fn cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

/// Whether a list item starts with a task checkbox, and if so whether it is ticked.
fn checkbox_state(item: ElementRef) -> Option<bool> {
    let is_checkbox = |e: &ElementRef| {
        e.value().name() == "input" && e.value().attr("type") == Some("checkbox")
    };
    for child in item.children().filter_map(ElementRef::wrap) {
        if is_checkbox(&child) {
            return Some(child.value().attr("checked").is_some());
        }
        if child.value().name() == "p" {
            if let Some(input) = child.children().filter_map(ElementRef::wrap).find(|c| is_checkbox(c)) {
                return Some(input.value().attr("checked").is_some());
            }
        }
    }
    None
}

fn inline_words(el: ElementRef, base: InlineStyle) -> Vec<Word> {
    let mut words = Vec::new();
    collect_children(el, base, &mut words);
    words
}

fn collect_children(el: ElementRef, style: InlineStyle, out: &mut Vec<Word>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_words(text, style, out),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_inline(child_el, style, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_inline(el: ElementRef, style: InlineStyle, out: &mut Vec<Word>) {
    let attrs = el.value();
    let inline_style = attrs.attr("style").unwrap_or("");
    let next = match attrs.name() {
        "br" => {
            out.push(Word::Break);
            return;
        }
        "input" | "img" => return,
        "code" => InlineStyle {
            kind: RunKind::Code,
            color: style_property(inline_style, "color").and_then(Rgb::parse_hex).or(style.color),
            background: style_property(inline_style, "background-color").and_then(Rgb::parse_hex),
        },
        "strong" | "b" => InlineStyle { kind: RunKind::Strong, ..style },
        "em" | "i" => InlineStyle { kind: RunKind::Emphasis, ..style },
        "a" => InlineStyle { kind: RunKind::Link, ..style },
        "del" | "s" => InlineStyle { kind: RunKind::Strike, ..style },
        _ => style,
    };
    collect_children(el, next, out);
}

fn push_words(text: &str, style: InlineStyle, out: &mut Vec<Word>) {
    for word in text.split_whitespace() {
        out.push(Word::Text {
            text: word.to_string(),
            style,
        });
    }
}

/// Baseline that centres the face's ascent and descent in the line box.
fn baseline(fonts: &FontSet, face: FaceKind, font: f32, line_top: f32, line_h: f32) -> f32 {
    let (ascent, descent) = fonts
        .vertical_metrics(face, font)
        .unwrap_or((font * 0.8, font * 0.2));
    line_top + (line_h - (ascent + descent)) / 2.0 + ascent
}

/// Greedy line filling. Returns the word boxes and the block height.
fn flow_words(fonts: &FontSet, words: &[Word], x: f32, top: f32, width: f32, font: f32) -> (Vec<TextRun>, f32) {
    let line_h = font * LINE_HEIGHT;
    let space = fonts
        .advance(FaceKind::Regular, " ", font)
        .filter(|w| *w > 0.0)
        .unwrap_or(font * CHAR_WIDTH_EM);
    let mut runs = Vec::new();
    let mut line = 0usize;
    let mut cursor = 0.0f32;

    for word in words {
        match word {
            Word::Break => {
                line += 1;
                cursor = 0.0;
            }
            Word::Text { text, style } => {
                let face = style.kind.face();
                let pad = if style.background.is_some() { 4.0 } else { 0.0 };
                let glyphs = fonts.advance(face, text, font).unwrap_or_else(|| {
                    let em = if style.kind == RunKind::Code { CODE_CHAR_WIDTH_EM } else { CHAR_WIDTH_EM };
                    text.chars().count() as f32 * font * em
                });
                let w = (glyphs + 2.0 * pad).min(width);
                if cursor > 0.0 && cursor + w > width {
                    line += 1;
                    cursor = 0.0;
                }
                let line_top = top + line as f32 * line_h;
                runs.push(TextRun {
                    rect: Rect {
                        x: x + cursor,
                        y: line_top,
                        width: w,
                        height: line_h,
                    },
                    text: text.clone(),
                    font_px: font,
                    baseline: baseline(fonts, face, font, line_top, line_h),
                    kind: style.kind,
                    color: style.color,
                    background: style.background,
                    inset: pad,
                });
                cursor += w + space;
            }
        }
    }
    (runs, (line + 1) as f32 * line_h)
}
