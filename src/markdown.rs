//! Markdown to HTML rendering
//!
//! Rendering is an outside collaborator of the export pipeline: anything that
//! turns source text into an HTML fragment can stand in through
//! [`MarkdownRenderer`]. The default renderer is CommonMark plus the GitHub
//! extensions the editor relies on (tables, task lists, strikethrough), with
//! every soft line break rendered as a visible break.

use pulldown_cmark::{html, Event, Options, Parser};

/// Turns source text into an HTML fragment.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// pulldown-cmark backed renderer.
#[derive(Debug, Clone)]
pub struct CommonMarkRenderer {
    options: Options,
    soft_breaks_as_hard: bool,
}

impl CommonMarkRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        Self {
            options,
            soft_breaks_as_hard: true,
        }
    }

    /// Keep soft breaks as plain whitespace instead of `<br />`.
    pub fn with_soft_breaks(mut self) -> Self {
        self.soft_breaks_as_hard = false;
        self
    }
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, source: &str) -> String {
        let hard = self.soft_breaks_as_hard;
        let parser = Parser::new_ext(source, self.options).map(move |event| match event {
            Event::SoftBreak if hard => Event::HardBreak,
            other => other,
        });
        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}
