//! The rendered surface handed to the capturer, and its style normalization.
//!
//! A [`Surface`] is the host's live rendering: an HTML fragment laid out at a
//! fixed CSS width with its own padding. Capture never touches it directly;
//! [`StyleNormalizer::normalize`] produces a [`NormalizedSurface`], a clone in
//! which every lazily-computed code style has been replaced by literal values.

use crate::color::Rgb;
use crate::markdown::MarkdownRenderer;
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Id of the element wrapping the rendered content.
pub const SURFACE_ROOT_ID: &str = "mdslice-surface";

/// Layout of the surface as the editor shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceStyle {
    /// Laid-out width in CSS pixels (210mm at 96dpi by default)
    pub width_px: u32,
    /// Minimum laid-out height in CSS pixels (297mm at 96dpi by default)
    pub min_height_px: u32,
    /// Padding baked into the surface on every side
    pub padding_px: u32,
    pub background: Rgb,
    pub text_color: Rgb,
    pub font_family: String,
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self {
            width_px: 794,
            min_height_px: 1123,
            padding_px: 76,
            background: Rgb::new(0xfa, 0xf9, 0xf5),
            text_color: Rgb::new(0x14, 0x14, 0x13),
            font_family: "Lora, Georgia, serif".to_string(),
        }
    }
}

/// A rendered, capturable surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    fragment: String,
    style: SurfaceStyle,
}

impl Surface {
    pub fn from_html(fragment: impl Into<String>, style: SurfaceStyle) -> Self {
        Self {
            fragment: fragment.into(),
            style,
        }
    }

    pub fn from_markdown(renderer: &dyn MarkdownRenderer, source: &str, style: SurfaceStyle) -> Self {
        Self::from_html(renderer.render(source), style)
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn style(&self) -> &SurfaceStyle {
        &self.style
    }

    /// The surface's own top padding, already part of the captured content.
    pub fn top_inset_px(&self) -> u32 {
        self.style.padding_px
    }
}

/// Literal values forced onto code elements before capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeStyle {
    pub inline_background: Rgb,
    pub inline_padding_px: u32,
    pub block_background: Rgb,
    pub block_foreground: Rgb,
    pub block_padding_px: u32,
}

impl Default for CodeStyle {
    fn default() -> Self {
        Self {
            inline_background: Rgb::new(0xe8, 0xe6, 0xdc),
            inline_padding_px: 2,
            block_background: Rgb::new(0x14, 0x14, 0x13),
            block_foreground: Rgb::new(0xfa, 0xf9, 0xf5),
            block_padding_px: 12,
        }
    }
}

impl CodeStyle {
    fn inline_decl(&self) -> String {
        format!(
            "background-color:{};padding:{}px {}px;border-radius:3px;font-family:monospace",
            self.inline_background,
            self.inline_padding_px,
            self.inline_padding_px * 2
        )
    }

    fn block_decl(&self) -> String {
        format!(
            "background-color:{};color:{};padding:{}px;white-space:pre-wrap;overflow:hidden",
            self.block_background, self.block_foreground, self.block_padding_px
        )
    }

    fn block_code_decl(&self) -> String {
        format!(
            "background-color:{};color:{};padding:0;font-family:monospace",
            self.block_background, self.block_foreground
        )
    }
}

/// A disposable, style-normalized clone of a [`Surface`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSurface {
    fragment: String,
    style: SurfaceStyle,
    stylesheet: String,
}

impl NormalizedSurface {
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn style(&self) -> &SurfaceStyle {
        &self.style
    }

    pub fn width_px(&self) -> u32 {
        self.style.width_px
    }

    pub fn background(&self) -> Rgb {
        self.style.background
    }

    /// The surface as a complete HTML document, ready for a browser.
    pub fn document_html(&self) -> String {
        let s = &self.style;
        let mut out = String::with_capacity(self.fragment.len() + 1024);
        out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>");
        let _ = write!(
            out,
            "html,body{{margin:0;padding:0;background-color:{};}}",
            s.background
        );
        out.push_str(&self.stylesheet);
        out.push_str("</style></head><body>");
        let _ = write!(
            out,
            "<div id=\"{}\" style=\"box-sizing:border-box;width:{}px;min-height:{}px;background-color:{};\">",
            SURFACE_ROOT_ID, s.width_px, s.min_height_px, s.background
        );
        let _ = write!(
            out,
            "<div class=\"prose\" style=\"padding:{}px;color:{};font-family:{};background-color:{};\">",
            s.padding_px, s.text_color, s.font_family, s.background
        );
        out.push_str(&self.fragment);
        out.push_str("</div></div></body></html>");
        out
    }
}

/// Rewrites code styling on a clone of the surface.
#[derive(Debug, Clone, Default)]
pub struct StyleNormalizer {
    code: CodeStyle,
}

impl StyleNormalizer {
    pub fn new(code: CodeStyle) -> Self {
        Self { code }
    }

    /// Clone `surface` and pin every code style to literal values.
    ///
    /// The fragment is parsed into a DOM, `pre`, `code` and `pre code`
    /// elements get their declarations appended to any style they already
    /// carry, and the tree is serialized back. Comments, raw text and tag
    /// case in the source never change which elements are matched.
    pub fn normalize(&self, surface: &Surface) -> NormalizedSurface {
        let inline = self.code.inline_decl();
        let block = self.code.block_decl();
        let block_code = self.code.block_code_decl();

        let document = kuchiki::parse_html().one(format!(
            "<!DOCTYPE html><html><head></head><body>{}</body></html>",
            surface.fragment
        ));

        if let Ok(pres) = document.select("pre") {
            for pre in pres.collect::<Vec<_>>() {
                pin_style(&pre, &block);
            }
        }
        if let Ok(codes) = document.select("code") {
            for code in codes.collect::<Vec<_>>() {
                let in_pre = code
                    .as_node()
                    .ancestors()
                    .any(|a| a.as_element().is_some_and(|e| &*e.name.local == "pre"));
                pin_style(&code, if in_pre { &block_code } else { &inline });
            }
        }

        let fragment = match document.select_first("body") {
            Ok(body) => body.as_node().children().map(|child| child.to_string()).collect(),
            Err(()) => surface.fragment.clone(),
        };

        let stylesheet = format!(
            "#{root} code{{{inline} !important}}#{root} pre{{{block} !important}}#{root} pre code{{{block_code} !important}}",
            root = SURFACE_ROOT_ID,
            inline = inline.replace(';', " !important;"),
            block = block.replace(';', " !important;"),
            block_code = block_code.replace(';', " !important;"),
        );

        NormalizedSurface {
            fragment,
            style: surface.style.clone(),
            stylesheet,
        }
    }
}

/// Append `decl` to the element's inline style so the pinned values win.
fn pin_style(element: &NodeDataRef<ElementData>, decl: &str) {
    let mut attrs = element.attributes.borrow_mut();
    let style = match attrs.get("style").map(str::trim) {
        Some(existing) if !existing.is_empty() => {
            format!("{};{}", existing.trim_end_matches(';'), decl)
        }
        _ => decl.to_string(),
    };
    attrs.insert("style", style);
}

/// Read a single declaration (e.g. `background-color`) out of an inline style attribute.
pub fn style_property<'a>(style: &'a str, property: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(property) {
            Some(v.trim().trim_end_matches("!important").trim())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::CommonMarkRenderer;

    fn normalized(md: &str) -> NormalizedSurface {
        let surface = Surface::from_markdown(&CommonMarkRenderer::new(), md, SurfaceStyle::default());
        StyleNormalizer::default().normalize(&surface)
    }

    #[test]
    fn inline_and_block_code_get_literal_styles() {
        let n = normalized("Use `x` here.\n\n```\nlet y = 1;\n```\n\nand `z`");
        let code = CodeStyle::default();
        let frag = n.fragment();
        assert_eq!(frag.matches("<code style=").count(), 3);
        assert!(frag.contains(&format!("<pre style=\"background-color:{};color:{}", code.block_background, code.block_foreground)));
        // code inside pre takes the block colours, the others the inline background
        let inline_bg = format!("<code style=\"background-color:{};padding", code.inline_background);
        assert_eq!(frag.matches(&inline_bg).count(), 2);
    }

    #[test]
    fn live_surface_is_untouched() {
        let surface = Surface::from_html("<p><code>a</code></p>", SurfaceStyle::default());
        let before = surface.clone();
        let n = StyleNormalizer::default().normalize(&surface);
        assert_eq!(surface, before);
        assert_ne!(n.fragment(), surface.fragment());
    }

    #[test]
    fn similar_tag_names_are_not_rewritten() {
        let n = StyleNormalizer::default().normalize(&Surface::from_html(
            "<codex>a</codex><prefix>b</prefix>",
            SurfaceStyle::default(),
        ));
        assert_eq!(n.fragment(), "<codex>a</codex><prefix>b</prefix>");
    }

    #[test]
    fn pre_inside_a_comment_does_not_leak_block_styles() {
        let n = normalized("<!-- legacy <pre> block removed -->\n\nUse `x` inline.");
        let code = CodeStyle::default();
        let frag = n.fragment();
        assert!(frag.contains("<!-- legacy <pre> block removed -->"));
        assert!(!frag.contains("<pre style="));
        assert!(frag.contains(&format!("<code style=\"background-color:{};padding", code.inline_background)));
    }

    #[test]
    fn uppercase_tags_are_normalized() {
        let n = normalized("Press <CODE>Ctrl</CODE> now.");
        let code = CodeStyle::default();
        assert!(n
            .fragment()
            .contains(&format!("<code style=\"background-color:{};padding", code.inline_background)));
    }

    #[test]
    fn existing_style_attribute_is_extended() {
        let n = StyleNormalizer::default().normalize(&Surface::from_html(
            "<p><code style=\"color: red;\">a</code></p>",
            SurfaceStyle::default(),
        ));
        let frag = n.fragment();
        assert_eq!(frag.matches("style=").count(), 1);
        assert!(frag.contains("style=\"color: red;background-color:"));
    }

    #[test]
    fn document_wraps_fragment_in_surface_root() {
        let n = normalized("hello");
        let doc = n.document_html();
        assert!(doc.contains(&format!("id=\"{}\"", SURFACE_ROOT_ID)));
        assert!(doc.contains("width:794px"));
        assert!(doc.contains("padding:76px"));
        assert!(doc.contains("!important"));
    }

    #[test]
    fn style_property_reads_declarations() {
        let s = "background-color:#141413; color: #faf9f5 !important;padding:0";
        assert_eq!(style_property(s, "color"), Some("#faf9f5"));
        assert_eq!(style_property(s, "background-color"), Some("#141413"));
        assert_eq!(style_property(s, "margin"), None);
    }
}
