/// Paint commands produced from a layout

use crate::color::Rgb;
use crate::rendering::fonts::FaceKind;
use crate::rendering::layout::{DocumentLayout, ElementType, Marker, Rect, RunKind, TextRun};
use crate::surface::SurfaceStyle;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect { rect: Rect, color: Rgb },
    StrokeRect { rect: Rect, thickness: f32, color: Rgb },
    /// A run of glyphs starting at `(x, baseline)`; `bounds` is its word box.
    Text {
        text: String,
        face: FaceKind,
        size: f32,
        x: f32,
        baseline: f32,
        bounds: Rect,
        color: Rgb,
    },
}

/// Colours used for everything the normalized HTML does not pin explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub text: Rgb,
    pub link: Rgb,
    pub rule: Rgb,
    pub accent: Rgb,
    pub border: Rgb,
}

impl Palette {
    pub fn for_surface(style: &SurfaceStyle) -> Self {
        Self {
            text: style.text_color,
            link: Rgb::new(0x6a, 0x9b, 0xcc),
            rule: Rgb::new(0xe8, 0xe6, 0xdc),
            accent: Rgb::new(0xd9, 0x77, 0x57),
            border: Rgb::new(0xb0, 0xae, 0xa5),
        }
    }
}

/// Turn a layout into paint commands, backgrounds first.
pub fn paint_layout(layout: &DocumentLayout, palette: &Palette) -> Vec<PaintCommand> {
    let mut cmds = Vec::new();
    for node in &layout.nodes {
        if let Some(bg) = node.background {
            cmds.push(PaintCommand::SolidRect { rect: node.rect, color: bg });
        }
        match node.elem_type {
            ElementType::Rule => cmds.push(PaintCommand::SolidRect { rect: node.rect, color: palette.rule }),
            ElementType::Quote => cmds.push(PaintCommand::SolidRect { rect: node.rect, color: palette.accent }),
            ElementType::TableCell => cmds.push(PaintCommand::StrokeRect {
                rect: node.rect,
                thickness: 1.0,
                color: palette.border,
            }),
            _ => {}
        }
        match node.marker {
            Some(Marker::Bullet) => cmds.push(PaintCommand::SolidRect { rect: node.rect, color: palette.text }),
            Some(Marker::Checkbox { checked }) => {
                cmds.push(PaintCommand::StrokeRect { rect: node.rect, thickness: 1.5, color: palette.border });
                if checked {
                    let inset = 3.0;
                    cmds.push(PaintCommand::SolidRect {
                        rect: Rect {
                            x: node.rect.x + inset,
                            y: node.rect.y + inset,
                            width: node.rect.width - 2.0 * inset,
                            height: node.rect.height - 2.0 * inset,
                        },
                        color: palette.accent,
                    });
                }
            }
            None => {}
        }
        let fallback = node.foreground.unwrap_or(palette.text);
        for run in &node.runs {
            paint_run(run, fallback, palette, &mut cmds);
        }
    }
    cmds
}

fn paint_run(run: &TextRun, fallback: Rgb, palette: &Palette, cmds: &mut Vec<PaintCommand>) {
    if let Some(bg) = run.background {
        cmds.push(PaintCommand::SolidRect { rect: run.rect, color: bg });
    }
    let color = match (run.color, run.kind) {
        (Some(c), _) => c,
        (None, RunKind::Link) => palette.link,
        (None, _) => fallback,
    };
    let bounds = Rect {
        x: run.rect.x + run.inset,
        width: (run.rect.width - 2.0 * run.inset).max(1.0),
        ..run.rect
    };
    cmds.push(PaintCommand::Text {
        text: run.text.clone(),
        face: run.kind.face(),
        size: run.font_px,
        x: bounds.x,
        baseline: run.baseline,
        bounds,
        color,
    });
    match run.kind {
        RunKind::Link => cmds.push(PaintCommand::SolidRect {
            rect: Rect { x: bounds.x, y: run.baseline + 2.0, width: bounds.width, height: 1.0 },
            color,
        }),
        RunKind::Strike => cmds.push(PaintCommand::SolidRect {
            rect: Rect {
                x: bounds.x,
                y: run.baseline - run.font_px * 0.3,
                width: bounds.width,
                height: 1.0,
            },
            color: palette.accent,
        }),
        _ => {}
    }
}
