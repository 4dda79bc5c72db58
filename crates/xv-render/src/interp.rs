//! Drawing-program interpreter.
//!
//! Replays the parsed xdot ops of one graph object against a fresh
//! [`State`] and emits scene items. State-setting ops (colors, font,
//! style) only mutate the state; shape ops emit exactly one item each,
//! except the unsupported ones, which are reported in
//! [`Interpretation::rejected`].
//!
//! Layout space is Y-up, the scene is Y-down: every Y is mapped through
//! `scene_height - y`, gradient endpoints included.

use crate::color::{Rgba, parse_color};
use crate::error::RenderError;
use crate::item::{DashStyle, FontSpec, Item, Paint, Pen, Primitive, points_rect};
use crate::xdot::{DrawOp, Gradient, TextAlign, fontchar, parse_xdot};
use kurbo::{BezPath, Point, Rect};
use std::io::Read;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use xv_core::layered::{estimate_text_width, line_height};
use xv_core::{Attrs, DRAW_CHANNELS};

/// Set of drawing channels to read, one bit per entry of
/// [`DRAW_CHANNELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels(u8);

impl Channels {
    pub const DRAW: Channels = Channels(1 << 0);
    pub const LABEL: Channels = Channels(1 << 1);
    pub const HEAD: Channels = Channels(1 << 2);
    pub const TAIL: Channels = Channels(1 << 3);
    pub const HEAD_LABEL: Channels = Channels(1 << 4);
    pub const TAIL_LABEL: Channels = Channels(1 << 5);
    /// What nodes and graphs read.
    pub const NODE: Channels = Channels(0b11);
    /// What edges read.
    pub const EDGE: Channels = Channels(0b11_1111);

    pub fn contains(self, other: Channels) -> bool {
        self.0 & other.0 == other.0
    }

    /// Attribute names selected by this set, in channel order.
    pub fn attr_names(self) -> impl Iterator<Item = &'static str> {
        DRAW_CHANNELS
            .into_iter()
            .enumerate()
            .filter(move |(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, name)| name)
    }
}

impl BitOr for Channels {
    type Output = Channels;

    fn bitor(self, rhs: Channels) -> Channels {
        Channels(self.0 | rhs.0)
    }
}

/// Per-build settings taken from the root graph.
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// Accept `#RRGGBBAA` colors.
    pub truecolor: bool,
    /// `imagepath` directories tried after the literal image name.
    pub image_path: Vec<PathBuf>,
    /// Height of the root bounding box; the Y-flip pivot.
    pub scene_height: f64,
}

impl InterpreterConfig {
    /// Read `truecolor` and `imagepath` from root graph attributes.
    pub fn from_graph_attrs(truecolor: &str, imagepath: &str, scene_height: f64) -> Self {
        Self {
            truecolor: matches!(truecolor, "yes" | "true" | "1"),
            image_path: std::env::split_paths(imagepath)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            scene_height,
        }
    }
}

/// Items produced for one object, plus the ops that were refused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub items: Vec<Item>,
    pub rejected: Vec<String>,
}

impl Interpretation {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Union of the items' extents.
    pub fn bounds(&self) -> Option<Rect> {
        self.items
            .iter()
            .filter_map(Item::bounds)
            .reduce(|a, b| a.union(b))
    }
}

// ─── Interpreter state ───────────────────────────────────────────────────────

const STYLE_DASHED: u8 = 1 << 0;
const STYLE_DOTTED: u8 = 1 << 1;
const STYLE_BOLD: u8 = 1 << 2;

const BOLD_WIDTH: f64 = 3.0;

/// Current pen, brush, font and color. One per object build, shared by
/// every channel of that object.
#[derive(Debug, Clone)]
struct State {
    /// `None` after an undecodable pen color: shapes are not stroked.
    pen: Option<Pen>,
    brush: Option<Paint>,
    font: FontSpec,
    color: Rgba,
    style: u8,
    line_width: Option<f64>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            pen: Some(Pen::default()),
            brush: None,
            font: FontSpec::default(),
            color: Rgba::BLACK,
            style: 0,
            line_width: None,
        }
    }
}

impl State {
    /// Style flags take effect when the next pen color is set.
    fn apply_style(&mut self, style: &str) {
        for token in style.split(',').map(str::trim) {
            match token {
                "dashed" => self.style |= STYLE_DASHED,
                "dotted" => self.style |= STYLE_DOTTED,
                "bold" => self.style |= STYLE_BOLD,
                "solid" | "" => {}
                _ => match parse_line_width(token) {
                    Some(w) => self.line_width = Some(w),
                    None => log::debug!("unhandled style `{token}`"),
                },
            }
        }
    }

    fn set_pen_color(&mut self, color: Rgba) {
        let dash = match (self.style & STYLE_DASHED != 0, self.style & STYLE_DOTTED != 0) {
            (true, true) => DashStyle::DashDot,
            (true, false) => DashStyle::Dash,
            (false, true) => DashStyle::Dot,
            (false, false) => DashStyle::Solid,
        };
        let width = if self.style & STYLE_BOLD != 0 {
            BOLD_WIDTH
        } else {
            self.line_width.unwrap_or(1.0)
        };
        self.pen = Some(Pen {
            paint: Paint::Solid(color),
            width,
            dash,
        });
    }
}

/// `setlinewidth(2.5)`
fn parse_line_width(token: &str) -> Option<f64> {
    token
        .strip_prefix("setlinewidth(")?
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}

/// Font size and name only; all the bbox pass needs.
struct FontState {
    size: f64,
    name: String,
}

impl Default for FontState {
    fn default() -> Self {
        let font = FontSpec::default();
        Self {
            size: font.size,
            name: "Times-Roman".into(),
        }
    }
}

// ─── Interpreter ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Interpreter<'a> {
    config: &'a InterpreterConfig,
}

impl<'a> Interpreter<'a> {
    pub fn new(config: &'a InterpreterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpreterConfig {
        self.config
    }

    /// Map a layout-space Y to scene space.
    pub fn cy(&self, y: f64) -> f64 {
        self.config.scene_height - y
    }

    fn map(&self, p: Point) -> Point {
        Point::new(p.x, self.cy(p.y))
    }

    /// Parsed ops of the selected channels, in channel order. A malformed
    /// channel contributes nothing.
    fn channel_ops(&self, attrs: &Attrs, channels: Channels) -> Vec<DrawOp> {
        let mut ops = Vec::new();
        for name in channels.attr_names() {
            let Some(program) = attrs.get(name).filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            match parse_xdot(program) {
                Ok(parsed) => ops.extend(parsed),
                Err(e) => log::warn!("ignoring `{name}`: {e}"),
            }
        }
        ops
    }

    /// Replay the selected channels of `attrs` into scene items.
    pub fn build_graphic(&self, attrs: &Attrs, channels: Channels) -> Interpretation {
        let mut state = State::default();
        let mut out = Interpretation::default();

        for op in self.channel_ops(attrs, channels) {
            match op {
                DrawOp::Ellipse {
                    filled,
                    center,
                    rx,
                    ry,
                } => {
                    let rect = self.ellipse_rect(center, rx, ry);
                    out.items.push(shape(Primitive::Ellipse(rect), &state, filled));
                }
                DrawOp::Polygon { filled, points } => {
                    let points = points.iter().map(|p| self.map(*p)).collect();
                    let primitive = Primitive::Polygon {
                        points,
                        closed: true,
                    };
                    out.items.push(shape(primitive, &state, filled));
                }
                DrawOp::Polyline { points } => {
                    let points = points.iter().map(|p| self.map(*p)).collect();
                    let primitive = Primitive::Polygon {
                        points,
                        closed: false,
                    };
                    out.items.push(shape(primitive, &state, false));
                }
                DrawOp::Bezier { filled, points } => {
                    let path = self.bezier(&points);
                    out.items.push(shape(Primitive::Path(path), &state, filled));
                }
                DrawOp::Text {
                    at,
                    align,
                    width,
                    text,
                } => {
                    let text = text.replace("\\n", "\n");
                    match self.text_rect(at, align, width, &text, state.font.size) {
                        Ok(rect) => out.items.push(Item {
                            primitive: Primitive::Text {
                                rect,
                                text,
                                font: state.font.clone(),
                            },
                            pen: None,
                            brush: Some(Paint::Solid(state.color)),
                        }),
                        Err(e) => out.rejected.push(e.to_string()),
                    }
                }
                DrawOp::FillColor(c) => {
                    let color = parse_color(&c, self.config.truecolor);
                    if let Some(color) = color {
                        state.color = color;
                    }
                    state.brush = color.map(Paint::Solid);
                }
                DrawOp::PenColor(c) => match parse_color(&c, self.config.truecolor) {
                    Some(color) => {
                        state.color = color;
                        state.set_pen_color(color);
                    }
                    None => state.pen = None,
                },
                DrawOp::GradientFill(g) => state.brush = Some(self.gradient(&g)),
                DrawOp::GradientPen(g) => {
                    state.pen = Some(Pen {
                        paint: self.gradient(&g),
                        width: 1.0,
                        dash: DashStyle::Solid,
                    })
                }
                DrawOp::Font { size, name } => {
                    state.font = FontSpec::from_postscript(&name, size);
                }
                DrawOp::Style(style) => state.apply_style(&style),
                DrawOp::FontChar(flags) => {
                    state.font.bold |= flags & fontchar::BOLD != 0;
                    state.font.italic |= flags & fontchar::ITALIC != 0;
                    state.font.underline |= flags & fontchar::UNDERLINE != 0;
                    state.font.strikeout |= flags & fontchar::STRIKE_THROUGH != 0;
                    if flags & (fontchar::SUPERSCRIPT | fontchar::SUBSCRIPT) != 0 {
                        out.rejected.push("superscript and subscript text".into());
                    }
                }
                DrawOp::Image {
                    at,
                    width,
                    height,
                    name,
                } => match self.resolve_image(&name) {
                    Some(path) => out.items.push(Item {
                        primitive: Primitive::Pixmap {
                            rect: Rect::new(at.x, self.cy(at.y + height), at.x + width, self.cy(at.y)),
                            path,
                        },
                        pen: None,
                        brush: None,
                    }),
                    None => log::warn!("cannot load image `{name}`"),
                },
            }
        }
        out
    }

    /// Extent of what [`build_graphic`](Self::build_graphic) would draw,
    /// without building items. Images and right-aligned text are errors.
    pub fn bounding_rect(&self, attrs: &Attrs, channels: Channels) -> Result<Option<Rect>, RenderError> {
        let mut font = FontState::default();
        let mut bb: Option<Rect> = None;
        let mut unite = |r: Option<Rect>| {
            if let Some(r) = r {
                bb = Some(bb.map_or(r, |b| b.union(r)));
            }
        };

        for op in self.channel_ops(attrs, channels) {
            match op {
                DrawOp::Ellipse { center, rx, ry, .. } => unite(Some(self.ellipse_rect(center, rx, ry))),
                DrawOp::Polygon { points, .. } | DrawOp::Polyline { points } => {
                    unite(points_rect(points.iter().map(|p| self.map(*p))));
                }
                DrawOp::Bezier { points, .. } => {
                    unite(points_rect(drawn_bezier(&points).iter().map(|p| self.map(*p))));
                }
                DrawOp::Text {
                    at,
                    align,
                    width,
                    text,
                } => {
                    let text = text.replace("\\n", "\n");
                    unite(Some(self.text_rect(at, align, width, &text, font.size)?));
                }
                DrawOp::Font { size, name } => font = FontState { size, name },
                DrawOp::Image { name, .. } => {
                    return Err(RenderError::Unsupported(format!(
                        "image `{name}` in bounding-box mode"
                    )));
                }
                DrawOp::FillColor(_)
                | DrawOp::PenColor(_)
                | DrawOp::GradientFill(_)
                | DrawOp::GradientPen(_)
                | DrawOp::Style(_)
                | DrawOp::FontChar(_) => {}
            }
        }
        log::trace!("bbox with font {} {}: {bb:?}", font.name, font.size);
        Ok(bb)
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    fn ellipse_rect(&self, center: Point, rx: f64, ry: f64) -> Rect {
        let top = self.cy(center.y + ry);
        Rect::new(center.x - rx, top, center.x + rx, top + 2.0 * ry)
    }

    /// `moveTo(p0)`, then one cubic per following group of three points.
    fn bezier(&self, points: &[Point]) -> BezPath {
        let mut path = BezPath::new();
        let Some((first, rest)) = drawn_bezier(points).split_first() else {
            return path;
        };
        path.move_to(self.map(*first));
        for c in rest.chunks_exact(3) {
            path.curve_to(self.map(c[0]), self.map(c[1]), self.map(c[2]));
        }
        path
    }

    /// Estimated text box; the baseline sits on the box's bottom edge.
    fn text_rect(&self, at: Point, align: TextAlign, width: f64, text: &str, size: f64) -> Result<Rect, RenderError> {
        let tw = text
            .lines()
            .map(|line| estimate_text_width(line, size))
            .fold(0.0, f64::max);
        let th = line_height(size) * text.lines().count().max(1) as f64;
        let left = match align {
            TextAlign::Left => at.x + width / 2.0 - tw / 2.0,
            TextAlign::Center => at.x - tw / 2.0,
            TextAlign::Right => {
                return Err(RenderError::Unsupported(format!("right-aligned text `{text}`")));
            }
        };
        let top = self.cy(at.y) - th;
        Ok(Rect::new(left, top, left + tw, top + th))
    }

    fn gradient(&self, g: &Gradient) -> Paint {
        let stops = g
            .stops()
            .iter()
            .map(|s| {
                let color = parse_color(&s.color, self.config.truecolor).unwrap_or(Rgba::BLACK);
                (s.offset, color)
            })
            .collect();
        match g {
            Gradient::Linear { start, end, .. } => Paint::Linear {
                start: self.map(*start),
                end: self.map(*end),
                stops,
            },
            Gradient::Radial {
                inner,
                inner_radius,
                outer,
                outer_radius,
                ..
            } => Paint::Radial {
                inner: self.map(*inner),
                inner_radius: *inner_radius,
                outer: self.map(*outer),
                outer_radius: *outer_radius,
                stops,
            },
        }
    }

    /// The literal name first, then each `imagepath` directory.
    fn resolve_image(&self, name: &str) -> Option<PathBuf> {
        std::iter::once(PathBuf::from(name))
            .chain(self.config.image_path.iter().map(|dir| dir.join(name)))
            .find(|path| looks_like_image(path))
    }
}

/// The start point and every complete group of three after it. Trailing
/// points that do not make up a whole cubic are not drawn.
fn drawn_bezier(points: &[Point]) -> &[Point] {
    match points.len() {
        0 => points,
        n => &points[..1 + 3 * ((n - 1) / 3)],
    }
}

const IMAGE_MAGIC: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xff\xd8\xff",
    b"GIF87a",
    b"GIF89a",
    b"BM",
];

/// A regular file that starts with a known raster signature, or an `.svg`.
fn looks_like_image(path: &Path) -> bool {
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    if !file.metadata().is_ok_and(|m| m.is_file()) {
        return false;
    }
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("svg")) {
        return true;
    }
    let mut head = [0u8; 8];
    let n = file.read(&mut head).unwrap_or(0);
    let known = IMAGE_MAGIC.iter().any(|magic| head[..n].starts_with(magic));
    if !known {
        log::warn!("{} is not a recognized image", path.display());
    }
    known
}

fn shape(primitive: Primitive, state: &State, filled: bool) -> Item {
    Item {
        primitive,
        pen: state.pen.clone(),
        brush: if filled { state.brush.clone() } else { None },
    }
}
