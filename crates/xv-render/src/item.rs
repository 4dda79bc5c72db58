//! Scene items: one visual primitive plus the pen and brush it is drawn
//! with. Geometry is in scene space (Y-down).

use crate::color::Rgba;
use kurbo::{BezPath, PathEl, Point, Rect};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
}

impl DashStyle {
    /// Dash lengths as multiples of the pen width.
    pub fn pattern(self) -> &'static [f64] {
        match self {
            DashStyle::Solid => &[],
            DashStyle::Dash => &[4.0, 2.0],
            DashStyle::Dot => &[1.0, 2.0],
            DashStyle::DashDot => &[4.0, 2.0, 1.0, 2.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Linear {
        start: Point,
        end: Point,
        stops: Vec<(f64, Rgba)>,
    },
    Radial {
        inner: Point,
        inner_radius: f64,
        outer: Point,
        outer_radius: f64,
        stops: Vec<(f64, Rgba)>,
    },
}

impl Paint {
    /// Solid color, or the first stop of a gradient.
    pub fn representative(&self) -> Rgba {
        match self {
            Paint::Solid(c) => *c,
            Paint::Linear { stops, .. } | Paint::Radial { stops, .. } => {
                stops.first().map(|(_, c)| *c).unwrap_or(Rgba::BLACK)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub paint: Paint,
    pub width: f64,
    pub dash: DashStyle,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            paint: Paint::Solid(Rgba::BLACK),
            width: 1.0,
            dash: DashStyle::Solid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::from_postscript("Times-Roman", 14.0)
    }
}

impl FontSpec {
    /// Decode a PostScript-style name: family before the first `-`, weight
    /// and slant from the suffix (`Helvetica-BoldOblique`).
    pub fn from_postscript(name: &str, size: f64) -> Self {
        let (family, suffix) = name.split_once('-').unwrap_or((name, ""));
        Self {
            family: family.to_string(),
            size,
            bold: suffix.contains("Bold"),
            italic: suffix.contains("Italic") || suffix.contains("Oblique"),
            underline: false,
            strikeout: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Ellipse inscribed in the rect.
    Ellipse(Rect),
    /// Closed polygon, or an open polyline.
    Polygon { points: Vec<Point>, closed: bool },
    Path(BezPath),
    /// Text laid out in `rect`, one line per `\n`.
    Text {
        rect: Rect,
        text: String,
        font: FontSpec,
    },
    Pixmap { rect: Rect, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub primitive: Primitive,
    pub pen: Option<Pen>,
    pub brush: Option<Paint>,
}

impl Item {
    /// Geometric extent, ignoring pen width. `None` for empty geometry.
    pub fn bounds(&self) -> Option<Rect> {
        match &self.primitive {
            Primitive::Ellipse(rect)
            | Primitive::Text { rect, .. }
            | Primitive::Pixmap { rect, .. } => Some(*rect),
            Primitive::Polygon { points, .. } => points_rect(points.iter().copied()),
            Primitive::Path(path) => points_rect(path.elements().iter().flat_map(element_points)),
        }
    }
}

fn element_points(el: &PathEl) -> Vec<Point> {
    match *el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => vec![p],
        PathEl::QuadTo(a, b) => vec![a, b],
        PathEl::CurveTo(a, b, c) => vec![a, b, c],
        PathEl::ClosePath => vec![],
    }
}

/// Smallest rect holding every point.
pub fn points_rect(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
    points
        .into_iter()
        .map(|p| Rect::from_points(p, p))
        .reduce(|a, b| a.union(b))
}
