//! Scene → Vello drawing commands.
//!
//! Walks composites in Z order and emits fills and strokes. Composite
//! offsets become transforms and opacity scales every color's alpha.
//! Gradients are approximated by their first stop.

use crate::color::Rgba;
use crate::item::{DashStyle, Item, Paint, Pen, Primitive};
use crate::scene::{Composite, Scene};
use kurbo::{Affine, BezPath, Ellipse as KurboEllipse, Line, Point, Rect, Shape, Stroke as KurboStroke};
use peniko::{Color, Fill};

/// Paint the whole scene to a Vello scene.
///
/// Call once per frame with a freshly-cleared `vello::Scene`.
pub fn paint_scene(out: &mut vello::Scene, scene: &Scene) {
    if let Some(frame) = scene.frame() {
        let pen = Pen {
            dash: DashStyle::Dash,
            ..Pen::default()
        };
        stroke_shape(out, Affine::IDENTITY, &frame, &pen, 1.0);
    }

    let ordered = scene.paint_order();
    for composite in ordered.iter().filter(|c| c.is_shown()) {
        paint_composite(out, composite);
    }
    // Toggles sit above every composite.
    for composite in ordered.iter().filter(|c| c.is_shown()) {
        if let Some(toggle) = composite.toggle {
            let transform = Affine::translate(composite.offset);
            paint_toggle(out, transform, toggle.rect, toggle.checked, composite.opacity);
        }
    }
}

fn paint_composite(out: &mut vello::Scene, composite: &Composite) {
    let transform = Affine::translate(composite.offset);
    for item in &composite.items {
        paint_item(out, transform, item, composite.opacity);
    }
}

fn paint_item(out: &mut vello::Scene, transform: Affine, item: &Item, opacity: f64) {
    match &item.primitive {
        Primitive::Ellipse(rect) => {
            let shape = KurboEllipse::from_rect(*rect);
            paint_shape(out, transform, &shape, item, opacity);
        }
        Primitive::Polygon { points, closed } => {
            let shape = polygon_path(points, *closed);
            paint_shape(out, transform, &shape, item, opacity);
        }
        Primitive::Path(path) => paint_shape(out, transform, path, item, opacity),
        Primitive::Text { rect, text, .. } => {
            // Glyph shaping needs a font context; only the box is known here.
            log::trace!("TEXT {text:?} at ({}, {})", rect.x0, rect.y0);
        }
        Primitive::Pixmap { rect, path } => {
            log::trace!("PIXMAP {} at ({}, {})", path.display(), rect.x0, rect.y0);
        }
    }
}

fn polygon_path(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut it = points.iter();
    if let Some(first) = it.next() {
        path.move_to(*first);
        for p in it {
            path.line_to(*p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

// ─── Fill and stroke ─────────────────────────────────────────────────────────

fn paint_shape(out: &mut vello::Scene, transform: Affine, shape: &impl Shape, item: &Item, opacity: f64) {
    if let Some(brush) = &item.brush {
        out.fill(Fill::NonZero, transform, to_color(brush, opacity), None, shape);
    }
    if let Some(pen) = &item.pen {
        stroke_shape(out, transform, shape, pen, opacity);
    }
}

fn stroke_shape(out: &mut vello::Scene, transform: Affine, shape: &impl Shape, pen: &Pen, opacity: f64) {
    let pattern: Vec<f64> = pen.dash.pattern().iter().map(|d| d * pen.width).collect();
    let stroke = KurboStroke::new(pen.width).with_dashes(0.0, pattern);
    out.stroke(&stroke, transform, to_color(&pen.paint, opacity), None, shape);
}

fn paint_toggle(out: &mut vello::Scene, transform: Affine, rect: Rect, checked: bool, opacity: f64) {
    let pen = Pen::default();
    out.fill(
        Fill::NonZero,
        transform,
        to_color(&Paint::Solid(Rgba::WHITE), opacity),
        None,
        &rect,
    );
    stroke_shape(out, transform, &rect, &pen, opacity);
    if checked {
        let inner = rect.inset(-2.0);
        let mid = Point::new(inner.x0 + inner.width() * 0.4, inner.y1);
        stroke_shape(out, transform, &Line::new((inner.x0, inner.center().y), mid), &pen, opacity);
        stroke_shape(out, transform, &Line::new(mid, (inner.x1, inner.y0)), &pen, opacity);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn to_color(paint: &Paint, opacity: f64) -> Color {
    let c = paint.representative().with_opacity(opacity);
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}
