//! Scene → SVG document.
//!
//! Everything the scene holds is written out, text and images included,
//! with real gradients in `<defs>`. Scene space is already Y-down, so
//! coordinates are copied as they are.

use crate::color::Rgba;
use crate::item::{DashStyle, FontSpec, Item, Paint, Pen, Primitive};
use crate::scene::{Composite, CompositeKind, FoldToggle, Scene};
use kurbo::Point;

const PAD: f64 = 4.0;

/// Render the scene as a standalone SVG document.
pub fn render_svg(scene: &Scene) -> String {
    let b = scene.bounds().inflate(PAD, PAD);
    let (width, height) = (num(b.width()), num(b.height()));

    let mut defs = String::new();
    let mut body = String::new();
    let mut gradients = 0usize;

    if let Some(frame) = scene.frame() {
        body.push_str(&format!(
            "<rect class=\"frame\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"#000000\" stroke-dasharray=\"4,2\"/>\n",
            num(frame.x0),
            num(frame.y0),
            num(frame.width()),
            num(frame.height())
        ));
    }

    let ordered = scene.paint_order();
    for composite in ordered.iter().filter(|c| c.is_shown()) {
        render_composite(&mut body, &mut defs, &mut gradients, composite);
    }
    for composite in ordered.iter().filter(|c| c.is_shown()) {
        if let Some(toggle) = composite.toggle {
            render_toggle(&mut body, composite, toggle);
        }
    }

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"{} {} {width} {height}\">\n",
        num(b.x0),
        num(b.y0)
    ));
    if !defs.is_empty() {
        svg.push_str("<defs>\n");
        svg.push_str(&defs);
        svg.push_str("</defs>\n");
    }
    svg.push_str(&body);
    svg.push_str("</svg>\n");
    svg
}

fn render_composite(out: &mut String, defs: &mut String, gradients: &mut usize, c: &Composite) {
    let class = match c.kind {
        CompositeKind::Graph => "graph",
        CompositeKind::Node => "node",
        CompositeKind::Edge => "edge",
    };
    out.push_str(&format!("<g class=\"{class}\""));
    if let Some(id) = c.node {
        out.push_str(&format!(" id=\"{}\"", escape(id.as_str())));
    }
    if c.offset.x != 0.0 || c.offset.y != 0.0 {
        out.push_str(&format!(" transform=\"translate({} {})\"", num(c.offset.x), num(c.offset.y)));
    }
    if c.opacity < 1.0 {
        out.push_str(&format!(" opacity=\"{}\"", num(c.opacity)));
    }
    out.push_str(">\n");
    if let Some(tip) = &c.tooltip {
        out.push_str(&format!("<title>{}</title>\n", escape(tip)));
    }
    for item in &c.items {
        render_item(out, defs, gradients, item);
    }
    out.push_str("</g>\n");
}

fn render_item(out: &mut String, defs: &mut String, gradients: &mut usize, item: &Item) {
    let paint_attrs = |defs: &mut String, gradients: &mut usize| {
        let fill = match &item.brush {
            Some(paint) => paint_ref(defs, gradients, paint),
            None => "fill=\"none\"".to_string(),
        };
        let stroke = match &item.pen {
            Some(pen) => pen_attrs(defs, gradients, pen),
            None => String::new(),
        };
        format!("{fill}{stroke}")
    };
    match &item.primitive {
        Primitive::Ellipse(rect) => {
            let attrs = paint_attrs(defs, gradients);
            let c = rect.center();
            out.push_str(&format!(
                "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" {attrs}/>\n",
                num(c.x),
                num(c.y),
                num(rect.width() / 2.0),
                num(rect.height() / 2.0)
            ));
        }
        Primitive::Polygon { points, closed } => {
            let attrs = paint_attrs(defs, gradients);
            let tag = if *closed { "polygon" } else { "polyline" };
            out.push_str(&format!("<{tag} points=\"{}\" {attrs}/>\n", points_attr(points)));
        }
        Primitive::Path(path) => {
            let attrs = paint_attrs(defs, gradients);
            out.push_str(&format!("<path d=\"{}\" {attrs}/>\n", path.to_svg()));
        }
        Primitive::Text { rect, text, font } => {
            let color = item.brush.as_ref().map_or(Rgba::BLACK, Paint::representative);
            let size = font.size;
            out.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" {} {}>",
                num(rect.center().x),
                num(rect.y0),
                font_attrs(font),
                color_attrs("fill", color)
            ));
            for (i, line) in text.lines().enumerate() {
                let dy = if i == 0 { size } else { xv_core::layered::line_height(size) };
                out.push_str(&format!(
                    "<tspan x=\"{}\" dy=\"{}\">{}</tspan>",
                    num(rect.center().x),
                    num(dy),
                    escape(line)
                ));
            }
            out.push_str("</text>\n");
        }
        Primitive::Pixmap { rect, path } => {
            out.push_str(&format!(
                "<image href=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>\n",
                escape(&path.to_string_lossy()),
                num(rect.x0),
                num(rect.y0),
                num(rect.width()),
                num(rect.height())
            ));
        }
    }
}

fn render_toggle(out: &mut String, c: &Composite, toggle: FoldToggle) {
    let r = toggle.rect + c.offset;
    out.push_str(&format!(
        "<g class=\"fold-toggle\"><rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#ffffff\" stroke=\"#000000\"/>",
        num(r.x0),
        num(r.y0),
        num(r.width()),
        num(r.height())
    ));
    if toggle.checked {
        let inner = r.inset(-2.0);
        out.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"#000000\"/>",
            points_attr(&[
                Point::new(inner.x0, inner.center().y),
                Point::new(inner.x0 + inner.width() * 0.4, inner.y1),
                Point::new(inner.x1, inner.y0),
            ])
        ));
    }
    out.push_str("</g>\n");
}

// ─── Attributes ──────────────────────────────────────────────────────────────

fn pen_attrs(defs: &mut String, gradients: &mut usize, pen: &Pen) -> String {
    let stroke = paint_ref(defs, gradients, &pen.paint).replacen("fill", "stroke", 2);
    let mut s = format!(" {stroke}");
    if pen.width != 1.0 {
        s.push_str(&format!(" stroke-width=\"{}\"", num(pen.width)));
    }
    if pen.dash != DashStyle::Solid {
        let dashes: Vec<String> = pen.dash.pattern().iter().map(|d| num(d * pen.width)).collect();
        s.push_str(&format!(" stroke-dasharray=\"{}\"", dashes.join(",")));
    }
    s
}

/// `fill="..."` for a paint, defining a gradient when needed.
fn paint_ref(defs: &mut String, gradients: &mut usize, paint: &Paint) -> String {
    let (open, stops) = match paint {
        Paint::Solid(c) => return color_attrs("fill", *c),
        Paint::Linear { start, end, stops } => (
            format!(
                "<linearGradient id=\"g{}\" gradientUnits=\"userSpaceOnUse\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\">",
                *gradients,
                num(start.x),
                num(start.y),
                num(end.x),
                num(end.y)
            ),
            stops,
        ),
        Paint::Radial {
            inner,
            inner_radius,
            outer,
            outer_radius,
            stops,
        } => (
            format!(
                "<radialGradient id=\"g{}\" gradientUnits=\"userSpaceOnUse\" fx=\"{}\" fy=\"{}\" fr=\"{}\" cx=\"{}\" cy=\"{}\" r=\"{}\">",
                *gradients,
                num(inner.x),
                num(inner.y),
                num(*inner_radius),
                num(outer.x),
                num(outer.y),
                num(*outer_radius)
            ),
            stops,
        ),
    };
    let close = if matches!(paint, Paint::Linear { .. }) {
        "</linearGradient>"
    } else {
        "</radialGradient>"
    };
    defs.push_str(&open);
    for (offset, color) in stops {
        defs.push_str(&format!("<stop offset=\"{}\" {}/>", num(*offset), color_attrs("stop-color", *color)));
    }
    defs.push_str(close);
    defs.push('\n');
    let id = *gradients;
    *gradients += 1;
    format!("fill=\"url(#g{id})\"")
}

fn color_attrs(name: &str, c: Rgba) -> String {
    if c.a == 255 {
        format!("{name}=\"{}\"", c.to_hex())
    } else {
        let opacity = if name == "stop-color" { "stop-opacity".to_string() } else { format!("{name}-opacity") };
        format!("{name}=\"{}\" {opacity}=\"{}\"", c.to_hex(), num(f64::from(c.a) / 255.0))
    }
}

fn font_attrs(font: &FontSpec) -> String {
    let mut s = format!(
        "text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\"",
        escape(&font.family),
        num(font.size)
    );
    if font.bold {
        s.push_str(" font-weight=\"bold\"");
    }
    if font.italic {
        s.push_str(" font-style=\"italic\"");
    }
    match (font.underline, font.strikeout) {
        (true, true) => s.push_str(" text-decoration=\"underline line-through\""),
        (true, false) => s.push_str(" text-decoration=\"underline\""),
        (false, true) => s.push_str(" text-decoration=\"line-through\""),
        (false, false) => {}
    }
    s
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn num(v: f64) -> String {
    xv_core::fmt_num(v)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneBuilder;
    use xv_core::parse_dot;

    fn svg_of(dot: &str) -> String {
        let g = parse_dot(dot).unwrap();
        render_svg(&SceneBuilder::default().build(&g, |id| id.as_str() == "sv_f"))
    }

    #[test]
    fn writes_every_primitive() {
        let svg = svg_of(
            r#"digraph {
                bb="0,0,100,100";
                sv_a [tooltip="a & b", _draw_="S 6 -dashed c 5 -black C 3 -red E 50 50 10 5 ", _ldraw_="F 14 11 -Times-Roman T 50 45 0 10 5 -x<y>z "];
                sv_f [_draw_="p 3 0 0 10 0 10 10 L 2 0 0 5 5 B 4 0 0 1 1 2 2 3 3 "];
            }"#,
        );
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains("<rect class=\"frame\" x=\"-5\" y=\"-5\" width=\"110\" height=\"110\""));
        assert!(svg.contains("<ellipse cx=\"50\" cy=\"50\" rx=\"10\" ry=\"5\" fill=\"#ff0000\" stroke=\"#000000\" stroke-dasharray=\"4,2\"/>"));
        assert!(svg.contains("<title>a &amp; b</title>"));
        assert!(svg.contains(">x&lt;y&gt;z</tspan>"));
        assert!(svg.contains("<polygon points=\"0,100 10,100 10,90\" fill=\"none\" stroke=\"#000000\"/>"));
        assert!(svg.contains("<polyline points=\"0,100 5,95\""));
        assert!(svg.contains("<path d=\"M0"));
        assert!(svg.contains("class=\"fold-toggle\""));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn gradients_go_to_defs() {
        let svg = svg_of(
            r#"digraph { bb="0,0,10,10"; sv_g [_draw_="C 31 -[0 0 0 10 2 0 3 -red 1 4 -blue] P 3 0 0 1 0 1 1 "] }"#,
        );
        assert!(svg.contains("<defs>\n<linearGradient id=\"g0\""));
        assert!(svg.contains("<stop offset=\"1\" stop-color=\"#0000ff\"/>"));
        assert!(svg.contains("fill=\"url(#g0)\""));
    }

    #[test]
    fn faded_composites_carry_opacity() {
        let g = parse_dot(r#"digraph { bb="0,0,10,10"; sv_o [_draw_="e 5 5 5 5 "] }"#).unwrap();
        let mut scene = SceneBuilder::default().build(&g, |_| false);
        let i = scene.node_index(xv_core::NodeId::intern("sv_o")).unwrap();
        let c = scene.composite_mut(i).unwrap();
        c.opacity = 0.5;
        c.offset = kurbo::Vec2::new(3.0, -2.0);
        let svg = render_svg(&scene);
        assert!(svg.contains("<g class=\"node\" id=\"sv_o\" transform=\"translate(3 -2)\" opacity=\"0.5\">"));
    }
}
