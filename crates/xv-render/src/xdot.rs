//! xdot drawing-program parser.
//!
//! Turns one channel string (`_draw_`, `_ldraw_`, ...) into a flat list of
//! [`DrawOp`]s. Coordinates stay in layout space (Y-up); the interpreter
//! maps them. Strings are byte-counted (`5 -hello`), so a count that lands
//! outside the input or inside a UTF-8 sequence makes the whole program
//! malformed.

use crate::error::RenderError;
use kurbo::Point;
use smallvec::SmallVec;
use winnow::ascii::{dec_uint, float, multispace0};
use winnow::combinator::preceded;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;

/// Control points of a shape op. Most edges are one cubic segment.
pub type Points = SmallVec<[Point; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// One gradient stop: offset in 0..=1 and a color string.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gradient {
    Linear {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
    },
    Radial {
        inner: Point,
        inner_radius: f64,
        outer: Point,
        outer_radius: f64,
        stops: Vec<GradientStop>,
    },
}

impl Gradient {
    pub fn stops(&self) -> &[GradientStop] {
        match self {
            Gradient::Linear { stops, .. } | Gradient::Radial { stops, .. } => stops,
        }
    }
}

/// Font-character flag bits of the `t` op.
pub mod fontchar {
    pub const BOLD: u32 = 1 << 0;
    pub const ITALIC: u32 = 1 << 1;
    pub const UNDERLINE: u32 = 1 << 2;
    pub const SUPERSCRIPT: u32 = 1 << 3;
    pub const SUBSCRIPT: u32 = 1 << 4;
    pub const STRIKE_THROUGH: u32 = 1 << 5;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `E`/`e`: center and half-axes.
    Ellipse {
        filled: bool,
        center: Point,
        rx: f64,
        ry: f64,
    },
    /// `P`/`p`
    Polygon { filled: bool, points: Points },
    /// `L`
    Polyline { points: Points },
    /// `B`/`b`: anchor followed by groups of three control points.
    Bezier { filled: bool, points: Points },
    /// `T`: baseline anchor, alignment and the layout engine's width.
    Text {
        at: Point,
        align: TextAlign,
        width: f64,
        text: String,
    },
    FillColor(String),
    PenColor(String),
    GradientFill(Gradient),
    GradientPen(Gradient),
    Font { size: f64, name: String },
    Style(String),
    FontChar(u32),
    /// `I`: lower-left corner and size.
    Image {
        at: Point,
        width: f64,
        height: f64,
        name: String,
    },
}

impl DrawOp {
    /// True for ops that produce a scene item when replayed.
    pub fn draws(&self) -> bool {
        matches!(
            self,
            DrawOp::Ellipse { .. }
                | DrawOp::Polygon { .. }
                | DrawOp::Polyline { .. }
                | DrawOp::Bezier { .. }
                | DrawOp::Text { .. }
                | DrawOp::Image { .. }
        )
    }
}

/// Parse one drawing program. Whitespace-only input gives no ops.
#[must_use = "parsing result should be used"]
pub fn parse_xdot(source: &str) -> Result<Vec<DrawOp>, RenderError> {
    let mut rest = source;
    let mut ops = Vec::new();
    loop {
        rest = rest.trim_start();
        let Some(tag) = rest.chars().next() else {
            return Ok(ops);
        };
        let at = source.len() - rest.len();
        rest = &rest[tag.len_utf8()..];
        let op = parse_op(tag, &mut rest).map_err(|_| RenderError::Malformed {
            offset: at,
            message: format!("bad `{tag}` operation"),
        })?;
        ops.push(op);
    }
}

fn parse_op(tag: char, input: &mut &str) -> ModalResult<DrawOp> {
    let op = match tag {
        'E' | 'e' => {
            let center = parse_point(input)?;
            let rx = parse_number(input)?;
            let ry = parse_number(input)?;
            DrawOp::Ellipse {
                filled: tag == 'E',
                center,
                rx,
                ry,
            }
        }
        'P' | 'p' => DrawOp::Polygon {
            filled: tag == 'P',
            points: parse_points(input)?,
        },
        'L' => DrawOp::Polyline {
            points: parse_points(input)?,
        },
        'B' | 'b' => DrawOp::Bezier {
            filled: tag == 'b',
            points: parse_points(input)?,
        },
        'T' => {
            let at = parse_point(input)?;
            let align = match parse_number(input)? as i64 {
                -1 => TextAlign::Left,
                0 => TextAlign::Center,
                1 => TextAlign::Right,
                _ => return backtrack(),
            };
            let width = parse_number(input)?;
            DrawOp::Text {
                at,
                align,
                width,
                text: parse_counted(input)?.to_string(),
            }
        }
        'C' | 'c' => {
            let color = parse_counted(input)?;
            match (parse_gradient(color)?, tag) {
                (Some(g), 'C') => DrawOp::GradientFill(g),
                (Some(g), _) => DrawOp::GradientPen(g),
                (None, 'C') => DrawOp::FillColor(color.to_string()),
                (None, _) => DrawOp::PenColor(color.to_string()),
            }
        }
        'F' => {
            let size = parse_number(input)?;
            DrawOp::Font {
                size,
                name: parse_counted(input)?.to_string(),
            }
        }
        'S' => DrawOp::Style(parse_counted(input)?.to_string()),
        't' => DrawOp::FontChar(parse_count(input)? as u32),
        'I' => {
            let at = parse_point(input)?;
            let width = parse_number(input)?;
            let height = parse_number(input)?;
            DrawOp::Image {
                at,
                width,
                height,
                name: parse_counted(input)?.to_string(),
            }
        }
        _ => return backtrack(),
    };
    Ok(op)
}

/// `[x0 y0 x1 y1 n stops]` or `(x0 y0 r0 x1 y1 r1 n stops)`; `None` for a
/// plain color.
fn parse_gradient(color: &str) -> ModalResult<Option<Gradient>> {
    let (linear, body) = match color.as_bytes().first() {
        Some(b'[') => (true, color[1..].strip_suffix(']')),
        Some(b'(') => (false, color[1..].strip_suffix(')')),
        _ => return Ok(None),
    };
    let Some(mut input) = body else {
        return backtrack();
    };
    let input = &mut input;
    let gradient = if linear {
        let start = parse_point(input)?;
        let end = parse_point(input)?;
        Gradient::Linear {
            start,
            end,
            stops: parse_stops(input)?,
        }
    } else {
        let inner = parse_point(input)?;
        let inner_radius = parse_number(input)?;
        let outer = parse_point(input)?;
        let outer_radius = parse_number(input)?;
        Gradient::Radial {
            inner,
            inner_radius,
            outer,
            outer_radius,
            stops: parse_stops(input)?,
        }
    };
    if !input.trim().is_empty() {
        return backtrack();
    }
    Ok(Some(gradient))
}

fn parse_stops(input: &mut &str) -> ModalResult<Vec<GradientStop>> {
    let n = parse_count(input)?;
    (0..n)
        .map(|_| {
            let offset = parse_number(input)?;
            let color = parse_counted(input)?.to_string();
            Ok(GradientStop { offset, color })
        })
        .collect()
}

// ─── Lexical helpers ─────────────────────────────────────────────────────────

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn parse_number(input: &mut &str) -> ModalResult<f64> {
    preceded(multispace0, float).parse_next(input)
}

fn parse_count(input: &mut &str) -> ModalResult<usize> {
    preceded(multispace0, dec_uint).parse_next(input)
}

fn parse_point(input: &mut &str) -> ModalResult<Point> {
    let x = parse_number(input)?;
    let y = parse_number(input)?;
    Ok(Point::new(x, y))
}

fn parse_points(input: &mut &str) -> ModalResult<Points> {
    let n = parse_count(input)?;
    (0..n).map(|_| parse_point(input)).collect()
}

/// `n -bytes`: exactly `n` bytes after the dash.
fn parse_counted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let n = parse_count(input)?;
    let rest = input.trim_start();
    let Some(rest) = rest.strip_prefix('-') else {
        return backtrack();
    };
    if rest.len() < n || !rest.is_char_boundary(n) {
        return backtrack();
    }
    let (text, tail) = rest.split_at(n);
    *input = tail;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    #[test]
    fn parses_node_program() {
        let ops = parse_xdot("c 7 -#ff0000 C 5 -white E 27 18 27 18 ").unwrap();
        assert_eq!(
            ops,
            vec![
                DrawOp::PenColor("#ff0000".into()),
                DrawOp::FillColor("white".into()),
                DrawOp::Ellipse {
                    filled: true,
                    center: Point::new(27.0, 18.0),
                    rx: 27.0,
                    ry: 18.0,
                },
            ]
        );
    }

    #[test]
    fn parses_edge_and_label_ops() {
        let ops = parse_xdot(
            "S 6 -dashed B 4 27 71.7 27 63.98 27 54.71 27 46.11 \
             F 14 11 -Times-Roman T 27 14.3 0 20.21 3 -A\\n t 3 \
             L 2 0 0 5.5 -1e1 p 3 1 2 3 4 5 6",
        )
        .unwrap();
        assert_eq!(ops.len(), 7);
        assert_eq!(ops[0], DrawOp::Style("dashed".into()));
        assert!(matches!(&ops[1], DrawOp::Bezier { filled: false, points } if points.len() == 4));
        assert_eq!(
            ops[2],
            DrawOp::Font {
                size: 14.0,
                name: "Times-Roman".into()
            }
        );
        assert_eq!(
            ops[3],
            DrawOp::Text {
                at: Point::new(27.0, 14.3),
                align: TextAlign::Center,
                width: 20.21,
                text: "A\\n".into(),
            }
        );
        assert_eq!(ops[4], DrawOp::FontChar(3));
        assert_eq!(
            ops[5],
            DrawOp::Polyline {
                points: smallvec![Point::new(0.0, 0.0), Point::new(5.5, -10.0)]
            }
        );
        assert!(matches!(ops[6], DrawOp::Polygon { filled: false, .. }));
    }

    #[test]
    fn strings_are_byte_counted() {
        // "héllo" is 6 bytes; the space inside is part of the text.
        let ops = parse_xdot("T 0 0 -1 30 8 -héllo a  I 1 2 3 4 5 -x.png").unwrap();
        assert!(matches!(&ops[0], DrawOp::Text { text, align: TextAlign::Left, .. } if text == "héllo a"));
        assert!(matches!(&ops[1], DrawOp::Image { name, .. } if name == "x.png"));
        // A count ending inside `é` is rejected.
        assert!(parse_xdot("S 2 -é").is_ok());
        assert!(parse_xdot("S 1 -é").is_err());
        assert!(parse_xdot("S 9 -short").is_err());
    }

    #[test]
    fn parses_gradients() {
        let ops = parse_xdot("C 32 -[0 0 10 10 2 0 3 -red 1 4 -blue] c 26 -(1 1 0 2 2 5 1 0.5 3 -red)")
            .unwrap();
        assert_eq!(
            ops[0],
            DrawOp::GradientFill(Gradient::Linear {
                start: Point::new(0.0, 0.0),
                end: Point::new(10.0, 10.0),
                stops: vec![
                    GradientStop { offset: 0.0, color: "red".into() },
                    GradientStop { offset: 1.0, color: "blue".into() },
                ],
            })
        );
        assert!(matches!(&ops[1], DrawOp::GradientPen(Gradient::Radial { outer_radius, stops, .. })
            if *outer_radius == 5.0 && stops.len() == 1));
    }

    #[test]
    fn malformed_programs_fail_whole() {
        assert_eq!(parse_xdot("   "), Ok(vec![]));
        let err = parse_xdot("c 5 -black Q 1 2").unwrap_err();
        assert!(matches!(err, RenderError::Malformed { offset: 11, .. }));
        assert!(parse_xdot("E 1 2 3").is_err());
        assert!(parse_xdot("T 0 0 2 1 1 -x").is_err());
        assert!(parse_xdot("C 7 -[0 0 1]").is_err());
    }

    #[test]
    fn draws_counts_only_shape_ops() {
        let ops = parse_xdot("c 5 -black S 4 -bold E 0 0 1 1 T 0 0 0 1 1 -x").unwrap();
        assert_eq!(ops.iter().filter(|op| op.draws()).count(), 2);
    }
}
