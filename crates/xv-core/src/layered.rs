//! Deterministic built-in layout engine.
//!
//! Ranks nodes by breadth-first depth from the sources, stacks the ranks
//! top to bottom and spaces the nodes of a rank left to right. `render`
//! turns the resulting positions into xdot drawing programs using the same
//! conventions Graphviz does (Y-up points, byte-counted strings), so the
//! whole fold → relayout → rebuild cycle runs without Graphviz installed.

use crate::error::{Error, ErrorReport};
use crate::id::NodeId;
use crate::layout::{LayoutEngine, is_xdot_format};
use crate::model::{BoundingBox, Graph, Subgraph, fmt_num};
use petgraph::stable_graph::NodeIndex;
use std::collections::{HashMap, VecDeque};

const POINTS_PER_INCH: f64 = 72.0;
const DEFAULT_FONT: &str = "Times-Roman";
const DEFAULT_FONT_SIZE: f64 = 14.0;
const ARROW_LENGTH: f64 = 10.0;
const CLUSTER_PAD: f64 = 8.0;

/// Approximate advance width of `text` at `size`, in points.
pub fn estimate_text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * 0.6
}

/// Line height for a font of `size` points.
pub fn line_height(size: f64) -> f64 {
    size * 1.2
}

#[derive(Debug, Clone)]
pub struct LayeredLayout {
    /// Vertical gap between ranks, in points.
    pub rank_sep: f64,
    /// Horizontal gap between nodes of a rank, in points.
    pub node_sep: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            rank_sep: 36.0,
            node_sep: 18.0,
        }
    }
}

// ─── Layout ──────────────────────────────────────────────────────────────

impl LayeredLayout {
    /// Breadth-first rank of every node. Nodes only reachable through a
    /// cycle start a new search at rank 0.
    fn ranks(graph: &Graph) -> Vec<Vec<NodeIndex>> {
        let order = graph.node_indices();
        let mut indegree: HashMap<NodeIndex, usize> = order.iter().map(|i| (*i, 0)).collect();
        for e in graph.edge_indices() {
            let Some((t, h)) = graph.endpoints(e) else {
                continue;
            };
            if t != h {
                if let Some(hi) = graph.index_of(h) {
                    *indegree.entry(hi).or_default() += 1;
                }
            }
        }

        let mut rank: HashMap<NodeIndex, usize> = HashMap::new();
        let sources = order.iter().filter(|i| indegree[*i] == 0);
        let rest = order.iter();
        for start in sources.chain(rest) {
            if rank.contains_key(start) {
                continue;
            }
            rank.insert(*start, 0);
            let mut queue = VecDeque::from([*start]);
            while let Some(v) = queue.pop_front() {
                let r = rank[&v];
                for e in graph.out_edges(v) {
                    let Some((_, head)) = graph.endpoints(e) else {
                        continue;
                    };
                    let Some(hi) = graph.index_of(head) else {
                        continue;
                    };
                    if !rank.contains_key(&hi) {
                        rank.insert(hi, r + 1);
                        queue.push_back(hi);
                    }
                }
            }
        }

        let depth = rank.values().copied().max().map_or(0, |m| m + 1);
        let mut rows = vec![Vec::new(); depth];
        for idx in order {
            rows[rank[&idx]].push(idx);
        }
        rows
    }

    /// Width and height in points from the label and explicit size attrs.
    fn node_size(graph: &Graph, idx: NodeIndex) -> (f64, f64) {
        let size = font_size(graph.node_attr(idx, "fontsize"));
        let lines = label_lines(&node_label(graph, idx));
        let text_w = lines
            .iter()
            .map(|l| estimate_text_width(l, size))
            .fold(0.0, f64::max);
        let text_h = lines.len() as f64 * line_height(size);
        let inches = |key: &str| graph.node_attr(idx, key).parse::<f64>().ok();
        let mut w = (text_w + 16.0).max(inches("width").unwrap_or(0.75) * POINTS_PER_INCH);
        let mut h = (text_h + 8.0).max(inches("height").unwrap_or(0.5) * POINTS_PER_INCH);
        if graph.node_attr(idx, "shape") == "point" {
            w = 3.6;
            h = 3.6;
        }
        // Round through the stored inch values so render sees the same size.
        w = round_inches(w) * POINTS_PER_INCH;
        h = round_inches(h) * POINTS_PER_INCH;
        (w, h)
    }
}

fn round_inches(points: f64) -> f64 {
    (points / POINTS_PER_INCH * 100.0).ceil() / 100.0
}

fn cluster_depth(sgs: &[Subgraph]) -> usize {
    sgs.iter()
        .map(|sg| usize::from(sg.is_cluster()) + cluster_depth(&sg.subgraphs))
        .max()
        .unwrap_or(0)
}

/// Assign `bb` to every cluster; returns the union of `sg` and its children.
fn place_clusters(sg: &mut Subgraph, boxes: &HashMap<NodeId, BoundingBox>) -> Option<BoundingBox> {
    let mut acc: Option<BoundingBox> = None;
    for id in &sg.nodes {
        if let Some(b) = boxes.get(id) {
            acc = Some(union(acc, *b));
        }
    }
    for child in &mut sg.subgraphs {
        if let Some(b) = place_clusters(child, boxes) {
            acc = Some(union(acc, b));
        }
    }
    if sg.is_cluster() {
        let padded = acc.map(|b| BoundingBox {
            llx: b.llx - CLUSTER_PAD,
            lly: b.lly - CLUSTER_PAD,
            urx: b.urx + CLUSTER_PAD,
            ury: b.ury + CLUSTER_PAD,
        });
        match padded {
            Some(b) => sg.attrs.set("bb", b.to_attr()),
            None => {
                sg.attrs.remove("bb");
            }
        }
        return padded;
    }
    acc
}

fn union(acc: Option<BoundingBox>, b: BoundingBox) -> BoundingBox {
    match acc {
        None => b,
        Some(a) => BoundingBox {
            llx: a.llx.min(b.llx),
            lly: a.lly.min(b.lly),
            urx: a.urx.max(b.urx),
            ury: a.ury.max(b.ury),
        },
    }
}

/// Point where the ray from the node center toward `(dx, dy)` leaves its
/// outline.
fn boundary(center: (f64, f64), size: (f64, f64), elliptic: bool, dx: f64, dy: f64) -> (f64, f64) {
    let (hw, hh) = (size.0 / 2.0, size.1 / 2.0);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 || hw == 0.0 || hh == 0.0 {
        return center;
    }
    let t = if elliptic {
        1.0 / ((dx / hw).powi(2) + (dy / hh).powi(2)).sqrt()
    } else {
        let tx = if dx == 0.0 { f64::INFINITY } else { hw / dx.abs() };
        let ty = if dy == 0.0 { f64::INFINITY } else { hh / dy.abs() };
        tx.min(ty)
    };
    (center.0 + dx * t, center.1 + dy * t)
}

fn is_elliptic(shape: &str) -> bool {
    matches!(shape, "" | "ellipse" | "oval" | "circle" | "point" | "doublecircle")
}

fn fmt_point(p: (f64, f64)) -> String {
    format!("{},{}", fmt_num(p.0), fmt_num(p.1))
}

impl LayeredLayout {
    fn run_layout(&self, graph: &mut Graph) {
        let rows = Self::ranks(graph);
        let margin = 4.0 + CLUSTER_PAD * cluster_depth(&graph.subgraphs) as f64;

        let sizes: HashMap<NodeIndex, (f64, f64)> = graph
            .node_indices()
            .into_iter()
            .map(|i| (i, Self::node_size(graph, i)))
            .collect();

        let row_width = |row: &Vec<NodeIndex>| {
            let sum: f64 = row.iter().map(|i| sizes[i].0).sum();
            sum + self.node_sep * row.len().saturating_sub(1) as f64
        };
        let row_height = |row: &Vec<NodeIndex>| row.iter().map(|i| sizes[i].1).fold(0.0, f64::max);

        let content_w = rows.iter().map(row_width).fold(0.0, f64::max);
        let content_h: f64 = rows.iter().map(row_height).sum::<f64>()
            + self.rank_sep * rows.len().saturating_sub(1) as f64;
        let width = content_w + 2.0 * margin;
        let height = content_h + 2.0 * margin;

        // Centers in Y-down space, flipped to Y-up when stored.
        let mut centers: HashMap<NodeIndex, (f64, f64)> = HashMap::new();
        let mut top = margin;
        for row in &rows {
            let rh = row_height(row);
            let mut x = margin + (content_w - row_width(row)) / 2.0;
            for idx in row {
                let (w, _) = sizes[idx];
                centers.insert(*idx, (x + w / 2.0, height - (top + rh / 2.0)));
                x += w + self.node_sep;
            }
            top += rh + self.rank_sep;
        }

        let mut boxes: HashMap<NodeId, BoundingBox> = HashMap::new();
        for (idx, (cx, cy)) in &centers {
            let (w, h) = sizes[idx];
            let node = graph.node_mut(*idx);
            node.attrs.set("pos", fmt_point((*cx, *cy)));
            node.attrs.set("width", fmt_num(w / POINTS_PER_INCH));
            node.attrs.set("height", fmt_num(h / POINTS_PER_INCH));
            boxes.insert(
                node.id,
                BoundingBox {
                    llx: cx - w / 2.0,
                    lly: cy - h / 2.0,
                    urx: cx + w / 2.0,
                    ury: cy + h / 2.0,
                },
            );
        }

        for e in graph.edge_indices() {
            let Some((t, h)) = graph.endpoints(e) else {
                continue;
            };
            let (Some(ti), Some(hi)) = (graph.index_of(t), graph.index_of(h)) else {
                continue;
            };
            let pos = self.edge_spline(graph, (ti, centers[&ti], sizes[&ti]), (hi, centers[&hi], sizes[&hi]));
            let has_label = !graph.edge_attr(e, "label").is_empty();
            let lp = has_label.then(|| {
                let (a, b) = (centers[&ti], centers[&hi]);
                fmt_point(((a.0 + b.0) / 2.0 + 8.0, (a.1 + b.1) / 2.0))
            });
            let data = graph.edge_mut(e);
            data.attrs.set("pos", pos);
            if let Some(lp) = lp {
                data.attrs.set("lp", lp);
            }
        }

        for sg in &mut graph.subgraphs {
            place_clusters(sg, &boxes);
        }
        let bb = BoundingBox {
            llx: 0.0,
            lly: 0.0,
            urx: width,
            ury: height,
        };
        graph.attrs.set("bb", bb.to_attr());
        log::debug!(
            "layered layout: {} ranks, {} nodes, bb {}",
            rows.len(),
            centers.len(),
            bb.to_attr()
        );
    }

    /// Edge `pos`: a single cubic segment between the two outlines, with
    /// an `e,` arrow end point for directed graphs.
    fn edge_spline(
        &self,
        graph: &Graph,
        tail: (NodeIndex, (f64, f64), (f64, f64)),
        head: (NodeIndex, (f64, f64), (f64, f64)),
    ) -> String {
        let directed = graph.kind.directed;
        let (ti, tc, ts) = tail;
        let (hi, hc, hs) = head;

        let points: [(f64, f64); 4];
        let end: (f64, f64);
        if ti == hi {
            let x = tc.0 + ts.0 / 2.0;
            points = [
                (x, tc.1 + 6.0),
                (x + 36.0, tc.1 + 24.0),
                (x + 36.0, tc.1 - 24.0),
                (x + if directed { ARROW_LENGTH } else { 0.0 }, tc.1 - 6.0),
            ];
            end = (x, tc.1 - 6.0);
        } else {
            let (dx, dy) = (hc.0 - tc.0, hc.1 - tc.1);
            let start = boundary(tc, ts, is_elliptic(graph.node_attr(ti, "shape")), dx, dy);
            end = boundary(hc, hs, is_elliptic(graph.node_attr(hi, "shape")), -dx, -dy);
            let len = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
            let p3 = if directed && len > ARROW_LENGTH {
                let k = (len - ARROW_LENGTH) / len;
                (start.0 + (end.0 - start.0) * k, start.1 + (end.1 - start.1) * k)
            } else {
                end
            };
            let lerp = |f: f64| (start.0 + (p3.0 - start.0) * f, start.1 + (p3.1 - start.1) * f);
            points = [start, lerp(1.0 / 3.0), lerp(2.0 / 3.0), p3];
        }

        let mut pos = String::new();
        if directed {
            pos.push_str(&format!("e,{} ", fmt_point(end)));
        }
        let pts: Vec<String> = points.iter().map(|p| fmt_point(*p)).collect();
        pos.push_str(&pts.join(" "));
        pos
    }
}

// ─── Render ──────────────────────────────────────────────────────────────

/// Builds an xdot drawing program.
#[derive(Debug, Default)]
struct XdotWriter(String);

impl XdotWriter {
    fn string(&mut self, s: &str) {
        self.0.push_str(&format!("{} -{} ", s.len(), s));
    }

    fn pen_color(&mut self, color: &str) {
        self.0.push_str("c ");
        self.string(color);
    }

    fn fill_color(&mut self, color: &str) {
        self.0.push_str("C ");
        self.string(color);
    }

    fn style(&mut self, style: &str) {
        self.0.push_str("S ");
        self.string(style);
    }

    fn ellipse(&mut self, filled: bool, c: (f64, f64), rx: f64, ry: f64) {
        let op = if filled { 'E' } else { 'e' };
        self.0.push_str(&format!(
            "{op} {} {} {} {} ",
            fmt_num(c.0),
            fmt_num(c.1),
            fmt_num(rx),
            fmt_num(ry)
        ));
    }

    fn points(&mut self, op: char, pts: &[(f64, f64)]) {
        self.0.push_str(&format!("{op} {} ", pts.len()));
        for p in pts {
            self.0.push_str(&format!("{} {} ", fmt_num(p.0), fmt_num(p.1)));
        }
    }

    fn font(&mut self, size: f64, name: &str) {
        self.0.push_str(&format!("F {} ", fmt_num(size)));
        self.string(name);
    }

    /// Centered text lines around `center`.
    fn label(&mut self, center: (f64, f64), lines: &[String], size: f64) {
        let lh = line_height(size);
        let top = center.1 + lines.len() as f64 * lh / 2.0;
        for (i, line) in lines.iter().enumerate() {
            let y = top - (i + 1) as f64 * lh;
            self.0.push_str(&format!(
                "T {} {} 0 {} ",
                fmt_num(center.0),
                fmt_num(y),
                fmt_num(estimate_text_width(line, size))
            ));
            self.string(line);
        }
    }

    fn finish(self) -> String {
        self.0
    }
}

fn font_size(attr: &str) -> f64 {
    attr.parse::<f64>()
        .ok()
        .filter(|s| *s > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn node_label(graph: &Graph, idx: NodeIndex) -> String {
    let name = graph.node(idx).id.as_str();
    match graph.node_attr(idx, "label") {
        "" | "\\N" => name.to_string(),
        label => label.replace("\\N", name),
    }
}

/// Split on Graphviz line escapes (`\n`, `\l`, `\r`).
fn label_lines(label: &str) -> Vec<String> {
    let normalized = label.replace("\\l", "\\n").replace("\\r", "\\n");
    let mut lines: Vec<String> = normalized.split("\\n").map(str::to_string).collect();
    if lines.len() > 1 && lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn parse_point(s: &str) -> Option<(f64, f64)> {
    let s = s.trim_end_matches('!');
    let (x, y) = s.split_once(',')?;
    let y = y.split(',').next()?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Emit `S` ops for the pen-relevant style tokens; returns (filled, invisible).
fn apply_style(w: &mut XdotWriter, style: &str) -> (bool, bool) {
    let mut filled = false;
    let mut invisible = false;
    for token in style.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token {
            "filled" => filled = true,
            "invis" | "invisible" => invisible = true,
            "dashed" | "dotted" | "bold" | "solid" => w.style(token),
            _ => {}
        }
    }
    (filled, invisible)
}

impl LayeredLayout {
    fn render_node(graph: &Graph, idx: NodeIndex, report: &mut ErrorReport) -> Option<(String, String)> {
        let name = graph.node(idx).id;
        let Some(c) = parse_point(graph.node_attr(idx, "pos")) else {
            report.push(format!("Error: node {name} has no position"));
            return None;
        };
        let inches = |key: &str, def: f64| graph.node_attr(idx, key).parse::<f64>().unwrap_or(def);
        let (w, h) = (
            inches("width", 0.75) * POINTS_PER_INCH,
            inches("height", 0.5) * POINTS_PER_INCH,
        );
        let (x0, y0, x1, y1) = (c.0 - w / 2.0, c.1 - h / 2.0, c.0 + w / 2.0, c.1 + h / 2.0);

        let mut draw = XdotWriter::default();
        let (filled, invisible) = apply_style(&mut draw, graph.node_attr(idx, "style"));
        if invisible {
            return Some((String::new(), String::new()));
        }
        let color = or_default(graph.node_attr(idx, "color"), "black");
        draw.pen_color(color);
        if filled {
            let fill = or_default(graph.node_attr(idx, "fillcolor"), or_default(graph.node_attr(idx, "color"), "lightgrey"));
            draw.fill_color(fill);
        }
        let shape = graph.node_attr(idx, "shape");
        let fill_op = |closed: char| if filled { closed.to_ascii_uppercase() } else { closed };
        match shape {
            "box" | "rect" | "rectangle" | "square" => {
                draw.points(fill_op('p'), &[(x0, y0), (x1, y0), (x1, y1), (x0, y1)]);
            }
            "folder" => {
                let tab_h = h * 0.15;
                let tab_w = w * 0.4;
                draw.points(
                    fill_op('p'),
                    &[
                        (x0, y0),
                        (x1, y0),
                        (x1, y1 - tab_h),
                        (x0 + tab_w + tab_h, y1 - tab_h),
                        (x0 + tab_w, y1),
                        (x0, y1),
                    ],
                );
            }
            "plaintext" | "plain" | "none" => {}
            "point" => {
                draw.fill_color(color);
                draw.ellipse(true, c, w / 2.0, h / 2.0);
            }
            "circle" | "doublecircle" => {
                let r = w.max(h) / 2.0;
                draw.ellipse(filled, c, r, r);
            }
            _ => draw.ellipse(filled, c, w / 2.0, h / 2.0),
        }

        let mut ldraw = XdotWriter::default();
        if shape != "point" {
            let size = font_size(graph.node_attr(idx, "fontsize"));
            ldraw.font(size, or_default(graph.node_attr(idx, "fontname"), DEFAULT_FONT));
            ldraw.pen_color(or_default(graph.node_attr(idx, "fontcolor"), "black"));
            ldraw.label(c, &label_lines(&node_label(graph, idx)), size);
        }
        Some((draw.finish(), ldraw.finish()))
    }

    fn render_edge(graph: &mut Graph, e: petgraph::stable_graph::EdgeIndex, report: &mut ErrorReport) {
        let pos = graph.edge_attr(e, "pos").to_string();
        let mut end = None;
        let mut points = Vec::new();
        for token in pos.split_whitespace() {
            if let Some(rest) = token.strip_prefix("e,") {
                end = parse_point(rest);
            } else if token.starts_with("s,") {
                continue;
            } else if let Some(p) = parse_point(token) {
                points.push(p);
            }
        }
        if points.len() < 4 {
            let (t, h) = graph.endpoints(e).map_or(("?".into(), "?".into()), |(t, h)| (t.to_string(), h.to_string()));
            report.push(format!("Error: edge {t} -> {h} has no spline"));
            return;
        }

        let mut draw = XdotWriter::default();
        let (_, invisible) = apply_style(&mut draw, graph.edge_attr(e, "style"));
        if invisible {
            return;
        }
        let color = or_default(graph.edge_attr(e, "color"), "black").to_string();
        draw.pen_color(&color);
        draw.points('B', &points);

        let mut hdraw = XdotWriter::default();
        if let (Some(tip), Some(last)) = (end, points.last().copied()) {
            let (dx, dy) = (tip.0 - last.0, tip.1 - last.1);
            let len = (dx * dx + dy * dy).sqrt();
            if len > 0.0 {
                let (nx, ny) = (-dy / len * 3.5, dx / len * 3.5);
                hdraw.style("solid");
                hdraw.pen_color(&color);
                hdraw.fill_color(&color);
                hdraw.points('P', &[(last.0 + nx, last.1 + ny), tip, (last.0 - nx, last.1 - ny)]);
            }
        }

        let mut ldraw = XdotWriter::default();
        let label = graph.edge_attr(e, "label").to_string();
        if let Some(lp) = parse_point(graph.edge_attr(e, "lp")).filter(|_| !label.is_empty()) {
            let size = font_size(graph.edge_attr(e, "fontsize"));
            ldraw.font(size, or_default(graph.edge_attr(e, "fontname"), DEFAULT_FONT));
            ldraw.pen_color(or_default(graph.edge_attr(e, "fontcolor"), "black"));
            ldraw.label(lp, &label_lines(&label), size);
        }

        let attrs = &mut graph.edge_mut(e).attrs;
        attrs.set("_draw_", draw.finish());
        for (key, program) in [("_hdraw_", hdraw.finish()), ("_ldraw_", ldraw.finish())] {
            if program.is_empty() {
                attrs.remove(key);
            } else {
                attrs.set(key, program);
            }
        }
    }
}

fn render_cluster(sg: &mut Subgraph) {
    for child in &mut sg.subgraphs {
        render_cluster(child);
    }
    if !sg.is_cluster() {
        return;
    }
    let Some(bb) = sg.attrs.get("bb").and_then(BoundingBox::parse) else {
        return;
    };
    let get = |k: &str| sg.attrs.get(k).unwrap_or("").to_string();
    let mut draw = XdotWriter::default();
    let (filled, _) = apply_style(&mut draw, &get("style"));
    let pen = get("pencolor");
    let color = get("color");
    draw.pen_color(or_default(&pen, or_default(&color, "black")));
    if filled {
        draw.fill_color(or_default(&get("fillcolor"), or_default(&color, "lightgrey")));
    }
    let rect = [(bb.llx, bb.lly), (bb.urx, bb.lly), (bb.urx, bb.ury), (bb.llx, bb.ury)];
    draw.points(if filled { 'P' } else { 'p' }, &rect);

    let label = get("label");
    let mut ldraw = XdotWriter::default();
    if !label.is_empty() {
        let size = font_size(&get("fontsize"));
        let lines = label_lines(&label);
        let block = lines.len() as f64 * line_height(size);
        ldraw.font(size, or_default(&get("fontname"), DEFAULT_FONT));
        ldraw.pen_color(or_default(&get("fontcolor"), "black"));
        ldraw.label(((bb.llx + bb.urx) / 2.0, bb.ury - block / 2.0 - 2.0), &lines, size);
    }
    sg.attrs.set("_draw_", draw.finish());
    let ldraw = ldraw.finish();
    if ldraw.is_empty() {
        sg.attrs.remove("_ldraw_");
    } else {
        sg.attrs.set("_ldraw_", ldraw);
    }
}

impl LayoutEngine for LayeredLayout {
    fn name(&self) -> &str {
        "layered"
    }

    fn layout(&mut self, graph: &mut Graph, algorithm: &str, _report: &mut ErrorReport) -> Result<(), Error> {
        if algorithm.is_empty() {
            return Err(Error::Layout {
                algorithm: algorithm.to_string(),
                message: "empty algorithm name".into(),
            });
        }
        log::debug!("layered engine stands in for `{algorithm}`");
        self.run_layout(graph);
        Ok(())
    }

    fn render(&mut self, graph: &mut Graph, format: &str, report: &mut ErrorReport) -> Result<(), Error> {
        if !is_xdot_format(format) {
            return Err(Error::Render {
                format: format.to_string(),
                message: "only xdot formats carry drawing programs".into(),
            });
        }
        if BoundingBox::parse(graph.graph_attr("bb")).is_none() {
            return Err(Error::Render {
                format: format.to_string(),
                message: "graph has no layout".into(),
            });
        }

        for idx in graph.node_indices() {
            let Some((draw, ldraw)) = Self::render_node(graph, idx, report) else {
                continue;
            };
            let attrs = &mut graph.node_mut(idx).attrs;
            for (key, program) in [("_draw_", draw), ("_ldraw_", ldraw)] {
                if program.is_empty() {
                    attrs.remove(key);
                } else {
                    attrs.set(key, program);
                }
            }
        }

        for e in graph.edge_indices() {
            Self::render_edge(graph, e, report);
        }

        for sg in &mut graph.subgraphs {
            render_cluster(sg);
        }

        let label = graph.graph_attr("label").to_string();
        if label.is_empty() {
            graph.attrs.remove("_ldraw_");
        } else if let Some(bb) = BoundingBox::parse(graph.graph_attr("bb")) {
            let size = font_size(graph.graph_attr("fontsize"));
            let mut ldraw = XdotWriter::default();
            ldraw.font(size, or_default(graph.graph_attr("fontname"), DEFAULT_FONT));
            ldraw.pen_color(or_default(graph.graph_attr("fontcolor"), "black"));
            ldraw.label(((bb.llx + bb.urx) / 2.0, bb.lly + line_height(size) / 2.0 + 2.0), &label_lines(&label), size);
            graph.attrs.set("_ldraw_", ldraw.finish());
        }
        graph.attrs.set("xdotversion", "1.7");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dot;

    fn laid_out(src: &str) -> Graph {
        let mut g = parse_dot(src).unwrap();
        let mut engine = LayeredLayout::default();
        let mut report = ErrorReport::new();
        engine.layout(&mut g, "dot", &mut report).unwrap();
        engine.render(&mut g, "xdot", &mut report).unwrap();
        assert!(report.is_empty());
        g
    }

    fn pos(g: &Graph, name: &str) -> (f64, f64) {
        parse_point(g.node_attr(g.find(name).unwrap(), "pos")).unwrap()
    }

    #[test]
    fn ranks_stack_top_to_bottom() {
        let g = laid_out("digraph { ly_a -> ly_b -> ly_c; ly_a -> ly_d }");
        let (a, b, c, d) = (pos(&g, "ly_a"), pos(&g, "ly_b"), pos(&g, "ly_c"), pos(&g, "ly_d"));
        // Y-up: deeper ranks have smaller y.
        assert!(a.1 > b.1 && b.1 > c.1);
        assert_eq!(b.1, d.1);
        assert!(b.0 < d.0);
        let bb = BoundingBox::parse(g.graph_attr("bb")).unwrap();
        assert_eq!((bb.llx, bb.lly), (0.0, 0.0));
        assert!(bb.ury > a.1);
    }

    #[test]
    fn cycles_do_not_hang() {
        let g = laid_out("digraph { cy_a -> cy_b -> cy_a; cy_b -> cy_b }");
        assert!(pos(&g, "cy_a").1 > pos(&g, "cy_b").1);
        for e in g.edge_indices() {
            assert!(g.edge_attr(e, "_draw_").contains("B 4 "));
        }
    }

    #[test]
    fn render_writes_shapes_and_labels() {
        let g = laid_out(
            r#"digraph {
                rw_e [label="two\nlines"];
                rw_b [shape=box, style=filled, fillcolor=yellow];
                rw_f [shape=folder];
                rw_e -> rw_b [label=go];
            }"#,
        );
        let draw = |n: &str| g.node_attr(g.find(n).unwrap(), "_draw_").to_string();
        assert!(draw("rw_e").starts_with("c 5 -black e "));
        assert!(draw("rw_b").contains("C 6 -yellow P 4 "));
        assert!(draw("rw_f").contains("p 6 "));
        let ldraw = g.node_attr(g.find("rw_e").unwrap(), "_ldraw_");
        assert!(ldraw.starts_with("F 14 11 -Times-Roman c 5 -black T "));
        assert!(ldraw.contains("3 -two") && ldraw.contains("5 -lines"));

        let e = g.edge_indices()[0];
        assert!(g.edge_attr(e, "_hdraw_").starts_with("S 5 -solid c 5 -black C 5 -black P 3 "));
        assert!(g.edge_attr(e, "_ldraw_").contains("2 -go"));
        assert_eq!(g.graph_attr("xdotversion"), "1.7");
    }

    #[test]
    fn clusters_get_frames_inside_the_root_box() {
        let g = laid_out(
            "digraph { subgraph cluster_o { label=Outer; subgraph cluster_i { cl_a } cl_b } cl_a -> cl_b }",
        );
        let outer = BoundingBox::parse(g.subgraphs[0].attrs.get("bb").unwrap()).unwrap();
        let inner = BoundingBox::parse(g.subgraphs[0].subgraphs[0].attrs.get("bb").unwrap()).unwrap();
        let root = BoundingBox::parse(g.graph_attr("bb")).unwrap();
        assert!(outer.llx < inner.llx && outer.ury > inner.ury);
        assert!(root.llx <= outer.llx && root.ury >= outer.ury);
        assert!(g.subgraphs[0].attrs.get("_draw_").unwrap().contains("p 4 "));
        assert!(g.subgraphs[0].attrs.get("_ldraw_").unwrap().contains("5 -Outer"));
    }

    #[test]
    fn render_without_layout_fails() {
        let mut g = parse_dot("digraph { a }").unwrap();
        let err = LayeredLayout::default()
            .render(&mut g, "xdot", &mut ErrorReport::new())
            .unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn undirected_edges_have_no_arrowheads() {
        let g = laid_out("graph { ud_a -- ud_b }");
        let e = g.edge_indices()[0];
        assert!(!g.edge_attr(e, "pos").starts_with("e,"));
        assert_eq!(g.edge_attr(e, "_hdraw_"), "");
    }
}
