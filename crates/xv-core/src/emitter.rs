//! Emitter: Graph → DOT text.
//!
//! Output round-trips through [`crate::parser::parse_dot`]. Nodes and edges
//! are written once at root level, before any subgraph, with their full
//! attribute maps; subgraph bodies only list their members. Re-parsing the
//! output therefore keeps declaration order and memberships.

use crate::model::{Attrs, Graph, Subgraph};

/// Emit a `Graph` as a DOT document.
#[must_use]
pub fn emit_dot(graph: &Graph) -> String {
    let mut out = String::with_capacity(1024);

    if graph.kind.strict {
        out.push_str("strict ");
    }
    out.push_str(if graph.kind.directed { "digraph" } else { "graph" });
    if !graph.name.is_empty() {
        out.push_str(&format!(" {}", quote_id(&graph.name)));
    }
    out.push_str(" {\n");

    emit_decl(&mut out, "graph", &graph.attrs, 1);
    emit_decl(&mut out, "node", &graph.node_defaults, 1);
    emit_decl(&mut out, "edge", &graph.edge_defaults, 1);

    for idx in graph.node_indices() {
        let node = graph.node(idx);
        indent(&mut out, 1);
        out.push_str(&quote_id(node.id.as_str()));
        emit_attr_list(&mut out, &node.attrs);
        out.push_str(";\n");
    }

    for sg in &graph.subgraphs {
        emit_subgraph(&mut out, sg, 1);
    }

    let op = if graph.kind.directed { "->" } else { "--" };
    for e in graph.edge_indices() {
        let Some((tail, head)) = graph.endpoints(e) else {
            continue;
        };
        let data = graph.edge(e);
        indent(&mut out, 1);
        out.push_str(&format!(
            "{} {op} {}",
            quote_id(tail.as_str()),
            quote_id(head.as_str())
        ));
        match &data.key {
            Some(key) => {
                let mut attrs = data.attrs.clone();
                attrs.set("key", key.clone());
                emit_attr_list(&mut out, &attrs);
            }
            None => emit_attr_list(&mut out, &data.attrs),
        }
        out.push_str(";\n");
    }

    out.push_str("}\n");
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn emit_decl(out: &mut String, keyword: &str, attrs: &Attrs, depth: usize) {
    if attrs.is_empty() {
        return;
    }
    indent(out, depth);
    out.push_str(keyword);
    emit_attr_list(out, attrs);
    out.push_str(";\n");
}

fn emit_subgraph(out: &mut String, sg: &Subgraph, depth: usize) {
    indent(out, depth);
    if sg.name.starts_with('%') {
        out.push_str("{\n");
    } else {
        out.push_str(&format!("subgraph {} {{\n", quote_id(&sg.name)));
    }
    emit_decl(out, "graph", &sg.attrs, depth + 1);
    for id in &sg.nodes {
        indent(out, depth + 1);
        out.push_str(&format!("{};\n", quote_id(id.as_str())));
    }
    for child in &sg.subgraphs {
        emit_subgraph(out, child, depth + 1);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn emit_attr_list(out: &mut String, attrs: &Attrs) {
    if attrs.is_empty() {
        return;
    }
    out.push_str(" [");
    for (i, (k, v)) in attrs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{}={}", quote_id(k), quote_id(v)));
    }
    out.push(']');
}

/// Quote a DOT ID unless it is a plain identifier, a numeral or an HTML
/// string.
pub fn quote_id(s: &str) -> String {
    if is_plain_identifier(s) || is_numeral(s) || (s.starts_with('<') && s.ends_with('>')) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            // Backslash sequences are Graphviz escapes and pass through, but
            // an escaped quote must stay escaped.
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                } else {
                    out.push('\\');
                }
            }
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

const KEYWORDS: [&str; 6] = ["graph", "digraph", "subgraph", "node", "edge", "strict"];

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(s))
}

fn is_numeral(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|c| *c == '.').count() <= 1
        && body.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dot;
    use pretty_assertions::assert_eq;

    #[test]
    fn quote_rules() {
        assert_eq!(quote_id("abc_1"), "abc_1");
        assert_eq!(quote_id("-1.5"), "-1.5");
        assert_eq!(quote_id("node"), "\"node\"");
        assert_eq!(quote_id("two words"), "\"two words\"");
        assert_eq!(quote_id("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_id("a\\nb"), "\"a\\nb\"");
        assert_eq!(quote_id("<<b>x</b>>"), "<<b>x</b>>");
        assert_eq!(quote_id(""), "\"\"");
    }

    #[test]
    fn emit_simple_graph() {
        let g = parse_dot("digraph G { node [shape=box]; a -> b [color=red] }").unwrap();
        let out = emit_dot(&g);
        assert_eq!(
            out,
            "digraph G {\n\tnode [shape=box];\n\ta;\n\tb;\n\ta -> b [color=red];\n}\n"
        );
    }

    #[test]
    fn emit_undirected_strict_with_subgraph() {
        let g = parse_dot("strict graph { subgraph cluster_0 { label=\"C 0\"; x } x -- y }").unwrap();
        let out = emit_dot(&g);
        assert!(out.starts_with("strict graph {\n"));
        assert!(out.contains("\tsubgraph cluster_0 {\n\t\tgraph [label=\"C 0\"];\n\t\tx;\n\t}\n"));
        assert!(out.contains("\tx -- y;\n"));
    }

    #[test]
    fn emitted_text_parses_back_to_same_structure() {
        let src = r#"digraph {
            subgraph cluster_a { a1 [label="first\nline"]; subgraph cluster_b { b1 } }
            a1 -> b1 [key=main, _draw_="c 7 -#000000 B 4 1 2 3 4 5 6 7 8 "]
            b1 -> c
        }"#;
        let g = parse_dot(src).unwrap();
        let again = parse_dot(&emit_dot(&g)).unwrap();
        assert_eq!(g.node_ids(), again.node_ids());
        assert_eq!(g.edge_count(), again.edge_count());
        assert_eq!(g.subgraphs, again.subgraphs);
        for (e1, e2) in g.edge_indices().into_iter().zip(again.edge_indices()) {
            assert_eq!(g.edge(e1).attrs, again.edge(e2).attrs);
            assert_eq!(g.edge(e1).key, again.edge(e2).key);
        }
        let a1 = again.find("a1").unwrap();
        assert_eq!(again.node_attr(a1, "label"), "first\\nline");
    }
}
