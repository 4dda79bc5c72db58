//! Parser for the DOT language → `Graph`.
//!
//! Built on `winnow` 0.7. Covers the subset Graphviz itself emits and
//! accepts in practice: `strict`, `graph`/`digraph`, attribute statements,
//! `id = id` graph attributes, node and edge statements (edge chains, ports,
//! subgraph operands), nested and anonymous subgraphs, quoted strings with
//! `\"` escapes, line continuations and `+` concatenation, HTML strings, and
//! `//`, `/* */`, `#` comments.
//!
//! Defaults declared at root level (`node [shape=box]`) become the graph's
//! attribute declarations and are resolved on lookup. Defaults declared
//! inside a subgraph are copied onto the nodes and edges created there.

use crate::error::Error;
use crate::id::NodeId;
use crate::model::{Attrs, Graph, GraphKind, Subgraph};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parse a DOT document into a `Graph`. Only the first graph is read.
#[must_use = "parsing result should be used"]
pub fn parse_dot(source: &str) -> Result<Graph, Error> {
    let mut parser = DotParser { source, anon: 0 };
    let mut rest = source;
    parser.parse_graph(&mut rest)
}

/// Statement scope: the root graph or one subgraph being parsed.
#[derive(Default)]
struct Scope {
    attrs: Attrs,
    node_defaults: Attrs,
    edge_defaults: Attrs,
    members: Vec<NodeId>,
    subgraphs: Vec<Subgraph>,
    nested: bool,
}

impl Scope {
    fn child(&self) -> Scope {
        let (node_defaults, edge_defaults) = if self.nested {
            (self.node_defaults.clone(), self.edge_defaults.clone())
        } else {
            (Attrs::new(), Attrs::new())
        };
        Scope {
            node_defaults,
            edge_defaults,
            nested: true,
            ..Default::default()
        }
    }

    fn add_member(&mut self, id: NodeId) {
        if self.nested && !self.members.contains(&id) {
            self.members.push(id);
        }
    }
}

type Endpoint = (NodeId, Option<String>);

struct DotParser<'s> {
    source: &'s str,
    anon: usize,
}

impl<'s> DotParser<'s> {
    fn error(&self, rest: &str, message: impl Into<String>) -> Error {
        let offset = self.source.len() - rest.len();
        let line = self.source[..offset].matches('\n').count() + 1;
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    fn expect(&self, input: &mut &'s str, c: char) -> Result<(), Error> {
        skip_ws_and_comments(input);
        if input.starts_with(c) {
            *input = &input[c.len_utf8()..];
            Ok(())
        } else {
            let found: String = input.chars().take(12).collect();
            Err(self.error(input, format!("expected `{c}`, found `{found}`")))
        }
    }

    fn parse_graph(&mut self, input: &mut &'s str) -> Result<Graph, Error> {
        skip_ws_and_comments(input);
        let strict = eat_keyword(input, "strict");
        skip_ws_and_comments(input);
        let directed = if eat_keyword(input, "digraph") {
            true
        } else if eat_keyword(input, "graph") {
            false
        } else {
            return Err(self.error(input, "expected `graph` or `digraph`"));
        };
        skip_ws_and_comments(input);
        let name = if input.starts_with('{') {
            String::new()
        } else {
            self.parse_id(input)?
        };
        self.expect(input, '{')?;

        let mut graph = Graph::new(name, GraphKind { directed, strict });
        let mut scope = Scope::default();
        self.parse_stmt_list(input, &mut graph, &mut scope)?;
        self.expect(input, '}')?;

        graph.attrs = scope.attrs;
        graph.node_defaults = scope.node_defaults;
        graph.edge_defaults = scope.edge_defaults;
        graph.subgraphs = scope.subgraphs;
        Ok(graph)
    }

    fn parse_stmt_list(
        &mut self,
        input: &mut &'s str,
        graph: &mut Graph,
        scope: &mut Scope,
    ) -> Result<(), Error> {
        loop {
            skip_ws_and_comments(input);
            if input.is_empty() {
                return Err(self.error(input, "unexpected end of input, missing `}`"));
            }
            if input.starts_with('}') {
                return Ok(());
            }
            self.parse_stmt(input, graph, scope)?;
            skip_ws_and_comments(input);
            if input.starts_with(';') || input.starts_with(',') {
                *input = &input[1..];
            }
        }
    }

    fn parse_stmt(
        &mut self,
        input: &mut &'s str,
        graph: &mut Graph,
        scope: &mut Scope,
    ) -> Result<(), Error> {
        // Attribute statements: graph|node|edge [..]
        for kw in ["graph", "node", "edge"] {
            let checkpoint = *input;
            if eat_keyword(input, kw) {
                skip_ws_and_comments(input);
                if input.starts_with('[') {
                    let attrs = self.parse_attr_list(input)?;
                    match kw {
                        "graph" => scope.attrs.merge(&attrs),
                        "node" => scope.node_defaults.merge(&attrs),
                        _ => scope.edge_defaults.merge(&attrs),
                    }
                    return Ok(());
                }
                *input = checkpoint;
            }
        }

        if peek_keyword(input, "subgraph") || input.starts_with('{') {
            let members = self.parse_subgraph(input, graph, scope)?;
            let first = members.into_iter().map(|m| (m, None)).collect();
            return self.parse_edge_rhs(input, graph, scope, first);
        }

        let id = self.parse_id(input)?;
        skip_ws_and_comments(input);

        if input.starts_with('=') {
            *input = &input[1..];
            skip_ws_and_comments(input);
            let value = self.parse_id(input)?;
            scope.attrs.set(id, value);
            return Ok(());
        }

        let port = self.parse_port(input)?;
        let node_id = NodeId::intern(&id);
        declare_node(graph, scope, node_id);
        skip_ws_and_comments(input);

        if input.starts_with("->") || input.starts_with("--") {
            return self.parse_edge_rhs(input, graph, scope, vec![(node_id, port)]);
        }

        if input.starts_with('[') {
            let attrs = self.parse_attr_list(input)?;
            if let Some(node) = graph.get_by_id_mut(node_id) {
                node.attrs.merge(&attrs);
            }
        }
        Ok(())
    }

    fn parse_edge_rhs(
        &mut self,
        input: &mut &'s str,
        graph: &mut Graph,
        scope: &mut Scope,
        first: Vec<Endpoint>,
    ) -> Result<(), Error> {
        let mut groups: Vec<Vec<Endpoint>> = vec![first];
        loop {
            skip_ws_and_comments(input);
            if !(input.starts_with("->") || input.starts_with("--")) {
                break;
            }
            *input = &input[2..];
            skip_ws_and_comments(input);
            if peek_keyword(input, "subgraph") || input.starts_with('{') {
                let members = self.parse_subgraph(input, graph, scope)?;
                groups.push(members.into_iter().map(|m| (m, None)).collect());
            } else {
                let id = NodeId::intern(&self.parse_id(input)?);
                let port = self.parse_port(input)?;
                declare_node(graph, scope, id);
                groups.push(vec![(id, port)]);
            }
        }

        skip_ws_and_comments(input);
        let mut attrs = if input.starts_with('[') {
            self.parse_attr_list(input)?
        } else {
            Attrs::new()
        };
        let key = attrs.remove("key");

        for pair in groups.windows(2) {
            for (tail, tail_port) in &pair[0] {
                for (head, head_port) in &pair[1] {
                    let e = graph.add_edge(*tail, *head, key.as_deref());
                    let data = graph.edge_mut(e);
                    if scope.nested {
                        data.attrs.merge(&scope.edge_defaults);
                    }
                    data.attrs.merge(&attrs);
                    if let Some(p) = tail_port {
                        data.attrs.set("tailport", p.clone());
                    }
                    if let Some(p) = head_port {
                        data.attrs.set("headport", p.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse `subgraph [name] { .. }` or `{ .. }`; returns all member nodes.
    fn parse_subgraph(
        &mut self,
        input: &mut &'s str,
        graph: &mut Graph,
        parent: &mut Scope,
    ) -> Result<Vec<NodeId>, Error> {
        let mut name = None;
        if eat_keyword(input, "subgraph") {
            skip_ws_and_comments(input);
            if !input.starts_with('{') {
                name = Some(self.parse_id(input)?);
            }
        }
        self.expect(input, '{')?;
        let name = name.unwrap_or_else(|| {
            self.anon += 1;
            format!("%{}", self.anon)
        });

        let mut scope = parent.child();
        if let Some(pos) = parent.subgraphs.iter().position(|s| s.name == name) {
            let existing = parent.subgraphs.remove(pos);
            scope.attrs = existing.attrs;
            scope.members = existing.nodes;
            scope.subgraphs = existing.subgraphs;
        }

        self.parse_stmt_list(input, graph, &mut scope)?;
        self.expect(input, '}')?;

        let members = scope.members.clone();
        for m in &members {
            parent.add_member(*m);
        }
        parent.subgraphs.push(Subgraph {
            name,
            attrs: scope.attrs,
            nodes: scope.members,
            subgraphs: scope.subgraphs,
        });
        Ok(members)
    }

    fn parse_attr_list(&mut self, input: &mut &'s str) -> Result<Attrs, Error> {
        let mut attrs = Attrs::new();
        skip_ws_and_comments(input);
        while input.starts_with('[') {
            *input = &input[1..];
            loop {
                skip_ws_and_comments(input);
                if input.starts_with(']') {
                    *input = &input[1..];
                    break;
                }
                let key = self.parse_id(input)?;
                skip_ws_and_comments(input);
                let value = if input.starts_with('=') {
                    *input = &input[1..];
                    skip_ws_and_comments(input);
                    self.parse_id(input)?
                } else {
                    "true".to_string()
                };
                attrs.set(key, value);
                skip_ws_and_comments(input);
                if input.starts_with(',') || input.starts_with(';') {
                    *input = &input[1..];
                }
            }
            skip_ws_and_comments(input);
        }
        Ok(attrs)
    }

    fn parse_port(&mut self, input: &mut &'s str) -> Result<Option<String>, Error> {
        skip_ws_and_comments(input);
        if !input.starts_with(':') {
            return Ok(None);
        }
        *input = &input[1..];
        skip_ws_and_comments(input);
        let mut port = self.parse_id(input)?;
        skip_ws_and_comments(input);
        if input.starts_with(':') {
            *input = &input[1..];
            skip_ws_and_comments(input);
            port.push(':');
            port.push_str(&self.parse_id(input)?);
        }
        Ok(Some(port))
    }

    /// ID: identifier, numeral, quoted string (with `+` concatenation) or
    /// HTML string.
    fn parse_id(&mut self, input: &mut &'s str) -> Result<String, Error> {
        let start = *input;
        let result = if input.starts_with('"') {
            parse_concatenated(input)
        } else if input.starts_with('<') {
            parse_html.parse_next(input)
        } else if input.starts_with(|c: char| c == '-' || c == '.' || c.is_ascii_digit()) {
            parse_numeral.map(|s: &str| s.to_string()).parse_next(input)
        } else {
            parse_identifier.map(|s: &str| s.to_string()).parse_next(input)
        };
        result.map_err(|_| {
            let found: String = start.chars().take(12).collect();
            self.error(start, format!("expected identifier, found `{found}`"))
        })
    }
}

fn declare_node(graph: &mut Graph, scope: &mut Scope, id: NodeId) {
    let fresh = !graph.contains(id);
    let idx = graph.add_node(id);
    if fresh && scope.nested {
        graph.node_mut(idx).attrs.merge(&scope.node_defaults);
    }
    scope.add_member(id);
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Case-insensitive keyword not followed by an identifier character.
fn peek_keyword(input: &str, kw: &str) -> bool {
    input.len() >= kw.len()
        && input.is_char_boundary(kw.len())
        && input[..kw.len()].eq_ignore_ascii_case(kw)
        && !input[kw.len()..].starts_with(is_id_char)
}

fn eat_keyword(input: &mut &str, kw: &str) -> bool {
    if peek_keyword(input, kw) {
        *input = &input[kw.len()..];
        true
    } else {
        false
    }
}

fn skip_ws_and_comments(input: &mut &str) {
    loop {
        let before = *input;
        *input = input.trim_start();
        if input.starts_with("//") || input.starts_with('#') {
            match input.find('\n') {
                Some(pos) => *input = &input[pos + 1..],
                None => *input = "",
            }
            continue;
        }
        if input.starts_with("/*") {
            match input[2..].find("*/") {
                Some(pos) => *input = &input[pos + 4..],
                None => *input = "",
            }
            continue;
        }
        if *input == before {
            break;
        }
    }
}

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., is_id_char).parse_next(input)
}

fn parse_digits<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '.').parse_next(input)
}

fn parse_numeral<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let start = *input;
    if input.starts_with('-') {
        *input = &input[1..];
    }
    let body = parse_digits(input)?;
    if !body.contains(|c: char| c.is_ascii_digit()) {
        return backtrack();
    }
    Ok(&start[..start.len() - input.len()])
}

/// A double-quoted string. `\"` unescapes, backslash-newline is a line
/// continuation, every other backslash sequence is kept verbatim.
fn parse_quoted(input: &mut &str) -> ModalResult<String> {
    if !input.starts_with('"') {
        return backtrack();
    }
    *input = &input[1..];
    let mut out = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                *input = &input[i + 1..];
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\n')) => {}
                Some((_, '\r')) => {
                    if matches!(chars.peek(), Some((_, '\n'))) {
                        chars.next();
                    }
                }
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    backtrack()
}

fn parse_concatenated(input: &mut &str) -> ModalResult<String> {
    let mut out = parse_quoted(input)?;
    loop {
        let checkpoint = *input;
        skip_ws_and_comments(input);
        if !input.starts_with('+') {
            *input = checkpoint;
            return Ok(out);
        }
        *input = &input[1..];
        skip_ws_and_comments(input);
        out.push_str(&parse_quoted(input)?);
    }
}

/// `<...>` with balanced angle brackets, kept with its delimiters.
fn parse_html(input: &mut &str) -> ModalResult<String> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    let s = input[..=i].to_string();
                    *input = &input[i + 1..];
                    return Ok(s);
                }
            }
            _ => {}
        }
    }
    backtrack()
}
