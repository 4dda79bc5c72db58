//! Layout through the Graphviz command-line tools.
//!
//! `layout` pipes the graph through `dot -K<algorithm> -Tdot` and merges the
//! computed positions back; `render` pipes the positioned graph through
//! `dot -Kneato -n2 -T<format>`, which keeps the given positions and only
//! emits the drawing programs.

use crate::emitter::emit_dot;
use crate::error::{Error, ErrorReport};
use crate::layout::{LayoutEngine, is_xdot_format};
use crate::model::{Graph, Subgraph};
use crate::parser::parse_dot;
use petgraph::stable_graph::EdgeIndex;
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

/// Graphviz child-process engine.
#[derive(Debug, Clone)]
pub struct DotProcess {
    binary: String,
}

impl Default for DotProcess {
    fn default() -> Self {
        Self::new("dot")
    }
}

impl DotProcess {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run the binary with `args`, feeding `input` on stdin.
    ///
    /// Lines on stderr starting with `Error` go to `report`; the rest are
    /// logged as warnings.
    fn run(&self, args: &[String], input: String, report: &mut ErrorReport) -> Result<String, String> {
        log::debug!("running {} {}", self.binary, args.join(" "));
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("cannot run `{}`: {e}", self.binary))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "child stdin unavailable".to_string())?;
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output().map_err(|e| e.to_string())?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("writing graph to `{}`: {e}", self.binary)),
            Err(_) => return Err("stdin writer panicked".to_string()),
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            if line.starts_with("Error") {
                report.push(line);
            } else {
                log::warn!("{}: {line}", self.binary);
            }
        }
        if !output.status.success() {
            return Err(format!("`{}` exited with {}", self.binary, output.status));
        }
        String::from_utf8(output.stdout).map_err(|e| e.to_string())
    }
}

impl LayoutEngine for DotProcess {
    fn name(&self) -> &str {
        "graphviz"
    }

    fn layout(&mut self, graph: &mut Graph, algorithm: &str, report: &mut ErrorReport) -> Result<(), Error> {
        let fail = |message: String| Error::Layout {
            algorithm: algorithm.to_string(),
            message,
        };
        let args = vec![format!("-K{algorithm}"), "-Tdot".to_string()];
        let out = self.run(&args, emit_dot(graph), report).map_err(fail)?;
        let laid_out = parse_dot(&out).map_err(|e| fail(e.to_string()))?;
        merge_attrs(graph, &laid_out);
        Ok(())
    }

    fn render(&mut self, graph: &mut Graph, format: &str, report: &mut ErrorReport) -> Result<(), Error> {
        let fail = |message: String| Error::Render {
            format: format.to_string(),
            message,
        };
        if !is_xdot_format(format) {
            return Err(fail("only xdot formats carry drawing programs".into()));
        }
        let args = vec!["-Kneato".to_string(), "-n2".to_string(), format!("-T{format}")];
        let out = self.run(&args, emit_dot(graph), report).map_err(fail)?;
        let rendered = parse_dot(&out).map_err(|e| fail(e.to_string()))?;
        merge_attrs(graph, &rendered);
        Ok(())
    }
}

/// Copy every attribute of `from` onto the matching objects of `into`.
///
/// Nodes match by name, subgraphs by name, and edges by endpoints, pairing
/// parallel edges in declaration order.
pub fn merge_attrs(into: &mut Graph, from: &Graph) {
    into.attrs.merge(&from.attrs);

    for idx in from.node_indices() {
        let node = from.node(idx);
        if let Some(target) = into.get_by_id_mut(node.id) {
            target.attrs.merge(&node.attrs);
        }
    }

    let mut targets: HashMap<_, Vec<EdgeIndex>> = HashMap::new();
    for e in into.edge_indices() {
        if let Some(ends) = into.endpoints(e) {
            targets.entry(ends).or_default().push(e);
        }
    }
    let mut cursor: HashMap<_, usize> = HashMap::new();
    for e in from.edge_indices() {
        let Some(ends) = from.endpoints(e) else {
            continue;
        };
        let n = cursor.entry(ends).or_insert(0);
        if let Some(target) = targets.get(&ends).and_then(|v| v.get(*n)) {
            into.edge_mut(*target).attrs.merge(&from.edge(e).attrs);
        }
        *n += 1;
    }

    let mut pending: Vec<&Subgraph> = Vec::new();
    from.visit_subgraphs(|sg, _| pending.push(sg));
    for sg in pending {
        if let Some(target) = into.subgraph_mut(&sg.name) {
            target.attrs.merge(&sg.attrs);
        }
    }
}
