//! Layout engine adapter.
//!
//! A [`LayoutEngine`] populates the drawing-program attributes and the
//! bounding boxes of every graph object; [`LayoutSession`] remembers the
//! last algorithm and format so a structural change can be followed by
//! `repeat_operations()`.

use crate::error::{Error, ErrorReport};
use crate::model::Graph;

/// The six drawing-program attributes, in channel-bit order.
pub const DRAW_CHANNELS: [&str; 6] = [
    "_draw_", "_ldraw_", "_hdraw_", "_tdraw_", "_hldraw_", "_tldraw_",
];

/// Positional attributes written by a layout pass.
pub const LAYOUT_ATTRS: [&str; 6] = ["pos", "bb", "lp", "xlp", "head_lp", "tail_lp"];

/// Layout and render services over a [`Graph`].
///
/// Engines may record diagnostics in `report`; the session treats any
/// recorded message as a failure of the operation.
pub trait LayoutEngine {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Compute positions with the named algorithm.
    fn layout(
        &mut self,
        graph: &mut Graph,
        algorithm: &str,
        report: &mut ErrorReport,
    ) -> Result<(), Error>;

    /// Produce the drawing-program attributes in `format` from positions.
    fn render(
        &mut self,
        graph: &mut Graph,
        format: &str,
        report: &mut ErrorReport,
    ) -> Result<(), Error>;

    /// Drop everything `layout`/`render` attached to the graph.
    fn free_layout(&mut self, graph: &mut Graph) -> Result<(), Error> {
        clear_layout(graph);
        Ok(())
    }
}

/// Remove drawing programs and positional attributes from every object.
pub fn clear_layout(graph: &mut Graph) {
    graph.for_each_attrs_mut(|attrs| {
        for key in DRAW_CHANNELS.iter().chain(LAYOUT_ATTRS.iter()) {
            attrs.remove(key);
        }
    });
}

/// True when `format` produces drawing programs (`xdot`, `xdot1.4`, ...).
pub fn is_xdot_format(format: &str) -> bool {
    format.starts_with("xdot")
}

/// An engine plus the parameters of the last layout/render calls.
pub struct LayoutSession {
    engine: Box<dyn LayoutEngine>,
    last_algorithm: Option<String>,
    last_format: Option<String>,
    report: ErrorReport,
}

impl LayoutSession {
    pub fn new(engine: Box<dyn LayoutEngine>) -> Self {
        Self {
            engine,
            last_algorithm: None,
            last_format: None,
            report: ErrorReport::new(),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn last_algorithm(&self) -> Option<&str> {
        self.last_algorithm.as_deref()
    }

    pub fn last_format(&self) -> Option<&str> {
        self.last_format.as_deref()
    }

    /// Messages collected by the last operation.
    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    pub fn layout(&mut self, graph: &mut Graph, algorithm: &str) -> Result<(), Error> {
        log::debug!("layout `{algorithm}` with {}", self.engine.name());
        // A stale root `_draw_` would be drawn twice after the new render.
        graph.attrs.remove("_draw_");
        let engine = &mut self.engine;
        self.report
            .run_with_error_report(|report| engine.layout(graph, algorithm, report))
            .map_err(|message| Error::Layout {
                algorithm: algorithm.to_string(),
                message,
            })?;
        self.last_algorithm = Some(algorithm.to_string());
        Ok(())
    }

    pub fn render(&mut self, graph: &mut Graph, format: &str) -> Result<(), Error> {
        log::debug!("render `{format}` with {}", self.engine.name());
        let engine = &mut self.engine;
        self.report
            .run_with_error_report(|report| engine.render(graph, format, report))
            .map_err(|message| Error::Render {
                format: format.to_string(),
                message,
            })?;
        self.last_format = Some(format.to_string());
        Ok(())
    }

    pub fn free_layout(&mut self, graph: &mut Graph) -> Result<(), Error> {
        let engine = &mut self.engine;
        self.report
            .run_with_error_report(|_| engine.free_layout(graph))
            .map_err(Error::FreeLayout)
    }

    /// free → layout(last algorithm) → render(last format).
    pub fn repeat_operations(&mut self, graph: &mut Graph) -> Result<(), Error> {
        let algorithm = self.last_algorithm.clone().ok_or(Error::NoLayout)?;
        let format = self.last_format.clone().ok_or(Error::NoLayout)?;
        self.free_layout(graph)?;
        self.layout(graph, &algorithm)?;
        self.render(graph, &format)
    }
}

impl std::fmt::Debug for LayoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutSession")
            .field("engine", &self.engine.name())
            .field("last_algorithm", &self.last_algorithm)
            .field("last_format", &self.last_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dot;

    /// Records calls; fails `layout` when asked to.
    struct Scripted {
        calls: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
        fail_layout: bool,
        warn: bool,
    }

    impl LayoutEngine for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn layout(&mut self, graph: &mut Graph, algorithm: &str, report: &mut ErrorReport) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("layout {algorithm}"));
            if self.warn {
                report.push("Error: syntax error in line 1");
            }
            if self.fail_layout {
                return Err(Error::Layout {
                    algorithm: algorithm.into(),
                    message: "engine crashed".into(),
                });
            }
            graph.attrs.set("bb", "0,0,10,10");
            Ok(())
        }

        fn render(&mut self, graph: &mut Graph, format: &str, _: &mut ErrorReport) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("render {format}"));
            graph.attrs.set("_ldraw_", "T 1 1 0 1 1 -x ");
            Ok(())
        }

        fn free_layout(&mut self, graph: &mut Graph) -> Result<(), Error> {
            self.calls.borrow_mut().push("free".into());
            clear_layout(graph);
            Ok(())
        }
    }

    fn scripted(fail_layout: bool, warn: bool) -> (LayoutSession, std::rc::Rc<std::cell::RefCell<Vec<String>>>) {
        let calls = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let engine = Scripted {
            calls: calls.clone(),
            fail_layout,
            warn,
        };
        (LayoutSession::new(Box::new(engine)), calls)
    }

    #[test]
    fn clear_layout_strips_channels_and_positions() {
        let mut g = parse_dot(
            r#"digraph { bb="0,0,1,1"; _draw_="c 1 -a "; a [pos="1,2", _ldraw_="x", label=A]; a -> b [_hdraw_="y", lp="3,3"] }"#,
        )
        .unwrap();
        clear_layout(&mut g);
        assert!(g.attrs.is_empty());
        let a = g.find("a").unwrap();
        assert_eq!(g.node(a).attrs.keys().collect::<Vec<_>>(), vec!["label"]);
        assert!(g.edge(g.edge_indices()[0]).attrs.is_empty());
    }

    #[test]
    fn repeat_operations_uses_last_parameters() {
        let (mut session, calls) = scripted(false, false);
        let mut g = parse_dot("digraph { _draw_=\"c 1 -a \"; a }").unwrap();
        assert_eq!(session.repeat_operations(&mut g), Err(Error::NoLayout));

        session.layout(&mut g, "neato").unwrap();
        assert_eq!(g.graph_attr("_draw_"), "");
        session.render(&mut g, "xdot").unwrap();
        session.repeat_operations(&mut g).unwrap();
        assert_eq!(
            *calls.borrow(),
            vec!["layout neato", "render xdot", "free", "layout neato", "render xdot"]
        );
        assert_eq!(session.last_algorithm(), Some("neato"));
    }

    #[test]
    fn collected_messages_fail_the_operation() {
        let (mut session, _) = scripted(false, true);
        let mut g = parse_dot("digraph { a }").unwrap();
        let err = session.layout(&mut g, "dot").unwrap_err();
        assert_eq!(
            err,
            Error::Layout {
                algorithm: "dot".into(),
                message: "Error: syntax error in line 1".into()
            }
        );
        assert_eq!(session.last_algorithm(), None);
    }

    #[test]
    fn engine_error_is_aggregated() {
        let (mut session, _) = scripted(true, false);
        let mut g = parse_dot("digraph { a }").unwrap();
        let err = session.layout(&mut g, "dot").unwrap_err();
        assert!(err.to_string().contains("engine crashed"));
    }
}
