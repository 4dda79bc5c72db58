//! A graph together with its side buffer and layout engine.
//!
//! `GraphSession` is the single owner of the mutable graph state. Every
//! structural change goes through it so the layout can be discarded and
//! recomputed afterwards, and so a failed step can be rolled back.

use crate::config::{FoldConfig, LayoutConfig};
use crate::error::Error;
use crate::fold::{FoldOutcome, SideBuffer};
use crate::id::NodeId;
use crate::layout::{LayoutEngine, LayoutSession};
use crate::model::Graph;
use crate::parser::parse_dot;

/// What a fold toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Folded { absorbed: Vec<NodeId> },
    Unfolded { restored: Vec<NodeId> },
    /// Folding a node without outgoing edges; nothing changed.
    NoOp,
}

impl Toggle {
    pub fn is_noop(&self) -> bool {
        matches!(self, Toggle::NoOp)
    }
}

#[derive(Debug)]
pub struct GraphSession {
    graph: Graph,
    side: SideBuffer,
    layout: LayoutSession,
    layout_config: LayoutConfig,
}

impl GraphSession {
    pub fn new(
        graph: Graph,
        engine: Box<dyn LayoutEngine>,
        layout_config: LayoutConfig,
        fold_config: &FoldConfig,
    ) -> Self {
        Self {
            graph,
            side: SideBuffer::new(fold_config.folded_shape.clone()),
            layout: LayoutSession::new(engine),
            layout_config,
        }
    }

    /// Parse DOT source into a fresh session.
    pub fn from_source(
        source: &str,
        engine: Box<dyn LayoutEngine>,
        layout_config: LayoutConfig,
        fold_config: &FoldConfig,
    ) -> Result<Self, Error> {
        let graph = parse_dot(source)?;
        Ok(Self::new(graph, engine, layout_config, fold_config))
    }

    /// Replace the graph with freshly parsed `source`, forgetting every
    /// fold. The new graph has no layout yet.
    pub fn reload(&mut self, source: &str) -> Result<(), Error> {
        self.graph = parse_dot(source)?;
        self.side = SideBuffer::new(self.side.folded_shape().to_string());
        Ok(())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn side_buffer(&self) -> &SideBuffer {
        &self.side
    }

    pub fn layout_session(&self) -> &LayoutSession {
        &self.layout
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout_config
    }

    pub fn is_folded(&self, id: NodeId) -> bool {
        self.side.is_folded(id)
    }

    fn resolve(&self, name: &str) -> Result<NodeId, Error> {
        NodeId::get(name)
            .filter(|id| self.graph.contains(*id))
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    /// Lay out and render with the configured algorithm and format.
    pub fn layout_and_render(&mut self) -> Result<(), Error> {
        let algorithm = self.layout_config.algorithm.clone();
        self.relayout_with(&algorithm)
    }

    /// Discard the current layout and redo it with `algorithm`.
    ///
    /// On failure the previous graph (and its layout) is restored.
    pub fn relayout_with(&mut self, algorithm: &str) -> Result<(), Error> {
        let format = self.layout_config.format.clone();
        self.transact(|s| {
            s.layout.free_layout(&mut s.graph)?;
            s.layout.layout(&mut s.graph, algorithm)?;
            s.layout.render(&mut s.graph, &format)
        })?;
        self.layout_config.algorithm = algorithm.to_string();
        Ok(())
    }

    /// Fold `name` if it is expanded, unfold it if it is folded, then
    /// recompute the layout with the last parameters.
    ///
    /// Transactional: when any step fails, graph and side buffer are left
    /// exactly as they were.
    pub fn toggle_fold(&mut self, name: &str) -> Result<Toggle, Error> {
        let id = self.resolve(name)?;
        if self.is_folded(id) {
            self.unfold(name)
        } else {
            self.fold(name)
        }
    }

    /// Fold `name` and relayout. Fails with `AlreadyFolded` when it is.
    pub fn fold(&mut self, name: &str) -> Result<Toggle, Error> {
        let id = self.resolve(name)?;
        if self.is_folded(id) {
            return Err(Error::AlreadyFolded(name.to_string()));
        }
        let leaf = self
            .graph
            .index_of(id)
            .is_some_and(|idx| !self.graph.has_out_edges(idx));
        if leaf {
            return Ok(Toggle::NoOp);
        }
        self.transact(|s| {
            s.layout.free_layout(&mut s.graph)?;
            match s.side.fold(&mut s.graph, id)? {
                FoldOutcome::NoOp => Ok(Toggle::NoOp),
                FoldOutcome::Folded { absorbed } => {
                    s.relayout()?;
                    Ok(Toggle::Folded { absorbed })
                }
            }
        })
    }

    /// Unfold `name` and relayout. Fails with `NotFolded` when expanded.
    pub fn unfold(&mut self, name: &str) -> Result<Toggle, Error> {
        let id = self.resolve(name)?;
        self.transact(|s| {
            s.layout.free_layout(&mut s.graph)?;
            let restored = s.side.unfold(&mut s.graph, id)?;
            s.relayout()?;
            Ok(Toggle::Unfolded { restored })
        })
    }

    /// Repeat the last operations, or run the configured ones if the graph
    /// was never laid out.
    fn relayout(&mut self) -> Result<(), Error> {
        if self.layout.last_algorithm().is_some() && self.layout.last_format().is_some() {
            self.layout.repeat_operations(&mut self.graph)
        } else {
            let algorithm = self.layout_config.algorithm.clone();
            let format = self.layout_config.format.clone();
            self.layout.layout(&mut self.graph, &algorithm)?;
            self.layout.render(&mut self.graph, &format)
        }
    }

    /// Run `step`; restore graph and side buffer if it fails.
    fn transact<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        let graph = self.graph.clone();
        let side = self.side.clone();
        let result = step(self);
        if let Err(e) = &result {
            log::debug!("rolling back after failure: {e}");
            self.graph = graph;
            self.side = side;
        }
        result
    }
}
