//! Pipeline assembly and lifecycle.
//!
//! A [`Topology`] names operators, wires their outputs over bounded
//! channels, validates the wiring before anything runs, and owns the shared
//! cancellation signal. Stopping a rule is `cancel()`: one watch flip that
//! every operator observes at its next select point.

use crate::rillsql::sql::ast::WindowSpec;
use crate::rillsql::stream::barrier::{BarrierHandler, NoopBarrierHandler};
use crate::rillsql::stream::config::StreamConfig;
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::envelope::StreamEnvelope;
use crate::rillsql::stream::error::{StreamError, StreamResult};
use crate::rillsql::stream::operator::{StreamFunction, UnaryOperator};
use crate::rillsql::stream::window::{TriggerMode, WindowOperator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

enum TopologyNode {
    Unary(UnaryOperator),
    Window(WindowOperator),
}

impl TopologyNode {
    fn input(&self) -> mpsc::Sender<StreamEnvelope> {
        match self {
            TopologyNode::Unary(op) => op.input(),
            TopologyNode::Window(op) => op.input(),
        }
    }

    fn add_output(
        &mut self,
        name: &str,
        output: mpsc::Sender<StreamEnvelope>,
    ) -> StreamResult<()> {
        match self {
            TopologyNode::Unary(op) => op.add_output(name, output),
            TopologyNode::Window(op) => op.add_output(name, output),
        }
    }

    fn output_count(&self) -> usize {
        match self {
            TopologyNode::Unary(op) => op.output_count(),
            TopologyNode::Window(op) => op.output_count(),
        }
    }

    fn start(&mut self, ctx: &StreamContext) -> StreamResult<JoinHandle<()>> {
        match self {
            TopologyNode::Unary(op) => op.start(ctx),
            TopologyNode::Window(op) => op.start(ctx),
        }
    }
}

/// One rule's operator tree.
pub struct Topology {
    name: String,
    config: StreamConfig,
    cancel: watch::Sender<bool>,
    ctx: StreamContext,
    nodes: HashMap<String, TopologyNode>,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl Topology {
    pub fn new(name: impl Into<String>, config: StreamConfig) -> Self {
        let name = name.into();
        let (cancel, ctx) = StreamContext::root(&name);
        Topology {
            name,
            config,
            cancel,
            ctx,
            nodes: HashMap::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Add a transformation stage with no checkpointing.
    pub fn add_unary(
        &mut self,
        name: impl Into<String>,
        function: Arc<dyn StreamFunction>,
    ) -> StreamResult<()> {
        self.add_unary_with_barrier(name, function, Arc::new(NoopBarrierHandler))
    }

    /// Add a transformation stage with an explicit barrier handler.
    pub fn add_unary_with_barrier(
        &mut self,
        name: impl Into<String>,
        function: Arc<dyn StreamFunction>,
        barrier: Arc<dyn BarrierHandler>,
    ) -> StreamResult<()> {
        let name = name.into();
        self.reserve_name(&name)?;
        let op = UnaryOperator::new(&name, function, barrier, &self.config);
        self.nodes.insert(name, TopologyNode::Unary(op));
        Ok(())
    }

    /// Add a window stage. The spec is validated here, before start.
    pub fn add_window(
        &mut self,
        name: impl Into<String>,
        spec: WindowSpec,
        mode: TriggerMode,
    ) -> StreamResult<()> {
        let name = name.into();
        self.reserve_name(&name)?;
        let op = WindowOperator::new(
            &name,
            spec,
            mode,
            Arc::new(NoopBarrierHandler),
            &self.config,
        )?;
        self.nodes.insert(name, TopologyNode::Window(op));
        Ok(())
    }

    /// Wire `from`'s output into `to`'s input. The output is named after
    /// the downstream operator, so double wiring is rejected.
    pub fn connect(&mut self, from: &str, to: &str) -> StreamResult<()> {
        let input = self
            .nodes
            .get(to)
            .ok_or_else(|| StreamError::UnknownOperator {
                name: to.to_string(),
            })?
            .input();
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| StreamError::UnknownOperator {
                name: from.to_string(),
            })?;
        node.add_output(to, input)
    }

    /// Attach a terminal receiver to `operator` and return it.
    pub fn add_sink(
        &mut self,
        operator: &str,
        sink_name: impl Into<String>,
    ) -> StreamResult<mpsc::Receiver<StreamEnvelope>> {
        let sink_name = sink_name.into();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let node = self
            .nodes
            .get_mut(operator)
            .ok_or_else(|| StreamError::UnknownOperator {
                name: operator.to_string(),
            })?;
        node.add_output(&sink_name, tx)?;
        Ok(rx)
    }

    /// A sender feeding `operator`'s input, for injecting records.
    pub fn source(&self, operator: &str) -> StreamResult<mpsc::Sender<StreamEnvelope>> {
        self.nodes
            .get(operator)
            .map(TopologyNode::input)
            .ok_or_else(|| StreamError::UnknownOperator {
                name: operator.to_string(),
            })
    }

    /// Start every operator. All wiring is validated first; a miswired
    /// operator fails the whole start with no task spawned.
    pub fn start(&mut self) -> StreamResult<()> {
        if self.started {
            return Err(StreamError::AlreadyStarted {
                operator: self.name.clone(),
            });
        }
        for (name, node) in &self.nodes {
            if node.output_count() == 0 {
                return Err(StreamError::NoOutputs {
                    operator: name.clone(),
                });
            }
        }
        for node in self.nodes.values_mut() {
            self.handles.push(node.start(&self.ctx)?);
        }
        self.started = true;
        log::info!("topology {} started with {} operators", self.name, self.handles.len());
        Ok(())
    }

    /// Signal shutdown to every operator in the tree.
    pub fn cancel(&self) {
        // Send only fails when every receiver is already gone.
        let _ = self.cancel.send(true);
    }

    /// Wait for every operator task to finish.
    pub async fn wait(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("topology {}: operator task failed: {}", self.name, e);
            }
        }
    }

    fn reserve_name(&self, name: &str) -> StreamResult<()> {
        if self.nodes.contains_key(name) {
            return Err(StreamError::DuplicateOperator {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rillsql::sql::ast::{BinaryOperator, Expr, LiteralValue};
    use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
    use crate::rillsql::sql::execution::processors::filter::FilterProcessor;
    use crate::rillsql::sql::execution::types::{FieldValue, StreamData};
    use std::collections::HashMap as Map;

    fn record(a: i64) -> StreamData {
        let mut message = Map::new();
        message.insert("a".to_string(), FieldValue::Integer(a));
        StreamData::record("src", message, 0)
    }

    fn gt_filter(threshold: i64) -> Arc<FilterProcessor> {
        let condition = Expr::binary(
            Expr::field("a"),
            BinaryOperator::Gt,
            Expr::Literal(LiteralValue::Integer(threshold)),
        );
        Arc::new(FilterProcessor::new(
            condition,
            Arc::new(FunctionRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn test_source_filter_sink_pipeline() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("filter", gt_filter(10)).unwrap();
        let mut sink = topology.add_sink("filter", "sink").unwrap();
        let source = topology.source("filter").unwrap();
        topology.start().unwrap();

        for a in [5, 25, 8, 40] {
            source
                .send(StreamEnvelope::new(record(a), "src"))
                .await
                .unwrap();
        }

        for expected in [25, 40] {
            let envelope = sink.recv().await.unwrap();
            match envelope.data {
                StreamData::Record(r) => {
                    assert_eq!(r.field("a"), Some(FieldValue::Integer(expected)))
                }
                other => panic!("expected record, got {:?}", other),
            }
        }
        topology.cancel();
    }

    #[tokio::test]
    async fn test_duplicate_operator_name_is_rejected() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("filter", gt_filter(0)).unwrap();
        assert!(matches!(
            topology.add_unary("filter", gt_filter(0)),
            Err(StreamError::DuplicateOperator { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_unknown_operator_fails() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("filter", gt_filter(0)).unwrap();
        assert!(matches!(
            topology.connect("filter", "missing"),
            Err(StreamError::UnknownOperator { .. })
        ));
        assert!(matches!(
            topology.connect("missing", "filter"),
            Err(StreamError::UnknownOperator { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_wiring_is_rejected() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("a", gt_filter(0)).unwrap();
        topology.add_unary("b", gt_filter(0)).unwrap();
        topology.connect("a", "b").unwrap();
        assert!(matches!(
            topology.connect("a", "b"),
            Err(StreamError::DuplicateOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sink_name_is_rejected() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("filter", gt_filter(0)).unwrap();
        let _sink = topology.add_sink("filter", "sink".to_string()).unwrap();
        assert!(matches!(
            topology.add_sink("filter", "sink"),
            Err(StreamError::DuplicateOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_validates_wiring_before_spawning() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("dangling", gt_filter(0)).unwrap();
        assert!(matches!(
            topology.start(),
            Err(StreamError::NoOutputs { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_the_tree() {
        let mut topology = Topology::new("rule1", StreamConfig::default());
        topology.add_unary("filter", gt_filter(0)).unwrap();
        let _sink = topology.add_sink("filter", "sink").unwrap();
        topology.start().unwrap();
        topology.cancel();
        topology.wait().await;
    }
}
