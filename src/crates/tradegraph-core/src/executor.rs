//! Compiled graph executor
//!
//! Executes a validated [`Graph`] to quiescence in waves of concurrently
//! running nodes:
//!
//! ```text
//! frontier ──▶ run all ready nodes concurrently (shared snapshot)
//!     ▲              │
//!     │              ▼
//!     │        commit every partial update through the reducer gateway
//!     │              │
//!     │              ▼
//!     └──── route: direct edges, fan-in barriers, conditional routers,
//!                  Send dispatches → next frontier
//! ```
//!
//! Guarantees:
//!
//! - **Consistent snapshots.** Every node in a wave sees the state exactly as
//!   it was when the wave began; `Send` tasks see their custom input instead.
//! - **Barrier fan-in.** A node with several incoming direct edges runs only
//!   after all predecessor branches have committed.
//! - **Order-independent merges.** Updates are committed in deterministic
//!   frontier order, and per-field reducers make the result independent of
//!   which branch finished first.
//! - **Bounded work.** Total node activations are capped by the recursion
//!   limit; the optional session deadline cancels all in-flight work by
//!   dropping the wave's futures.
//!
//! Routing is evaluated against the post-wave state, after every update of
//! the wave has been committed, so conditional routers never observe a
//! half-merged wave.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, NodeId, END, START};
use crate::node::NodeOutput;
use crate::send::{ConditionalEdgeResult, Send as SendTask};
use crate::state::StateSchema;
use crate::stream::ExecutionEvent;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// Execution bounds for one session.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum node activations before the session aborts
    pub recursion_limit: usize,
    /// Session-wide hard deadline; `None` disables it
    pub deadline: Option<Duration>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            recursion_limit: 50,
            deadline: None,
        }
    }
}

/// One schedulable unit of work: a node, optionally with a custom input
/// (set for `Send` dispatches).
#[derive(Debug, Clone)]
struct Task {
    node: NodeId,
    input: Option<Value>,
}

type EventSender = mpsc::UnboundedSender<Result<ExecutionEvent>>;

/// An executable graph: validated structure + state schema + limits.
#[derive(Clone)]
pub struct CompiledGraph {
    graph: Arc<Graph>,
    schema: Arc<StateSchema>,
    limits: ExecutionLimits,
}

impl CompiledGraph {
    pub(crate) fn new(graph: Graph, schema: StateSchema, limits: ExecutionLimits) -> Self {
        Self {
            graph: Arc::new(graph),
            schema: Arc::new(schema),
            limits,
        }
    }

    /// Execute the graph to completion and return the final state.
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.run_with_deadline(input, None).await
    }

    /// Execute the graph, streaming progress events as it runs.
    ///
    /// The stream yields `Ok(ExecutionEvent)` items while nodes run, then a
    /// terminal `Completed { state }` on success or a single `Err` on
    /// failure. The graph runs on a spawned task; dropping the stream
    /// abandons it.
    pub fn stream(&self, input: Value) -> impl Stream<Item = Result<ExecutionEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.run_with_deadline(input, Some(tx.clone())).await;
            let terminal = match outcome {
                Ok(state) => Ok(ExecutionEvent::Completed { state }),
                Err(e) => Err(e),
            };
            let _ = tx.send(terminal);
        });
        UnboundedReceiverStream::new(rx)
    }

    async fn run_with_deadline(&self, input: Value, events: Option<EventSender>) -> Result<Value> {
        match self.limits.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_loop(input, events))
                .await
                .map_err(|_| {
                    tracing::warn!(?deadline, "session deadline fired, cancelling all tasks");
                    GraphError::Timeout(deadline)
                })?,
            None => self.run_loop(input, events).await,
        }
    }

    async fn run_loop(&self, input: Value, events: Option<EventSender>) -> Result<Value> {
        self.schema.validate(&input)?;
        let mut state = input;

        let in_degrees = self.graph.in_degrees();
        // Arrival counts per fan-in barrier, persisted across waves.
        let mut arrivals: HashMap<NodeId, usize> = HashMap::new();

        let mut frontier: Vec<Task> = Vec::new();
        if self.graph.entry == START {
            self.route_outgoing(START, &state, &in_degrees, &mut arrivals, &mut frontier)?;
        } else {
            // A custom entry point is itself the first node to run.
            push_task(&mut frontier, &self.graph.entry);
        }

        let mut activations: usize = 0;

        while !frontier.is_empty() {
            activations += frontier.len();
            if activations > self.limits.recursion_limit {
                return Err(GraphError::GraphLimitExceeded {
                    activations,
                    limit: self.limits.recursion_limit,
                });
            }

            tracing::debug!(
                wave = ?frontier.iter().map(|t| t.node.as_str()).collect::<Vec<_>>(),
                activations,
                "running wave"
            );

            let snapshot = state.clone();
            let futures: Vec<_> = frontier
                .iter()
                .map(|task| {
                    let spec = self
                        .graph
                        .nodes
                        .get(&task.node)
                        .cloned()
                        .ok_or_else(|| {
                            GraphError::Validation(format!("Unknown node '{}'", task.node))
                        });
                    let input = task.input.clone().unwrap_or_else(|| snapshot.clone());
                    let node = task.node.clone();
                    let events = events.clone();
                    async move {
                        let spec = spec?;
                        emit(&events, ExecutionEvent::NodeStarted { node: node.clone() });
                        let output = (spec.executor)(input).await;
                        Ok::<_, GraphError>((node, output))
                    }
                })
                .collect();

            let results = join_all(futures).await;

            // Commit every update of the wave before routing anything, so
            // routers evaluate against a fully merged wave.
            let mut completed: Vec<NodeId> = Vec::new();
            let mut dispatched: Vec<SendTask> = Vec::new();

            for result in results {
                let (node, output) = result?;
                match output.map_err(|e| match e {
                    err @ GraphError::NodeExecution { .. } => err,
                    other => GraphError::node_execution(&node, other),
                })? {
                    NodeOutput::Update(partial) => {
                        self.schema.apply(&mut state, &partial)?;
                        emit(
                            &events,
                            ExecutionEvent::NodeCompleted {
                                node: node.clone(),
                                update: partial,
                            },
                        );
                        completed.push(node);
                    }
                    NodeOutput::Sends(sends) => {
                        emit(
                            &events,
                            ExecutionEvent::NodeCompleted {
                                node: node.clone(),
                                update: Value::Object(serde_json::Map::new()),
                            },
                        );
                        dispatched.extend(sends);
                    }
                }
            }

            let mut next: Vec<Task> = Vec::new();
            for node in &completed {
                self.route_outgoing(node, &state, &in_degrees, &mut arrivals, &mut next)?;
            }
            for send in dispatched {
                let (node, custom) = send.into_parts();
                next.push(Task {
                    node,
                    input: Some(custom),
                });
            }

            frontier = next;
        }

        Ok(state)
    }

    /// Resolve the outgoing edges of `from` against the current state and
    /// push the resulting tasks. Barrier targets are only scheduled once all
    /// their predecessors have arrived; the arrival counter resets when the
    /// barrier fires so loops through a join behave.
    fn route_outgoing(
        &self,
        from: &str,
        state: &Value,
        in_degrees: &HashMap<NodeId, usize>,
        arrivals: &mut HashMap<NodeId, usize>,
        next: &mut Vec<Task>,
    ) -> Result<()> {
        let Some(edges) = self.graph.edges.get(from) else {
            if from != END && from != START {
                tracing::debug!(node = from, "node has no outgoing edges; branch ends");
            }
            return Ok(());
        };

        for edge in edges {
            match edge {
                Edge::Direct(to) => {
                    if to == END {
                        continue;
                    }
                    let needed = in_degrees.get(to).copied().unwrap_or(1);
                    if needed <= 1 {
                        push_task(next, to);
                    } else {
                        let seen = arrivals.entry(to.clone()).or_insert(0);
                        *seen += 1;
                        if *seen >= needed {
                            arrivals.remove(to);
                            push_task(next, to);
                        }
                    }
                }
                Edge::Conditional { router, .. } => match router(state) {
                    ConditionalEdgeResult::Single(to) => {
                        if to != END {
                            push_task(next, &to);
                        }
                    }
                    ConditionalEdgeResult::Multiple(targets) => {
                        for to in targets {
                            if to != END {
                                push_task(next, &to);
                            }
                        }
                    }
                    ConditionalEdgeResult::Sends(sends) => {
                        for send in sends {
                            let (node, custom) = send.into_parts();
                            next.push(Task {
                                node,
                                input: Some(custom),
                            });
                        }
                    }
                    ConditionalEdgeResult::End => {}
                },
            }
        }

        Ok(())
    }
}

/// Push a plain (snapshot-input) task unless the node is already queued.
fn push_task(next: &mut Vec<Task>, node: &str) {
    if next.iter().any(|t| t.node == node && t.input.is_none()) {
        return;
    }
    next.push(Task {
        node: node.to_string(),
        input: None,
    });
}

fn emit(events: &Option<EventSender>, event: ExecutionEvent) {
    if let Some(tx) = events {
        let _ = tx.send(Ok(event));
    }
}
