//! Workflow definition model for the leadflow automation platform.
//!
//! This crate provides the data model the execution engine consumes:
//!
//! - **Graph Model**: Directed graphs using petgraph with typed nodes and
//!   branch-labeled edges
//! - **Node Types**: Trigger, SendMessage, CrmAction, HttpRequest, Email,
//!   Sms, Wait, Condition
//! - **Triggers**: keyword, stage-change, manual, and schedule matching
//!   against normalized inbound events
//! - **Conditions**: comparison rules evaluated against execution context
//! - **Templates**: `{{path}}` interpolation for message/HTTP payloads
//!
//! Definitions are pure data: structural validation happens once at publish
//! time via [`WorkflowDefinition::validate`], never during execution.

pub mod condition;
pub mod definition;
pub mod edge;
pub mod error;
pub mod graph;
pub mod node;
pub mod template;
pub mod trigger;

pub use condition::{CompareOp, Comparison};
pub use definition::{WorkflowDefinition, WorkflowSummary};
pub use edge::{Edge, EdgeRef};
pub use error::{DefinitionError, GraphError, TriggerError};
pub use graph::WorkflowGraph;
pub use node::{BranchRule, CrmOperation, Node, NodeConfig, NodeId, NodeKind};
pub use trigger::{Channel, NormalizedEvent, TriggerConfig, TriggerKind};
