//! Shared fixtures for API handler tests.

use crate::state::AppState;
use chrono::Duration;
use leadflow_adapters::recording::RecordingAdapters;
use leadflow_core::OrganizationId;
use leadflow_engine::engine::{EngineLimits, ExecutionEngine};
use leadflow_engine::memory::InMemoryStore;
use leadflow_engine::queue::TokioExecutionQueue;
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::edge::Edge;
use leadflow_workflow::node::{Node, NodeConfig};
use leadflow_workflow::trigger::{Channel, TriggerConfig};
use std::sync::Arc;

/// Builds app state over an in-memory store and recording adapters.
pub(crate) fn test_state() -> (Arc<AppState>, InMemoryStore, RecordingAdapters) {
    let store = InMemoryStore::new();
    let recorder = RecordingAdapters::new();
    let engine = ExecutionEngine::new(Arc::new(store.clone()), recorder.as_adapter_set());
    let queue = Arc::new(TokioExecutionQueue::new(engine.clone()));
    let state = Arc::new(AppState::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        engine,
        queue,
        EngineLimits::default(),
        Duration::hours(24),
    ));
    (state, store, recorder)
}

/// trigger -> send_message definition with the given keyword matcher.
pub(crate) fn greeter_definition(org: OrganizationId, keywords: &[&str]) -> WorkflowDefinition {
    let mut definition = WorkflowDefinition::new(
        org,
        "Greeter",
        TriggerConfig::MessageReceived {
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            channel: None,
        },
    );
    let trigger = Node::new("Entry", NodeConfig::Trigger);
    let reply = Node::new(
        "Reply",
        NodeConfig::SendMessage {
            channel: Channel::Whatsapp,
            content: "hola!".to_string(),
            requires_reply: false,
        },
    );
    let trigger_id = trigger.id;
    let reply_id = reply.id;
    definition.graph.add_node(trigger).unwrap();
    definition.graph.add_node(reply).unwrap();
    definition
        .graph
        .add_edge(trigger_id, reply_id, Edge::unlabeled())
        .unwrap();
    definition
}
