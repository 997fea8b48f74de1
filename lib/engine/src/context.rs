//! Execution context: the accumulated variables of a run.
//!
//! The context starts as the trigger event's payload and grows as nodes
//! produce output. Node outputs live under `nodes.<node_id>`; external
//! reply payloads are merged at the top level so conditions can reference
//! them directly (e.g. `budget`).

use leadflow_workflow::node::NodeId;
use leadflow_workflow::template;
use leadflow_workflow::trigger::NormalizedEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// The accumulated variables of an execution.
///
/// Internally a JSON object; serializes transparently as one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext(JsonMap<String, JsonValue>);

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a context from a trigger event's payload.
    ///
    /// Only fields present on the event become context keys.
    #[must_use]
    pub fn from_event(event: &NormalizedEvent) -> Self {
        let mut context = Self::new();
        if let Some(message) = &event.message {
            context.insert("message", JsonValue::String(message.clone()));
        }
        if let Some(channel) = event.channel {
            context.insert("channel", JsonValue::String(channel.as_str().to_string()));
        }
        if let Some(sender) = &event.sender {
            context.insert("sender", JsonValue::String(sender.clone()));
        }
        if let Some(conversation_id) = event.conversation_id {
            context.insert(
                "conversation_id",
                JsonValue::String(conversation_id.to_string()),
            );
        }
        if let Some(lead_id) = event.lead_id {
            context.insert("lead_id", JsonValue::String(lead_id.to_string()));
        }
        if let Some(from_stage) = &event.from_stage {
            context.insert("from_stage", JsonValue::String(from_stage.clone()));
        }
        if let Some(to_stage) = &event.to_stage {
            context.insert("to_stage", JsonValue::String(to_stage.clone()));
        }
        context
    }

    /// Inserts a top-level key.
    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        self.0.insert(key.into(), value);
    }

    /// Looks up a dot-separated path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<JsonValue> {
        let root = JsonValue::Object(self.0.clone());
        template::lookup_path(&root, path).cloned()
    }

    /// Returns the context as a JSON value for comparisons and templates.
    #[must_use]
    pub fn as_value(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }

    /// Renders a `{{path}}` template against this context.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        template::render(template, &self.as_value())
    }

    /// Records a node's output under `nodes.<node_id>`.
    pub fn record_node_output(&mut self, node_id: NodeId, output: JsonValue) {
        let nodes = self
            .0
            .entry("nodes".to_string())
            .or_insert_with(|| JsonValue::Object(JsonMap::new()));
        if let JsonValue::Object(map) = nodes {
            map.insert(node_id.to_string(), output);
        }
    }

    /// Returns a node's recorded output, if any.
    #[must_use]
    pub fn node_output(&self, node_id: NodeId) -> Option<JsonValue> {
        self.get(&format!("nodes.{node_id}"))
    }

    /// Merges an object payload into the top level of the context.
    ///
    /// Non-object payloads are stored under the `reply` key instead of
    /// silently disappearing.
    pub fn merge(&mut self, payload: JsonValue) {
        match payload {
            JsonValue::Object(map) => {
                for (key, value) in map {
                    self.0.insert(key, value);
                }
            }
            other => {
                self.0.insert("reply".to_string(), other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_core::{ConversationId, OrganizationId};
    use leadflow_workflow::trigger::Channel;
    use serde_json::json;

    #[test]
    fn seeds_from_message_event() {
        let conversation_id = ConversationId::new();
        let event = NormalizedEvent::message_received(
            OrganizationId::new(),
            conversation_id,
            Channel::Whatsapp,
            "cual es el precio?",
        )
        .with_sender("+5215550001111");

        let context = ExecutionContext::from_event(&event);
        assert_eq!(context.get("message"), Some(json!("cual es el precio?")));
        assert_eq!(context.get("channel"), Some(json!("whatsapp")));
        assert_eq!(context.get("sender"), Some(json!("+5215550001111")));
        assert_eq!(
            context.get("conversation_id"),
            Some(json!(conversation_id.to_string()))
        );
        assert_eq!(context.get("from_stage"), None);
    }

    #[test]
    fn records_and_reads_node_output() {
        let mut context = ExecutionContext::new();
        let node_id = NodeId::new();
        context.record_node_output(node_id, json!({"status": 200}));

        assert_eq!(context.node_output(node_id), Some(json!({"status": 200})));
        assert_eq!(
            context.get(&format!("nodes.{node_id}.status")),
            Some(json!(200))
        );
    }

    #[test]
    fn merge_object_at_top_level() {
        let mut context = ExecutionContext::new();
        context.insert("message", json!("hola"));
        context.merge(json!({"budget": 1500, "message": "updated"}));

        assert_eq!(context.get("budget"), Some(json!(1500)));
        assert_eq!(context.get("message"), Some(json!("updated")));
    }

    #[test]
    fn merge_scalar_goes_under_reply_key() {
        let mut context = ExecutionContext::new();
        context.merge(json!("si, me interesa"));
        assert_eq!(context.get("reply"), Some(json!("si, me interesa")));
    }

    #[test]
    fn renders_templates() {
        let mut context = ExecutionContext::new();
        context.insert("sender", json!("Ana"));
        assert_eq!(context.render("Hola {{sender}}"), "Hola Ana");
    }

    #[test]
    fn context_serde_is_transparent() {
        let mut context = ExecutionContext::new();
        context.insert("budget", json!(1500));

        let json = serde_json::to_value(&context).expect("serialize");
        assert_eq!(json, json!({"budget": 1500}));

        let parsed: ExecutionContext = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, context);
    }
}
