//! Core domain types for the leadflow automation platform.
//!
//! This crate provides the strongly-typed identifiers shared by every
//! other crate in the workspace. Each domain entity gets its own ID type
//! so a conversation ID can never be passed where a lead ID is expected.

pub mod id;

pub use id::{
    ConversationId, ExecutionId, LeadId, LogEntryId, OrganizationId, ParseIdError, PendingInputId,
    WorkflowId,
};
