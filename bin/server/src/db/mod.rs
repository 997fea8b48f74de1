//! Postgres implementations of the engine's store traits.
//!
//! Typed IDs are bound as their raw ULID strings; definition and context
//! payloads live in JSONB columns. Row structs are converted back into
//! domain types with explicit decode errors rather than panics.

pub mod execution;
pub mod workflow;

pub use execution::PgExecutionStore;
pub use workflow::PgWorkflowStore;

/// Wraps a decode failure in a sqlx error, for row conversions.
pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}
