//! Bulk-operation engine: protection filter, retry policy, bounded
//! dispatcher and the orchestrator that sequences them.

pub mod dispatcher;
pub mod filter;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use dispatcher::Dispatcher;
pub use filter::actionable_members;
pub use orchestrator::Moderator;
pub use retry::RetryPolicy;
pub use types::{
    FilterBreakdown, OperationKind, OperationReport, OperationRequest, OperationResult,
    OperationStats, TargetFailure,
};
