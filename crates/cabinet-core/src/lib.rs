mod create;
mod error;
mod ids;
mod op;
mod outcome;
mod service;
mod walk;

#[cfg(test)]
mod fake;

pub use create::create_with_template;
pub use error::{ServiceError, ValidationError};
pub use ids::{CategoryId, ClassificationId, NodeId};
pub use op::MutationOp;
pub use outcome::{Creation, NodeOutcome, ServiceWarning, WarningCode};
pub use service::{ContainerKind, ContentService};
pub use walk::{Recursion, TreeMutationExecutor, Walk};
