use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Result of applying one operation to one node. Produced exactly once
/// per visited node, streamed in pre-order.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct NodeOutcome {
    pub node: NodeId,
    pub success: bool,
    pub detail: String,
    /// Root node of the invocation that produced this outcome.
    pub origin: NodeId,
}

impl NodeOutcome {
    #[must_use]
    pub fn succeeded(node: NodeId, origin: NodeId, detail: String) -> Self {
        Self { node, success: true, detail, origin }
    }

    #[must_use]
    pub fn failed(node: NodeId, origin: NodeId, detail: String) -> Self {
        Self { node, success: false, detail, origin }
    }
}

/// Machine-readable classification of a non-fatal service warning.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    AlreadyExists,
    #[default]
    Other,
}

impl WarningCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "already_exists" => Some(Self::AlreadyExists),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Non-fatal condition reported alongside the primary result of a
/// single remote call. Warnings never invalidate the primary result,
/// but may suppress a dependent follow-up action.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServiceWarning {
    #[serde(default)]
    pub code: WarningCode,
    pub message: String,
}

impl ServiceWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// True when the warning reports that the target already exists.
    ///
    /// The structured code is authoritative; the message-suffix match is
    /// a legacy fallback for services that only emit free-form text.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.code == WarningCode::AlreadyExists || self.message.ends_with("already exists.")
    }
}

/// Primary result of a container-creation call: the new node id plus
/// zero or more independent warnings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Creation {
    pub node: NodeId,
    #[serde(default)]
    pub warnings: Vec<ServiceWarning>,
}

impl Creation {
    /// Whether any warning forbids copying template configuration onto
    /// the created node.
    #[must_use]
    pub fn suppresses_template_copy(&self) -> bool {
        self.warnings.iter().any(ServiceWarning::is_already_exists)
    }
}
