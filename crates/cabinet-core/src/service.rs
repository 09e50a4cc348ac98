use serde::{Deserialize, Serialize};

use crate::{Creation, MutationOp, NodeId, ServiceError};

/// Kind of container the repository can create.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Project,
    Folder,
}

impl ContainerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Folder => "folder",
        }
    }
}

/// The remote repository surface the mutation engine consumes.
///
/// One implementation talks to the live service; tests substitute an
/// in-memory tree with failure injection. Calls are blocking and the
/// engine issues them strictly one at a time.
pub trait ContentService {
    /// Apply one mutation to one node.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the service rejects the mutation or
    /// the call cannot be completed.
    fn mutate(&mut self, node: NodeId, op: &MutationOp) -> Result<(), ServiceError>;

    /// Direct children of `node`, in whatever order the repository
    /// reports them.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the children cannot be enumerated.
    fn list_children(&mut self, node: NodeId) -> Result<Vec<NodeId>, ServiceError>;

    /// Create a container under `parent`. Non-fatal conditions are
    /// reported as warnings on the returned [`Creation`].
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the create call itself fails.
    fn create_container(
        &mut self,
        name: &str,
        parent: NodeId,
        kind: ContainerKind,
    ) -> Result<Creation, ServiceError>;

    /// Copy a template's configuration onto `node`.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the copy fails.
    fn update_from_template(&mut self, node: NodeId, template: NodeId)
        -> Result<(), ServiceError>;
}
