use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use cabinet_client::{
    AssignToBoxOptions, ClientConfig, PhysicalItemKind, PhysicalItemSpec, RemoteClient, UserSpec,
};
use cabinet_core::{
    create_with_template, ContainerKind, ContentService, Creation, MutationOp, NodeId, Recursion,
    TreeMutationExecutor, Walk,
};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CreateProjectRequest {
    pub name: String,
    pub parent: NodeId,
    /// Workspace whose configuration is copied onto the new project.
    pub template: Option<NodeId>,
}

/// One established session against the content repository, offering
/// one method per user-facing command.
pub struct Cabinet {
    client: RemoteClient,
}

impl Cabinet {
    /// Open a session. Commands constructed from a saved connection
    /// profile call this once, up front; nothing is attempted against
    /// the repository when the session cannot be established.
    ///
    /// # Errors
    /// Returns an error when the endpoint is unreachable or the
    /// credentials are rejected.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let client = RemoteClient::connect(config)
            .with_context(|| format!("failed to open session against {}", config.services_url))?;
        Ok(Self { client })
    }

    /// Create a project workspace, optionally stamping a template's
    /// configuration onto it. Warnings reported by the repository are
    /// surfaced on the returned [`Creation`].
    ///
    /// # Errors
    /// Returns an error when the request is malformed or the create
    /// call fails.
    pub fn create_project(&mut self, request: &CreateProjectRequest) -> Result<Creation> {
        if request.name.trim().is_empty() {
            return Err(anyhow!("project name MUST be non-empty"));
        }
        if !request.parent.is_valid() {
            return Err(anyhow!("parent node id MUST be positive"));
        }

        let template = request.template.filter(|template| template.is_valid());
        let creation = create_with_template(
            &mut self.client,
            &request.name,
            request.parent,
            ContainerKind::Project,
            template,
        )?;
        Ok(creation)
    }

    /// Create a plain folder.
    ///
    /// # Errors
    /// Returns an error when the create call fails.
    pub fn create_folder(&mut self, name: &str, parent: NodeId) -> Result<Creation> {
        if name.trim().is_empty() {
            return Err(anyhow!("folder name MUST be non-empty"));
        }
        Ok(self.client.create_container(name, parent, ContainerKind::Folder)?)
    }

    /// Delete a node. Returns the repository's status message.
    ///
    /// # Errors
    /// Returns an error when the node cannot be deleted.
    pub fn remove_node(&mut self, node: NodeId) -> Result<String> {
        Ok(self.client.delete_node(node)?)
    }

    /// Apply one mutation to `root` and, with [`Recursion::Subtree`],
    /// to every descendant. The returned stream yields one outcome per
    /// visited node in pre-order; per-node failures appear in the
    /// stream and never abort the walk.
    ///
    /// # Errors
    /// Returns an error only when the operation payload itself is
    /// invalid; no remote call has been made at that point.
    pub fn apply(
        &mut self,
        root: NodeId,
        op: &MutationOp,
        recursion: Recursion,
    ) -> Result<Walk<'_, RemoteClient>> {
        op.validate()?;
        Ok(TreeMutationExecutor::new(&mut self.client).apply(root, op, recursion))
    }

    /// Create a user account.
    ///
    /// # Errors
    /// Returns an error when the spec is malformed or the repository
    /// rejects the account.
    pub fn add_user(&mut self, spec: &UserSpec) -> Result<NodeId> {
        if spec.login.trim().is_empty() {
            return Err(anyhow!("login MUST be non-empty"));
        }
        if !spec.department_group.is_valid() {
            return Err(anyhow!("department group id MUST be positive"));
        }
        Ok(self.client.create_user(spec)?)
    }

    /// Delete a user account by id.
    ///
    /// # Errors
    /// Returns an error when the account cannot be deleted.
    pub fn remove_user(&mut self, user: NodeId) -> Result<()> {
        Ok(self.client.delete_user(user)?)
    }

    /// Resolve a user id from a login name.
    ///
    /// # Errors
    /// Returns an error when the login is unknown.
    pub fn user_id_by_login(&mut self, login: &str) -> Result<NodeId> {
        Ok(self.client.user_id_by_login(login)?)
    }

    /// Finalise a record.
    ///
    /// # Errors
    /// Returns an error when the record cannot be finalised.
    pub fn finalise_record(&mut self, node: NodeId) -> Result<()> {
        Ok(self.client.finalise_record(node)?)
    }

    /// Create a physical item, container or box.
    ///
    /// # Errors
    /// Returns an error when the spec is malformed or the repository
    /// rejects the object.
    pub fn add_physical_item(
        &mut self,
        kind: PhysicalItemKind,
        spec: &PhysicalItemSpec,
    ) -> Result<NodeId> {
        if spec.name.trim().is_empty() {
            return Err(anyhow!("item name MUST be non-empty"));
        }
        if spec.home_location.trim().is_empty() {
            return Err(anyhow!("home location MUST be non-empty"));
        }
        Ok(self.client.create_physical_item(kind, spec)?)
    }

    /// Assign a physical item to a box.
    ///
    /// # Errors
    /// Returns an error when the assignment is rejected.
    pub fn assign_to_box(
        &mut self,
        item: NodeId,
        box_id: NodeId,
        options: AssignToBoxOptions,
    ) -> Result<()> {
        Ok(self.client.assign_to_box(item, box_id, options)?)
    }
}
