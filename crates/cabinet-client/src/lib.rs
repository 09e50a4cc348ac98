use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use cabinet_core::{
    ContainerKind, ContentService, Creation, MutationOp, NodeId, ServiceError, ServiceWarning,
};

const CALL_TIMEOUT: Duration = Duration::from_secs(60);
const TICKET_HEADER: &str = "X-Cabinet-Ticket";

/// Connection settings for one services endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the services directory, e.g. `https://host/cws/`.
    pub services_url: String,
    pub username: String,
    pub password: String,
}

/// New-user payload. Optional fields are left to the repository's
/// defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserSpec {
    pub login: String,
    pub department_group: NodeId,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub fax: Option<String>,
    pub office_location: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub login_enabled: Option<bool>,
    pub public_access_enabled: Option<bool>,
    pub create_update_users: Option<bool>,
    pub create_update_groups: Option<bool>,
    pub can_administer_users: Option<bool>,
    pub can_administer_system: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalItemKind {
    Item,
    Container,
    Box,
}

impl PhysicalItemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Container => "container",
            Self::Box => "box",
        }
    }
}

/// Physical-object payload shared by item, container and box creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhysicalItemSpec {
    pub name: String,
    pub parent: NodeId,
    pub subtype: i64,
    pub home_location: String,
    pub description: Option<String>,
    pub unique_id: Option<String>,
    pub keywords: Option<String>,
    pub locator_type: Option<String>,
    pub reference_rate: Option<String>,
    pub offsite_storage_id: Option<String>,
    pub client_name: Option<String>,
    pub temporary_id: Option<String>,
    pub label_type: Option<String>,
    pub client_id: Option<i64>,
    pub number_of_copies: Option<i64>,
    pub number_of_labels: Option<i64>,
    pub number_of_items: Option<i64>,
    #[serde(default)]
    pub generate_label: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to_date: Option<OffsetDateTime>,
}

/// Flags controlling what the repository refreshes when an item moves
/// into a box.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct AssignToBoxOptions {
    #[serde(default)]
    pub update_location: bool,
    #[serde(default)]
    pub update_rsi: bool,
    #[serde(default)]
    pub update_status: bool,
}

/// Blocking JSON-over-HTTP client for the content repository. One
/// value per established session; constructing it performs the
/// authentication call.
pub struct RemoteClient {
    agent: ureq::Agent,
    base: String,
    ticket: String,
}

#[derive(Deserialize)]
struct SessionBody {
    ticket: String,
}

#[derive(Deserialize)]
struct IdBody {
    id: i64,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Deserialize)]
struct ChildrenBody {
    children: Vec<i64>,
}

#[derive(Deserialize)]
struct CreatedBody {
    id: i64,
    #[serde(default)]
    warnings: Vec<ServiceWarning>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: String,
}

impl RemoteClient {
    /// Establish an authenticated session against the services
    /// endpoint.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the endpoint is unreachable or the
    /// credentials are rejected.
    pub fn connect(config: &ClientConfig) -> Result<Self, ServiceError> {
        let base = normalize_base(&config.services_url);
        let agent = ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build();

        let result = agent.post(&format!("{base}auth/sessions")).send_json(serde_json::json!({
            "username": config.username,
            "password": config.password,
        }));
        let session: SessionBody = decode(result)?;

        tracing::debug!(endpoint = %base, user = %config.username, "session established");
        Ok(Self { agent, base, ticket: session.ticket })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let result =
            self.agent.post(&self.url(path)).set(TICKET_HEADER, &self.ticket).send_json(body);
        decode(result)
    }

    fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ServiceError> {
        let result =
            self.agent.post(&self.url(path)).set(TICKET_HEADER, &self.ticket).send_json(body);
        accept(result)
    }

    /// Delete a node. Returns the repository's status message.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the node cannot be deleted.
    pub fn delete_node(&mut self, node: NodeId) -> Result<String, ServiceError> {
        let result = self
            .agent
            .delete(&self.url(&format!("nodes/{node}")))
            .set(TICKET_HEADER, &self.ticket)
            .call();
        let body: MessageBody = decode(result)?;
        Ok(body.message)
    }

    /// Create a user account.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the account cannot be created.
    pub fn create_user(&mut self, spec: &UserSpec) -> Result<NodeId, ServiceError> {
        let body: IdBody = self.post_json("users", spec)?;
        Ok(NodeId(body.id))
    }

    /// Delete a user account by id.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the account cannot be deleted.
    pub fn delete_user(&mut self, user: NodeId) -> Result<(), ServiceError> {
        let result = self
            .agent
            .delete(&self.url(&format!("users/{user}")))
            .set(TICKET_HEADER, &self.ticket)
            .call();
        accept(result)
    }

    /// Resolve a user id from a login name.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the login is unknown.
    pub fn user_id_by_login(&mut self, login: &str) -> Result<NodeId, ServiceError> {
        let result = self
            .agent
            .get(&self.url("users/lookup"))
            .query("login", login)
            .set(TICKET_HEADER, &self.ticket)
            .call();
        let body: IdBody = decode(result)?;
        Ok(NodeId(body.id))
    }

    /// Finalise a record, locking it for records-management purposes.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the record cannot be finalised.
    pub fn finalise_record(&mut self, node: NodeId) -> Result<(), ServiceError> {
        self.post_ack(&format!("nodes/{node}/finalise"), &serde_json::json!({}))
    }

    /// Create a physical item, container or box.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the object cannot be created.
    pub fn create_physical_item(
        &mut self,
        kind: PhysicalItemKind,
        spec: &PhysicalItemSpec,
    ) -> Result<NodeId, ServiceError> {
        #[derive(Serialize)]
        struct Body<'a> {
            kind: PhysicalItemKind,
            #[serde(flatten)]
            spec: &'a PhysicalItemSpec,
        }

        let body: IdBody = self.post_json("physical-items", &Body { kind, spec })?;
        Ok(NodeId(body.id))
    }

    /// Assign a physical item to a box.
    ///
    /// # Errors
    /// Returns [`ServiceError`] when the assignment is rejected.
    pub fn assign_to_box(
        &mut self,
        item: NodeId,
        box_id: NodeId,
        options: AssignToBoxOptions,
    ) -> Result<(), ServiceError> {
        self.post_ack(
            &format!("physical-items/{item}/box"),
            &serde_json::json!({
                "box": box_id,
                "update_location": options.update_location,
                "update_rsi": options.update_rsi,
                "update_status": options.update_status,
            }),
        )
    }
}

impl ContentService for RemoteClient {
    fn mutate(&mut self, node: NodeId, op: &MutationOp) -> Result<(), ServiceError> {
        self.post_ack(&format!("nodes/{node}/{}", mutation_path(op)), op)
    }

    fn list_children(&mut self, node: NodeId) -> Result<Vec<NodeId>, ServiceError> {
        let result = self
            .agent
            .get(&self.url(&format!("nodes/{node}/children")))
            .set(TICKET_HEADER, &self.ticket)
            .call();
        let body: ChildrenBody = decode(result)?;
        Ok(body.children.into_iter().map(NodeId).collect())
    }

    fn create_container(
        &mut self,
        name: &str,
        parent: NodeId,
        kind: ContainerKind,
    ) -> Result<Creation, ServiceError> {
        let body: CreatedBody = self.post_json(
            "nodes",
            &serde_json::json!({
                "name": name,
                "parent": parent,
                "kind": kind,
            }),
        )?;
        Ok(Creation { node: NodeId(body.id), warnings: body.warnings })
    }

    fn update_from_template(
        &mut self,
        node: NodeId,
        template: NodeId,
    ) -> Result<(), ServiceError> {
        self.post_ack(&format!("nodes/{node}/template"), &serde_json::json!({ "template": template }))
    }
}

// Each mutation variant maps onto exactly one endpoint; a pure lookup,
// no branching beyond the variant itself.
fn mutation_path(op: &MutationOp) -> &'static str {
    match op {
        MutationOp::UpdateAttribute { .. } => "attributes/update",
        MutationOp::ClearAttribute { .. } => "attributes/clear",
        MutationOp::CopyCategories { .. } => "categories/copy-all",
        MutationOp::CopyCategory { .. } => "categories/copy",
        MutationOp::AssignRmClassification { .. } => "rm-classifications",
        MutationOp::AssignClassifications { .. } => "classifications",
    }
}

fn normalize_base(services_url: &str) -> String {
    let trimmed = services_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn decode<T: DeserializeOwned>(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<T, ServiceError> {
    match result {
        Ok(response) => response
            .into_json::<T>()
            .map_err(|err| ServiceError::InvalidResponse(err.to_string())),
        Err(err) => Err(map_error(err)),
    }
}

fn accept(result: Result<ureq::Response, ureq::Error>) -> Result<(), ServiceError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) => Err(map_error(err)),
    }
}

fn map_error(err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(status, response) => match response.into_json::<ErrorBody>() {
            Ok(body) => ServiceError::Remote { code: body.error.code, message: body.error.message },
            Err(_) => ServiceError::remote(format!("service call failed with status {status}")),
        },
        other => ServiceError::Transport(other.to_string()),
    }
}
