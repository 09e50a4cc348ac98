use crate::{ContainerKind, ContentService, Creation, NodeId, ServiceError};

/// Create a container and, when a template is supplied, copy the
/// template configuration onto the new node.
///
/// Warnings reported by the create call are returned unchanged on the
/// [`Creation`]. The template follow-up runs exactly once, and only
/// when the create produced a usable node id and no warning reports
/// the target as already existing — a pre-existing container must not
/// have a template stamped over its configuration.
///
/// # Errors
/// Returns [`ServiceError`] when the create call or the template
/// follow-up fails. Warnings alone never produce an error.
pub fn create_with_template<S: ContentService>(
    service: &mut S,
    name: &str,
    parent: NodeId,
    kind: ContainerKind,
    template: Option<NodeId>,
) -> Result<Creation, ServiceError> {
    let creation = service.create_container(name, parent, kind)?;

    if let Some(template) = template {
        if template.is_valid() && creation.node.is_valid() && !creation.suppresses_template_copy()
        {
            service.update_from_template(creation.node, template)?;
        } else if creation.suppresses_template_copy() {
            tracing::warn!(
                node = creation.node.0,
                "container already existed; template configuration not copied"
            );
        }
    }

    Ok(creation)
}
