//! In-memory stand-in for the remote repository, with per-node failure
//! injection. Test support only.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    ContainerKind, ContentService, Creation, MutationOp, NodeId, ServiceError, ServiceWarning,
};

#[derive(Default)]
pub struct InMemoryRepo {
    children: HashMap<i64, Vec<i64>>,
    attributes: HashMap<(i64, i64, String), Vec<Value>>,
    fail_mutations: HashMap<i64, String>,
    fail_children: HashMap<i64, String>,
    mutated: Vec<NodeId>,
    next_created: i64,
    create_warnings: Vec<ServiceWarning>,
    fail_create: Option<String>,
    created: Vec<(String, NodeId, ContainerKind)>,
    template_calls: Vec<(NodeId, NodeId)>,
}

impl InMemoryRepo {
    pub fn with_tree(edges: &[(i64, &[i64])]) -> Self {
        let mut repo = Self { next_created: 7000, ..Self::default() };
        for (parent, kids) in edges {
            repo.children.insert(*parent, kids.to_vec());
        }
        repo
    }

    pub fn with_tree_owned(edges: &[(i64, Vec<i64>)]) -> Self {
        let mut repo = Self { next_created: 7000, ..Self::default() };
        for (parent, kids) in edges {
            repo.children.insert(*parent, kids.clone());
        }
        repo
    }

    pub fn fail_mutation(&mut self, node: NodeId, message: &str) {
        self.fail_mutations.insert(node.0, message.to_string());
    }

    pub fn fail_children(&mut self, node: NodeId, message: &str) {
        self.fail_children.insert(node.0, message.to_string());
    }

    pub fn warn_on_create(&mut self, warning: ServiceWarning) {
        self.create_warnings.push(warning);
    }

    pub fn fail_create(&mut self, message: &str) {
        self.fail_create = Some(message.to_string());
    }

    pub fn mutated(&self) -> Vec<NodeId> {
        self.mutated.clone()
    }

    pub fn created(&self) -> &[(String, NodeId, ContainerKind)] {
        &self.created
    }

    pub fn template_calls(&self) -> &[(NodeId, NodeId)] {
        &self.template_calls
    }

    pub fn attribute(&self, node: NodeId, category: i64, attribute: &str) -> Option<&Vec<Value>> {
        self.attributes.get(&(node.0, category, attribute.to_string()))
    }

    fn visited(&self) -> HashSet<i64> {
        self.mutated.iter().map(|n| n.0).collect()
    }
}

impl ContentService for InMemoryRepo {
    fn mutate(&mut self, node: NodeId, op: &MutationOp) -> Result<(), ServiceError> {
        self.mutated.push(node);
        if let Some(message) = self.fail_mutations.get(&node.0) {
            return Err(ServiceError::remote(message.clone()));
        }

        match op {
            MutationOp::UpdateAttribute { category, attribute, values, .. } => {
                self.attributes
                    .insert((node.0, category.0, attribute.clone()), values.clone());
            }
            MutationOp::ClearAttribute { category, attribute } => {
                // Clearing an attribute that holds no values succeeds;
                // the repository treats it as a no-op.
                self.attributes.remove(&(node.0, category.0, attribute.clone()));
            }
            _ => {}
        }

        Ok(())
    }

    fn list_children(&mut self, node: NodeId) -> Result<Vec<NodeId>, ServiceError> {
        if let Some(message) = self.fail_children.get(&node.0) {
            return Err(ServiceError::remote(message.clone()));
        }
        Ok(self
            .children
            .get(&node.0)
            .map(|kids| kids.iter().map(|id| NodeId(*id)).collect())
            .unwrap_or_default())
    }

    fn create_container(
        &mut self,
        name: &str,
        parent: NodeId,
        kind: ContainerKind,
    ) -> Result<Creation, ServiceError> {
        if let Some(message) = self.fail_create.take() {
            return Err(ServiceError::remote(message));
        }
        self.next_created += 1;
        let node = NodeId(self.next_created);
        self.created.push((name.to_string(), parent, kind));
        Ok(Creation { node, warnings: std::mem::take(&mut self.create_warnings) })
    }

    fn update_from_template(
        &mut self,
        node: NodeId,
        template: NodeId,
    ) -> Result<(), ServiceError> {
        self.template_calls.push((node, template));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_node_has_no_children() {
        let mut repo = InMemoryRepo::with_tree(&[(1, &[2])]);
        let children = match repo.list_children(NodeId(99)) {
            Ok(children) => children,
            Err(err) => panic!("leaf lookup should succeed: {err}"),
        };
        assert!(children.is_empty());
        assert!(repo.visited().is_empty());
    }
}
