use std::collections::HashSet;

use crate::{ContentService, MutationOp, NodeId, NodeOutcome};

/// Whether a mutation applies to the target node only or to its full
/// descendant closure.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Recursion {
    RootOnly,
    Subtree,
}

impl Recursion {
    #[must_use]
    pub fn is_subtree(self) -> bool {
        matches!(self, Self::Subtree)
    }
}

/// Applies one mutation across a node subtree, streaming one outcome
/// per visited node.
///
/// The walk is pre-order and error-tolerant: a node whose mutation
/// fails still gets its outcome, its siblings are still visited, and
/// its own children are still enumerated. Only a failed
/// child-enumeration call prunes a branch, and only that branch.
pub struct TreeMutationExecutor<'s, S: ContentService> {
    service: &'s mut S,
}

impl<'s, S: ContentService> TreeMutationExecutor<'s, S> {
    pub fn new(service: &'s mut S) -> Self {
        Self { service }
    }

    /// Walk the subtree rooted at `root`, applying `op` to every node
    /// visited. Outcomes are produced lazily, in pre-order, so callers
    /// can report progress before deep subtrees finish.
    #[must_use]
    pub fn apply(self, root: NodeId, op: &MutationOp, recursion: Recursion) -> Walk<'s, S> {
        Walk {
            service: self.service,
            op: op.clone(),
            recursion,
            origin: root,
            pending: vec![root],
            seen: HashSet::new(),
        }
    }
}

/// Lazy pre-order outcome stream produced by
/// [`TreeMutationExecutor::apply`].
pub struct Walk<'s, S: ContentService> {
    service: &'s mut S,
    op: MutationOp,
    recursion: Recursion,
    origin: NodeId,
    // Depth-first stack; the next node to visit sits on top. Children
    // are pushed in reverse so siblings come off in service order.
    pending: Vec<NodeId>,
    // Revisit guard: the walk skips a node id it has already visited
    // rather than looping forever on a cyclic hierarchy.
    seen: HashSet<NodeId>,
}

impl<S: ContentService> Iterator for Walk<'_, S> {
    type Item = NodeOutcome;

    fn next(&mut self) -> Option<NodeOutcome> {
        loop {
            let node = self.pending.pop()?;
            if !self.seen.insert(node) {
                tracing::warn!(node = node.0, "node hierarchy revisited an id; skipping");
                continue;
            }

            let outcome = match self.service.mutate(node, &self.op) {
                Ok(()) => NodeOutcome::succeeded(
                    node,
                    self.origin,
                    self.op.success_detail(node),
                ),
                Err(err) => NodeOutcome::failed(
                    node,
                    self.origin,
                    self.op.failure_detail(node, &err),
                ),
            };

            if self.recursion.is_subtree() {
                match self.service.list_children(node) {
                    Ok(children) => {
                        for child in children.into_iter().rev() {
                            self.pending.push(child);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            node = node.0,
                            error = %err,
                            "child enumeration failed; branch not descended"
                        );
                    }
                }
            }

            return Some(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::Value;

    use super::*;
    use crate::fake::InMemoryRepo;
    use crate::{CategoryId, ClassificationId};

    fn update_status_op() -> MutationOp {
        MutationOp::UpdateAttribute {
            category: CategoryId(5),
            attribute: "Status".to_string(),
            values: vec![Value::String("Final".to_string())],
            replace: vec![],
            add: false,
        }
    }

    fn apply_all(repo: &mut InMemoryRepo, root: i64, op: &MutationOp, recursion: Recursion) -> Vec<NodeOutcome> {
        TreeMutationExecutor::new(repo).apply(NodeId(root), op, recursion).collect()
    }

    #[test]
    fn root_only_visits_exactly_the_root() {
        let mut repo = InMemoryRepo::with_tree(&[(100, &[101, 102]), (101, &[103])]);
        let outcomes = apply_all(&mut repo, 100, &update_status_op(), Recursion::RootOnly);

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].node, NodeId(100));
        assert!(outcomes[0].success);
        assert_eq!(repo.mutated(), vec![NodeId(100)]);
    }

    #[test]
    fn subtree_visits_every_node_in_pre_order() {
        let mut repo = InMemoryRepo::with_tree(&[
            (1, &[2, 5]),
            (2, &[3, 4]),
            (5, &[6]),
        ]);
        let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);

        let visited: Vec<i64> = outcomes.iter().map(|o| o.node.0).collect();
        assert_eq!(visited, vec![1, 2, 3, 4, 5, 6]);
        assert!(outcomes.iter().all(|o| o.success));
        assert!(outcomes.iter().all(|o| o.origin == NodeId(1)));
    }

    #[test]
    fn failed_node_still_reports_siblings_and_parent() {
        // root=100 with children [101, 102]; the mutation fails only on
        // 101. Expected: [100 ok, 101 failed, 102 ok], in that order.
        let mut repo = InMemoryRepo::with_tree(&[(100, &[101, 102])]);
        repo.fail_mutation(NodeId(101), "category 5 is not applied to this node");

        let outcomes = apply_all(&mut repo, 100, &update_status_op(), Recursion::Subtree);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].node, NodeId(100));
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].node, NodeId(101));
        assert!(!outcomes[1].success);
        assert_eq!(
            outcomes[1].detail,
            "101 - attribute NOT updated. ERROR: category 5 is not applied to this node"
        );
        assert_eq!(outcomes[2].node, NodeId(102));
        assert!(outcomes[2].success);
    }

    #[test]
    fn failed_node_children_are_still_visited() {
        let mut repo = InMemoryRepo::with_tree(&[(1, &[2]), (2, &[3, 4])]);
        repo.fail_mutation(NodeId(2), "locked");

        let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);

        let visited: Vec<i64> = outcomes.iter().map(|o| o.node.0).collect();
        assert_eq!(visited, vec![1, 2, 3, 4]);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
        assert!(outcomes[3].success);
    }

    #[test]
    fn enumeration_failure_prunes_only_that_branch() {
        let mut repo = InMemoryRepo::with_tree(&[
            (1, &[2, 5]),
            (2, &[3, 4]),
            (5, &[6]),
        ]);
        repo.fail_children(NodeId(2), "permission denied");

        let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);

        // 3 and 4 are never discovered; 2 itself and the unrelated
        // branch under 5 are untouched.
        let visited: Vec<i64> = outcomes.iter().map(|o| o.node.0).collect();
        assert_eq!(visited, vec![1, 2, 5, 6]);
        assert!(outcomes.iter().all(|o| o.success));
    }

    #[test]
    fn cyclic_hierarchy_terminates_with_one_outcome_per_node() {
        let mut repo = InMemoryRepo::with_tree(&[(1, &[2]), (2, &[1])]);
        let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);

        let visited: Vec<i64> = outcomes.iter().map(|o| o.node.0).collect();
        assert_eq!(visited, vec![1, 2]);
    }

    #[test]
    fn every_mutation_kind_reports_failure_in_its_own_words() {
        let ops: Vec<(MutationOp, &str)> = vec![
            (update_status_op(), "attribute NOT updated"),
            (
                MutationOp::ClearAttribute {
                    category: CategoryId(5),
                    attribute: "Status".to_string(),
                },
                "attribute NOT cleared",
            ),
            (
                MutationOp::CopyCategories {
                    source: NodeId(2000),
                    merge_categories: false,
                    merge_attributes: false,
                },
                "categories NOT copied from 2000",
            ),
            (
                MutationOp::CopyCategory {
                    source: NodeId(2000),
                    category: CategoryId(7),
                    merge_attributes: false,
                },
                "category 7 NOT copied from 2000",
            ),
            (
                MutationOp::AssignRmClassification { classification: ClassificationId(30) },
                "RM classification NOT applied",
            ),
            (
                MutationOp::AssignClassifications {
                    classifications: vec![ClassificationId(30), ClassificationId(31)],
                },
                "classifications NOT applied",
            ),
        ];

        for (op, expected_fragment) in ops {
            let mut repo = InMemoryRepo::with_tree(&[]);
            repo.fail_mutation(NodeId(9), "boom");
            let outcomes = apply_all(&mut repo, 9, &op, Recursion::RootOnly);

            assert_eq!(outcomes.len(), 1, "op {}", op.kind());
            assert!(!outcomes[0].success, "op {}", op.kind());
            assert!(
                outcomes[0].detail.contains(expected_fragment),
                "op {}: {}",
                op.kind(),
                outcomes[0].detail
            );
        }
    }

    #[test]
    fn clearing_an_absent_attribute_is_a_no_op_success() {
        let op = MutationOp::ClearAttribute {
            category: CategoryId(5),
            attribute: "Status".to_string(),
        };
        let mut repo = InMemoryRepo::with_tree(&[]);

        // Never set: first clear is already a no-op.
        let first = apply_all(&mut repo, 50, &op, Recursion::RootOnly);
        assert!(first[0].success);

        // Clearing again after the attribute is gone must also succeed.
        let second = apply_all(&mut repo, 50, &op, Recursion::RootOnly);
        assert!(second[0].success);
        assert_eq!(second[0].detail, "50 - attribute cleared");
    }

    #[test]
    fn outcomes_stream_before_the_walk_finishes() {
        let mut repo = InMemoryRepo::with_tree(&[(1, &[2, 3])]);
        let op = update_status_op();
        let mut walk = TreeMutationExecutor::new(&mut repo).apply(NodeId(1), &op, Recursion::Subtree);

        let first = walk.next();
        assert_eq!(first.map(|o| o.node), Some(NodeId(1)));
        // Only the already-yielded node has been mutated at this point.
        drop(walk);
        assert!(repo.mutated().len() < 3);
    }

    // Reference pre-order over the same children map, for comparison
    // against the iterative walk.
    fn reference_preorder(
        children: &HashMap<i64, Vec<i64>>,
        node: i64,
        out: &mut Vec<i64>,
    ) {
        out.push(node);
        if let Some(kids) = children.get(&node) {
            for child in kids {
                reference_preorder(children, *child, out);
            }
        }
    }

    // Arbitrary tree on nodes 1..=n, rooted at 1: node i+1 hangs off a
    // uniformly chosen earlier node.
    fn tree_strategy() -> impl Strategy<Value = HashMap<i64, Vec<i64>>> {
        (1usize..40)
            .prop_flat_map(|n| {
                proptest::collection::vec(0usize..n, n.saturating_sub(1))
            })
            .prop_map(|parents| {
                let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
                for (index, parent_pick) in parents.into_iter().enumerate() {
                    let child = (index + 2) as i64;
                    let parent = (parent_pick % (index + 1)) as i64 + 1;
                    children.entry(parent).or_default().push(child);
                }
                children
            })
    }

    proptest! {
        #[test]
        fn walk_yields_one_outcome_per_node_in_pre_order(children in tree_strategy()) {
            let edges: Vec<(i64, Vec<i64>)> =
                children.iter().map(|(parent, kids)| (*parent, kids.clone())).collect();
            let mut repo = InMemoryRepo::with_tree_owned(&edges);

            let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);
            let visited: Vec<i64> = outcomes.iter().map(|o| o.node.0).collect();

            let mut expected = Vec::new();
            reference_preorder(&children, 1, &mut expected);

            prop_assert_eq!(visited, expected);
        }

        #[test]
        fn failures_never_change_the_visit_set(
            children in tree_strategy(),
            failing in proptest::collection::hash_set(1i64..40, 0..8),
        ) {
            let edges: Vec<(i64, Vec<i64>)> =
                children.iter().map(|(parent, kids)| (*parent, kids.clone())).collect();
            let mut repo = InMemoryRepo::with_tree_owned(&edges);
            for node in &failing {
                repo.fail_mutation(NodeId(*node), "injected");
            }

            let outcomes = apply_all(&mut repo, 1, &update_status_op(), Recursion::Subtree);

            let mut expected = Vec::new();
            reference_preorder(&children, 1, &mut expected);

            prop_assert_eq!(outcomes.len(), expected.len());
            for outcome in &outcomes {
                prop_assert_eq!(outcome.success, !failing.contains(&outcome.node.0));
            }
        }
    }
}
