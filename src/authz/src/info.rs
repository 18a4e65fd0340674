//! Info export for subjects and roles
//!
//! Collects an entity's own grants, its direct links, every ancestor role
//! and a flattened permission tree of everything it can use. Ancestors are
//! visited in topological order, so the export also re-checks that the
//! role graph is acyclic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{EntityGraph, Permissionable};
use crate::permission_map::PermissionMap;
use crate::tree::{Permission, PermissionTree};
use crate::types::EntityId;

/// One branch of the flattened permission tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeBranch {
    /// Plain leaf, exported as `null`
    Leaf,
    /// Payload leaf with the granted payloads
    Payloads(Vec<String>),
    /// Wildcard expanded to every node below it
    Subtree(BTreeMap<String, TreeBranch>),
}

/// Node id to branch
pub type PermissionTreeInfo = BTreeMap<String, TreeBranch>;

/// Grants and parents of an ancestor role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub permission_nodes: Vec<String>,
    pub parents: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub entity_id: EntityId,
    pub permission_nodes: Vec<String>,
    pub roles: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSelfEntry {
    pub entity_id: EntityId,
    pub permission_nodes: Vec<String>,
    pub parents: Vec<EntityId>,
}

/// Everything a subject can use and where it comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subject: SubjectEntry,
    pub roles: BTreeMap<EntityId, RoleEntry>,
    pub permission_tree: PermissionTreeInfo,
}

/// Everything a role can use and where it comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: RoleSelfEntry,
    pub roles: BTreeMap<EntityId, RoleEntry>,
    pub permission_tree: PermissionTreeInfo,
}

/// Builds [`SubjectInfo`] and [`RoleInfo`] from a tree and a graph
pub struct InfoBuilder<'a> {
    tree: &'a PermissionTree,
    graph: &'a EntityGraph,
}

impl<'a> InfoBuilder<'a> {
    pub fn new(tree: &'a PermissionTree, graph: &'a EntityGraph) -> Self {
        Self { tree, graph }
    }

    /// Info for a subject
    ///
    /// `roles` holds the subject's direct roles and all their ancestors.
    ///
    /// # Errors
    ///
    /// - [`crate::AuthzError::UnknownEntity`] if the subject does not exist
    /// - [`crate::AuthzError::CycleDetected`] if the role graph is corrupt
    pub fn subject_info(&self, sid: &EntityId) -> Result<SubjectInfo> {
        let subject = self.graph.subject(sid)?;
        let order = self
            .graph
            .cycle_detector()
            .topological_order(subject.role_ids().iter())?;

        let mut permission_tree = PermissionTreeInfo::new();
        self.populate(&mut permission_tree, subject.permission_map());
        let roles = self.collect_roles(&order, &mut permission_tree)?;

        Ok(SubjectInfo {
            subject: SubjectEntry {
                entity_id: sid.clone(),
                permission_nodes: subject.permission_map().serialize(self.tree),
                roles: subject.role_ids().iter().cloned().collect(),
            },
            roles,
            permission_tree,
        })
    }

    /// Info for a role
    ///
    /// `roles` holds the role's ancestors but not the role itself.
    pub fn role_info(&self, rid: &EntityId) -> Result<RoleInfo> {
        let role = self.graph.role(rid)?;
        let order = self
            .graph
            .cycle_detector()
            .topological_order(role.parent_ids().iter())?;

        let mut permission_tree = PermissionTreeInfo::new();
        self.populate(&mut permission_tree, role.permission_map());
        let roles = self.collect_roles(&order, &mut permission_tree)?;

        Ok(RoleInfo {
            role: RoleSelfEntry {
                entity_id: rid.clone(),
                permission_nodes: role.permission_map().serialize(self.tree),
                parents: role.parent_ids().iter().cloned().collect(),
            },
            roles,
            permission_tree,
        })
    }

    fn collect_roles(
        &self,
        order: &[EntityId],
        permission_tree: &mut PermissionTreeInfo,
    ) -> Result<BTreeMap<EntityId, RoleEntry>> {
        let mut roles = BTreeMap::new();
        for rid in order {
            let role = self.graph.role(rid)?;
            self.populate(permission_tree, role.permission_map());
            roles.insert(
                rid.clone(),
                RoleEntry {
                    permission_nodes: role.permission_map().serialize(self.tree),
                    parents: role.parent_ids().iter().cloned().collect(),
                },
            );
        }
        Ok(roles)
    }

    fn populate(&self, permission_tree: &mut PermissionTreeInfo, map: &PermissionMap) {
        for (permission, payloads) in map.iter() {
            let node = self.tree.node(permission);
            let key = node.id().to_string();

            match permission_tree.get_mut(&key) {
                // another grantor already added this node; only payloads merge
                Some(TreeBranch::Payloads(existing)) => {
                    for payload in payloads {
                        if !existing.contains(payload) {
                            existing.push(payload.clone());
                        }
                    }
                    existing.sort();
                }
                Some(_) => {}
                None => {
                    let branch = if node.has_payload() {
                        TreeBranch::Payloads(payloads.iter().cloned().collect())
                    } else {
                        self.subtree(permission)
                    };
                    permission_tree.insert(key, branch);
                }
            }
        }
    }

    fn subtree(&self, permission: Permission) -> TreeBranch {
        let node = self.tree.node(permission);
        if node.is_leaf() {
            return if node.has_payload() {
                TreeBranch::Payloads(Vec::new())
            } else {
                TreeBranch::Leaf
            };
        }

        TreeBranch::Subtree(
            node.children()
                .map(|child| (self.tree.node(child).id().to_string(), self.subtree(child)))
                .collect(),
        )
    }
}
