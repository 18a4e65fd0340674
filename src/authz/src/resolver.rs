//! Transitive permission resolution
//!
//! Answers "does this subject or role hold the permission?" by checking
//! the entity's own grants first and then every role in its ancestor
//! closure. The closure is walked with an explicit stack and a visited set,
//! so a role reachable through several paths (diamonds) is checked once.
//! The walk stops at the first match.

use std::collections::HashSet;

use crate::error::Result;
use crate::graph::{EntityGraph, Permissionable};
use crate::tree::PermissionNode;
use crate::types::{EntityId, EntityKind};

/// Entity whose direct grant satisfied a query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grantor {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// Outcome of a single resolution walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// First entity found holding the permission
    pub grantor: Option<Grantor>,
    /// Number of distinct roles whose grants were inspected
    pub roles_visited: usize,
}

impl Resolution {
    pub fn is_granted(&self) -> bool {
        self.grantor.is_some()
    }
}

/// Resolves permissions across the role graph
///
/// The resolver borrows the graph; it never mutates and keeps no state
/// between calls.
pub struct PermissionResolver<'a> {
    graph: &'a EntityGraph,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(graph: &'a EntityGraph) -> Self {
        Self { graph }
    }

    /// Whether the entity holds `node` directly or through any role
    ///
    /// The payload contract of `node` is not checked here; callers validate
    /// before querying.
    ///
    /// # Errors
    ///
    /// [`crate::AuthzError::UnknownEntity`] if the entity does not exist.
    pub fn obtains_permission(
        &self,
        kind: EntityKind,
        id: &EntityId,
        node: &PermissionNode,
        payload: Option<&str>,
    ) -> Result<bool> {
        Ok(self.resolve(kind, id, node, payload)?.is_granted())
    }

    /// The entity that grants `node`, if any
    pub fn find_grantor(
        &self,
        kind: EntityKind,
        id: &EntityId,
        node: &PermissionNode,
        payload: Option<&str>,
    ) -> Result<Option<Grantor>> {
        Ok(self.resolve(kind, id, node, payload)?.grantor)
    }

    /// Full resolution walk
    pub fn resolve(
        &self,
        kind: EntityKind,
        id: &EntityId,
        node: &PermissionNode,
        payload: Option<&str>,
    ) -> Result<Resolution> {
        let entity = self.graph.entity(kind, id)?;

        if entity.has_permission(node, payload) {
            return Ok(Resolution {
                grantor: Some(Grantor {
                    kind,
                    id: id.clone(),
                }),
                roles_visited: usize::from(kind == EntityKind::Role),
            });
        }

        let mut stack: Vec<&EntityId> = match kind {
            EntityKind::Subject => self.graph.subject(id)?.role_ids().iter().collect(),
            EntityKind::Role => self.graph.role(id)?.parent_ids().iter().collect(),
        };
        let mut visited: HashSet<&EntityId> = HashSet::new();
        if kind == EntityKind::Role {
            visited.insert(id);
        }

        while let Some(rid) = stack.pop() {
            if !visited.insert(rid) {
                continue;
            }

            let role = self.graph.role(rid)?;
            if role.has_permission(node, payload) {
                return Ok(Resolution {
                    grantor: Some(Grantor {
                        kind: EntityKind::Role,
                        id: rid.clone(),
                    }),
                    roles_visited: visited.len(),
                });
            }

            stack.extend(role.parent_ids().iter().filter(|p| !visited.contains(*p)));
        }

        Ok(Resolution {
            grantor: None,
            roles_visited: visited.len(),
        })
    }
}
