//! Subjects and roles

use std::collections::BTreeSet;

use crate::permission_map::PermissionMap;
use crate::tree::PermissionNode;
use crate::types::{EntityId, EntityKind};

/// Capability shared by subjects and roles: holding direct grants
pub trait Permissionable {
    fn id(&self) -> &EntityId;

    fn kind(&self) -> EntityKind;

    fn permission_map(&self) -> &PermissionMap;

    fn permission_map_mut(&mut self) -> &mut PermissionMap;

    /// Checks direct grants only, ignoring roles
    fn has_permission(&self, node: &PermissionNode, payload: Option<&str>) -> bool {
        self.permission_map().has_permission(node, payload)
    }
}

/// Leaf member of the role graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: EntityId,
    permission_map: PermissionMap,
    /// Roles this subject is a direct member of
    pub(crate) role_ids: BTreeSet<EntityId>,
}

impl Subject {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            permission_map: PermissionMap::new(),
            role_ids: BTreeSet::new(),
        }
    }

    pub fn role_ids(&self) -> &BTreeSet<EntityId> {
        &self.role_ids
    }
}

impl Permissionable for Subject {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Subject
    }

    fn permission_map(&self) -> &PermissionMap {
        &self.permission_map
    }

    fn permission_map_mut(&mut self) -> &mut PermissionMap {
        &mut self.permission_map
    }
}

/// Group of subjects and roles
///
/// An edge `parent -> child` lets the child use every permission of the
/// parent. Subjects in `subject_ids` inherit this role's permissions and
/// those of all its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    id: EntityId,
    permission_map: PermissionMap,
    /// Direct member subjects
    pub(crate) subject_ids: BTreeSet<EntityId>,
    /// Roles this role inherits from
    pub(crate) parent_ids: BTreeSet<EntityId>,
    /// Roles inheriting from this role
    pub(crate) child_ids: BTreeSet<EntityId>,
}

impl Role {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            permission_map: PermissionMap::new(),
            subject_ids: BTreeSet::new(),
            parent_ids: BTreeSet::new(),
            child_ids: BTreeSet::new(),
        }
    }

    pub fn subject_ids(&self) -> &BTreeSet<EntityId> {
        &self.subject_ids
    }

    pub fn parent_ids(&self) -> &BTreeSet<EntityId> {
        &self.parent_ids
    }

    pub fn child_ids(&self) -> &BTreeSet<EntityId> {
        &self.child_ids
    }
}

impl Permissionable for Role {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Role
    }

    fn permission_map(&self) -> &PermissionMap {
        &self.permission_map
    }

    fn permission_map_mut(&mut self) -> &mut PermissionMap {
        &mut self.permission_map
    }
}
