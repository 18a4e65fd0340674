//! Caller-facing authority
//!
//! [`Authority`] owns the permission tree and the entity graph and exposes
//! every operation of the engine. Each call validates its inputs before
//! touching state, so a failed call leaves the authority unchanged.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::error::{AuthzError, ErrorKind, Result};
use crate::graph::{EntityGraph, Permissionable};
use crate::info::{InfoBuilder, RoleInfo, SubjectInfo};
use crate::permission_map::{NodeMap, PermissionMap};
use crate::resolver::{Grantor, PermissionResolver};
use crate::store::DataStore;
use crate::tree::{Permission, PermissionNode, PermissionTree, ROOT_NODE};
use crate::types::{EntityId, EntityKind, IdNamespace};

/// RBAC authority over one permission tree and one entity graph
#[derive(Debug, Clone)]
pub struct Authority {
    tree: PermissionTree,
    graph: EntityGraph,
    data_file: Option<PathBuf>,
    pretty: bool,
}

impl Default for Authority {
    fn default() -> Self {
        Self::new()
    }
}

impl Authority {
    /// Creates an authority with per-kind ID namespaces and no nodes but the
    /// root
    pub fn new() -> Self {
        Self::with_rules(IdNamespace::default(), None)
    }

    /// Creates an authority with explicit entity ID rules
    pub fn with_rules(namespace: IdNamespace, max_id_length: Option<usize>) -> Self {
        Self {
            tree: PermissionTree::new(),
            graph: EntityGraph::with_rules(namespace, max_id_length),
            data_file: None,
            pretty: true,
        }
    }

    /// Builds an authority from configuration and registers its nodes
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidConfig`] for a zero `max_id_length`
    /// - [`AuthzError::UnsupportedFormat`] if `data_file` has an unknown
    ///   extension
    /// - registration errors for the node list
    pub fn from_config(config: &AuthorityConfig) -> Result<Self> {
        config.validate_settings()?;

        let mut authority = Self::with_rules(config.id_namespace, config.max_id_length);
        authority.data_file = config.data_file.clone();
        authority.pretty = config.pretty;
        authority.register_permission_nodes(&config.nodes)?;

        info!(
            "Authority initialized with {} permission nodes, namespace={:?}",
            config.nodes.len(),
            config.id_namespace
        );
        Ok(authority)
    }

    // ------------------------------------------------------------------
    // Permission nodes
    // ------------------------------------------------------------------

    /// Registers permission nodes, parents first
    ///
    /// Accepts anything that views as `&str`, including caller-defined node
    /// enums implementing `AsRef<str>`.
    pub fn register_permission_nodes<I, S>(&mut self, nodes: I) -> Result<Vec<Permission>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tree.register_all(nodes)
    }

    pub fn register_permission_node(&mut self, node: &str) -> Result<Permission> {
        self.tree.register(node)
    }

    /// Id of the root node, which grants every permission
    pub fn root_node(&self) -> &'static str {
        ROOT_NODE
    }

    pub fn permission_tree(&self) -> &PermissionTree {
        &self.tree
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    /// Serialized form of a node with an optional payload
    pub fn serialize_node(&self, node: &str, payload: Option<&str>) -> Result<String> {
        let node = self.checked_node(node, payload)?;
        Ok(self.tree.serialize_node(node.permission(), payload))
    }

    /// Node id and payload of a serialized node string
    pub fn deserialize_node(&self, node: &str) -> Result<(String, Option<String>)> {
        let (permission, payload) = self.tree.resolve(node)?;
        Ok((self.tree.node(permission).id().to_string(), payload))
    }

    fn checked_node(&self, node: &str, payload: Option<&str>) -> Result<&PermissionNode> {
        let node = self.tree.node_by_id(node)?;
        node.validate_payload(payload)?;
        Ok(node)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn add_subject(&mut self, sid: impl Into<EntityId>) -> Result<()> {
        let sid = sid.into();
        self.graph.add_subject(sid.clone())?;
        info!("Added subject {}", sid);
        Ok(())
    }

    pub fn add_role(&mut self, rid: impl Into<EntityId>) -> Result<()> {
        let rid = rid.into();
        self.graph.add_role(rid.clone())?;
        info!("Added role {}", rid);
        Ok(())
    }

    /// Removes a subject and all its memberships
    pub fn remove_subject(&mut self, sid: impl Into<EntityId>) -> Result<()> {
        let sid = sid.into();
        let subject = self.graph.remove_subject(&sid)?;
        info!(
            "Removed subject {} (member of {} roles)",
            sid,
            subject.role_ids().len()
        );
        Ok(())
    }

    /// Removes a role with its memberships and inheritance edges
    pub fn remove_role(&mut self, rid: impl Into<EntityId>) -> Result<()> {
        let rid = rid.into();
        let role = self.graph.remove_role(&rid)?;
        info!(
            "Removed role {} ({} parents, {} children, {} subjects)",
            rid,
            role.parent_ids().len(),
            role.child_ids().len(),
            role.subject_ids().len()
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Lets `child` inherit every permission of `parent`
    pub fn role_add_inheritance(
        &mut self,
        parent: impl Into<EntityId>,
        child: impl Into<EntityId>,
    ) -> Result<()> {
        let (parent, child) = (parent.into(), child.into());
        match self.graph.add_inheritance(&parent, &child) {
            Ok(()) => {
                info!("Role {} now inherits from {}", child, parent);
                Ok(())
            }
            Err(err) => {
                if err.kind() == ErrorKind::GraphIntegrity {
                    warn!("Rejected inheritance {} -> {}: {}", parent, child, err);
                }
                Err(err)
            }
        }
    }

    pub fn role_remove_inheritance(
        &mut self,
        parent: impl Into<EntityId>,
        child: impl Into<EntityId>,
    ) -> Result<()> {
        let (parent, child) = (parent.into(), child.into());
        self.graph.remove_inheritance(&parent, &child)?;
        info!("Role {} no longer inherits from {}", child, parent);
        Ok(())
    }

    pub fn role_assign_subject(
        &mut self,
        rid: impl Into<EntityId>,
        sid: impl Into<EntityId>,
    ) -> Result<()> {
        let (rid, sid) = (rid.into(), sid.into());
        self.graph.assign_subject(&rid, &sid)?;
        info!("Assigned subject {} to role {}", sid, rid);
        Ok(())
    }

    pub fn role_unassign_subject(
        &mut self,
        rid: impl Into<EntityId>,
        sid: impl Into<EntityId>,
    ) -> Result<()> {
        let (rid, sid) = (rid.into(), sid.into());
        self.graph.unassign_subject(&rid, &sid)?;
        info!("Unassigned subject {} from role {}", sid, rid);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Grants
    // ------------------------------------------------------------------

    pub fn subject_grant_permission(
        &mut self,
        sid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        self.grant(EntityKind::Subject, sid.into(), node, payload)
    }

    pub fn role_grant_permission(
        &mut self,
        rid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        self.grant(EntityKind::Role, rid.into(), node, payload)
    }

    /// Revokes a grant; revoking something never granted is a no-op
    pub fn subject_revoke_permission(
        &mut self,
        sid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        self.revoke(EntityKind::Subject, sid.into(), node, payload)
    }

    /// Revokes a grant; revoking something never granted is a no-op
    pub fn role_revoke_permission(
        &mut self,
        rid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        self.revoke(EntityKind::Role, rid.into(), node, payload)
    }

    /// Replaces every direct grant of a subject with serialized `nodes`
    pub fn subject_set_permissions<I, S>(&mut self, sid: impl Into<EntityId>, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_permissions(EntityKind::Subject, sid.into(), nodes)
    }

    /// Replaces every direct grant of a role with serialized `nodes`
    pub fn role_set_permissions<I, S>(&mut self, rid: impl Into<EntityId>, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_permissions(EntityKind::Role, rid.into(), nodes)
    }

    fn grant(&mut self, kind: EntityKind, id: EntityId, node: &str, payload: Option<&str>) -> Result<()> {
        let node = self.tree.node_by_id(node)?;
        self.graph
            .entity_mut(kind, &id)?
            .permission_map_mut()
            .grant(node, payload)?;
        debug!("Granted {} (payload={:?}) to {} {}", node, payload, kind, id);
        Ok(())
    }

    fn revoke(&mut self, kind: EntityKind, id: EntityId, node: &str, payload: Option<&str>) -> Result<()> {
        let node = self.tree.node_by_id(node)?;
        self.graph
            .entity_mut(kind, &id)?
            .permission_map_mut()
            .revoke(node, payload)?;
        debug!("Revoked {} (payload={:?}) from {} {}", node, payload, kind, id);
        Ok(())
    }

    fn set_permissions<I, S>(&mut self, kind: EntityKind, id: EntityId, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.graph.entity(kind, &id)?;
        let map = PermissionMap::from_serialized(&self.tree, nodes)?;
        let count = map.len();
        *self.graph.entity_mut(kind, &id)?.permission_map_mut() = map;
        debug!("Replaced permissions of {} {} with {} entries", kind, id, count);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether a subject holds `node` directly or through any of its roles
    ///
    /// # Errors
    ///
    /// - [`AuthzError::UnknownPermission`] if `node` was never registered
    /// - payload contract errors for `node`
    /// - [`AuthzError::UnknownEntity`] if the subject does not exist
    pub fn subject_has_permission(
        &self,
        sid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .find_grantor(EntityKind::Subject, &sid.into(), node, payload)?
            .is_some())
    }

    /// Whether a role holds `node` directly or through its ancestors
    pub fn role_has_permission(
        &self,
        rid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .find_grantor(EntityKind::Role, &rid.into(), node, payload)?
            .is_some())
    }

    /// Entity whose direct grant gives the subject `node`
    pub fn subject_find_grantor(
        &self,
        sid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<Option<Grantor>> {
        self.find_grantor(EntityKind::Subject, &sid.into(), node, payload)
    }

    /// Entity whose direct grant gives the role `node`
    pub fn role_find_grantor(
        &self,
        rid: impl Into<EntityId>,
        node: &str,
        payload: Option<&str>,
    ) -> Result<Option<Grantor>> {
        self.find_grantor(EntityKind::Role, &rid.into(), node, payload)
    }

    fn find_grantor(
        &self,
        kind: EntityKind,
        id: &EntityId,
        node: &str,
        payload: Option<&str>,
    ) -> Result<Option<Grantor>> {
        let node = self.checked_node(node, payload)?;
        let resolution = PermissionResolver::new(&self.graph).resolve(kind, id, node, payload)?;

        debug!(
            "Permission check {} {} on {} (payload={:?}): granted={}, roles visited={}",
            kind,
            id,
            node,
            payload,
            resolution.is_granted(),
            resolution.roles_visited
        );
        Ok(resolution.grantor)
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn get_subjects(&self) -> BTreeSet<EntityId> {
        self.graph.subject_ids()
    }

    pub fn get_roles(&self) -> BTreeSet<EntityId> {
        self.graph.role_ids()
    }

    /// Direct roles of a subject
    pub fn subject_get_roles(&self, sid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        Ok(self.graph.subject(&sid.into())?.role_ids().clone())
    }

    /// Direct members of a role
    pub fn role_get_subjects(&self, rid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        Ok(self.graph.role(&rid.into())?.subject_ids().clone())
    }

    /// Roles inheriting directly from a role
    pub fn role_get_children(&self, rid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        Ok(self.graph.role(&rid.into())?.child_ids().clone())
    }

    /// Roles a role inherits from directly
    pub fn role_get_parents(&self, rid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        Ok(self.graph.role(&rid.into())?.parent_ids().clone())
    }

    pub fn role_get_ancestors(&self, rid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        self.graph.role_ancestors(&rid.into())
    }

    pub fn role_get_descendants(&self, rid: impl Into<EntityId>) -> Result<BTreeSet<EntityId>> {
        self.graph.role_descendants(&rid.into())
    }

    /// Direct grants of a subject, node id to payload set
    pub fn subject_get_permissions(&self, sid: impl Into<EntityId>) -> Result<NodeMap> {
        Ok(self
            .graph
            .subject(&sid.into())?
            .permission_map()
            .node_map(&self.tree))
    }

    /// Direct grants of a role, node id to payload set
    pub fn role_get_permissions(&self, rid: impl Into<EntityId>) -> Result<NodeMap> {
        Ok(self
            .graph
            .role(&rid.into())?
            .permission_map()
            .node_map(&self.tree))
    }

    pub fn subject_get_info(&self, sid: impl Into<EntityId>) -> Result<SubjectInfo> {
        InfoBuilder::new(&self.tree, &self.graph).subject_info(&sid.into())
    }

    pub fn role_get_info(&self, rid: impl Into<EntityId>) -> Result<RoleInfo> {
        InfoBuilder::new(&self.tree, &self.graph).role_info(&rid.into())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Snapshot of entities, edges and grants
    pub fn dump(&self) -> DataStore {
        DataStore::capture(&self.tree, &self.graph)
    }

    /// Replaces the whole graph with `data`
    ///
    /// The new graph is built aside and swapped in only if every entity,
    /// grant and edge was accepted.
    pub fn load(&mut self, data: &DataStore) -> Result<()> {
        let graph = data.restore(
            &self.tree,
            self.graph.namespace(),
            self.graph.max_id_length(),
        )?;
        self.graph = graph;

        info!(
            "Loaded {} subjects and {} roles",
            data.subjects.len(),
            data.roles.len()
        );
        Ok(())
    }

    pub fn dump_json(&self) -> Result<String> {
        self.dump().to_json(self.pretty)
    }

    pub fn dump_yaml(&self) -> Result<String> {
        self.dump().to_yaml()
    }

    pub fn load_json(&mut self, data: &str) -> Result<()> {
        self.load(&DataStore::from_json(data)?)
    }

    pub fn load_yaml(&mut self, data: &str) -> Result<()> {
        self.load(&DataStore::from_yaml(data)?)
    }

    /// Configured default data file
    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    pub fn set_data_file(&mut self, path: impl Into<PathBuf>) {
        self.data_file = Some(path.into());
    }

    /// Writes state to `path`, or to the configured data file
    ///
    /// # Errors
    ///
    /// - [`AuthzError::MissingPath`] if neither is set
    /// - [`AuthzError::UnsupportedFormat`] for unknown extensions
    pub fn save_file(&self, path: Option<&Path>) -> Result<()> {
        let path = self.target_path(path)?;
        self.dump().write_file(path, self.pretty)?;
        info!("Saved state to {}", path.display());
        Ok(())
    }

    /// Replaces state with the contents of `path`, or of the configured
    /// data file
    pub fn load_file(&mut self, path: Option<&Path>) -> Result<()> {
        let path = self.target_path(path)?.to_path_buf();
        let data = DataStore::read_file(&path)?;
        self.load(&data)?;
        info!("Loaded state from {}", path.display());
        Ok(())
    }

    fn target_path<'a>(&'a self, path: Option<&'a Path>) -> Result<&'a Path> {
        path.or(self.data_file.as_deref())
            .ok_or(AuthzError::MissingPath)
    }
}
