//! Per-entity permission grants
//!
//! A [`PermissionMap`] maps granted permission nodes to payload sets. For
//! payload leaves the set lists the granted payloads; for every other node
//! the set is empty and presence alone means "granted".

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::tree::{Permission, PermissionNode, PermissionTree};

/// Node id to payload set view of a permission map
pub type NodeMap = BTreeMap<String, BTreeSet<String>>;

/// Permissions granted directly to one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMap {
    entries: BTreeMap<Permission, BTreeSet<String>>,
}

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `node`, optionally narrowed to `payload`
    ///
    /// Granting the same payload twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails without mutating the map if the payload contract of `node` is
    /// violated.
    pub fn grant(&mut self, node: &PermissionNode, payload: Option<&str>) -> Result<()> {
        node.validate_payload(payload)?;

        let payloads = self.entries.entry(node.permission()).or_default();
        if let Some(payload) = payload {
            payloads.insert(payload.to_string());
        }
        Ok(())
    }

    /// Revokes `node` or a single payload of it
    ///
    /// Without a payload the whole entry goes. With a payload only that value
    /// goes; a payload leaf left without payloads is dropped as it no longer
    /// grants anything. Revoking something never granted is a no-op.
    ///
    /// # Errors
    ///
    /// Fails without mutating the map if the payload contract of `node` is
    /// violated.
    pub fn revoke(&mut self, node: &PermissionNode, payload: Option<&str>) -> Result<()> {
        node.validate_payload(payload)?;

        let permission = node.permission();
        match payload {
            None => {
                self.entries.remove(&permission);
            }
            Some(payload) => {
                if let Some(payloads) = self.entries.get_mut(&permission) {
                    payloads.remove(payload);
                    if payloads.is_empty() {
                        self.entries.remove(&permission);
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks the grant for `node` held by this map alone
    ///
    /// A granted ancestor of `node` grants it regardless of payload.
    /// Otherwise the node itself must be present and, for payload leaves,
    /// carry `payload`.
    pub fn has_permission(&self, node: &PermissionNode, payload: Option<&str>) -> bool {
        if node
            .ancestors()
            .iter()
            .any(|ancestor| self.entries.contains_key(ancestor))
        {
            return true;
        }

        match self.entries.get(&node.permission()) {
            None => false,
            Some(_) if !node.has_payload() => true,
            Some(payloads) => payload.map_or(false, |p| payloads.contains(p)),
        }
    }

    /// Payload set of a directly granted node
    pub fn get(&self, permission: Permission) -> Option<&BTreeSet<String>> {
        self.entries.get(&permission)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.entries.contains_key(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Permission, &BTreeSet<String>)> {
        self.entries.iter().map(|(p, payloads)| (*p, payloads))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialized node strings, one per payload for payload leaves
    pub fn serialize(&self, tree: &PermissionTree) -> Vec<String> {
        let mut nodes = Vec::new();
        for (permission, payloads) in &self.entries {
            if tree.node(*permission).has_payload() {
                nodes.extend(
                    payloads
                        .iter()
                        .map(|payload| tree.serialize_node(*permission, Some(payload))),
                );
            } else {
                nodes.push(tree.serialize_node(*permission, None));
            }
        }
        nodes
    }

    /// Node id keyed copy of the grants
    pub fn node_map(&self, tree: &PermissionTree) -> NodeMap {
        self.entries
            .iter()
            .map(|(permission, payloads)| (tree.node(*permission).id().to_string(), payloads.clone()))
            .collect()
    }

    /// Builds a map from serialized node strings
    ///
    /// Accepts the output of [`PermissionMap::serialize`].
    pub fn from_serialized<I, S>(tree: &PermissionTree, nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for node in nodes {
            let (permission, payload) = tree.resolve(node.as_ref())?;
            map.grant(tree.node(permission), payload.as_deref())?;
        }
        Ok(map)
    }
}
