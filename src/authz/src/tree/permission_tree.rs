//! Hierarchical permission tree
//!
//! Nodes live in an arena and are addressed by [`Permission`] handles. The
//! tree is built once at startup and is append-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use super::node::{self, NodeSpec, ROOT_NODE};
use crate::error::{AuthzError, Result};

/// Handle to a registered permission node
///
/// Two handles from the same tree are equal iff they name the same node.
/// Handles are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission(u32);

impl Permission {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the permission tree
#[derive(Debug, Clone)]
pub struct PermissionNode {
    permission: Permission,
    id: String,
    key: String,
    parent: Option<Permission>,
    children: BTreeMap<String, Permission>,
    ancestors: Vec<Permission>,
    is_leaf: bool,
    has_payload: bool,
}

impl PermissionNode {
    fn root() -> Self {
        Self {
            permission: Permission(0),
            id: ROOT_NODE.to_string(),
            key: ROOT_NODE.to_string(),
            parent: None,
            children: BTreeMap::new(),
            ancestors: Vec::new(),
            is_leaf: false,
            has_payload: false,
        }
    }

    /// Handle of this node
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Full node id (`towny.chat.*`, `towny.wild.build.<x>`)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Segment naming this node below its parent
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<Permission> {
        self.parent
    }

    /// Direct children ordered by key
    pub fn children(&self) -> impl Iterator<Item = Permission> + '_ {
        self.children.values().copied()
    }

    /// Ancestors ordered from the root down to the immediate parent
    pub fn ancestors(&self) -> &[Permission] {
        &self.ancestors
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn has_payload(&self) -> bool {
        self.has_payload
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Checks the payload contract of this node
    ///
    /// # Errors
    ///
    /// - [`AuthzError::MissingPayload`] if the node needs a payload and none
    ///   (or an empty one) was given
    /// - [`AuthzError::UnusedPayload`] if the node takes no payload but one
    ///   was given
    pub fn validate_payload(&self, payload: Option<&str>) -> Result<()> {
        match (self.has_payload, payload) {
            (true, None) | (true, Some("")) => Err(AuthzError::MissingPayload {
                node: self.id.clone(),
            }),
            (false, Some(payload)) => Err(AuthzError::UnusedPayload {
                node: self.id.clone(),
                payload: payload.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PermissionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Registry of permission nodes arranged as a tree below the root `*`
#[derive(Debug, Clone)]
pub struct PermissionTree {
    nodes: Vec<PermissionNode>,
    index: HashMap<String, Permission>,
}

impl PermissionTree {
    /// Creates a tree holding only the root node
    pub fn new() -> Self {
        let root = PermissionNode::root();
        let mut index = HashMap::new();
        index.insert(root.id.clone(), root.permission);

        Self {
            nodes: vec![root],
            index,
        }
    }

    /// Creates a tree and registers `nodes` in order
    ///
    /// Parents must precede their children in the iteration order.
    pub fn with_nodes<I, S>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        tree.register_all(nodes)?;
        Ok(tree)
    }

    /// Registers several nodes as one batch
    ///
    /// The batch is built on a copy of the tree and committed only if every
    /// node registers; on failure the tree is left as it was.
    pub fn register_all<I, S>(&mut self, nodes: I) -> Result<Vec<Permission>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut staged = self.clone();
        let permissions = nodes
            .into_iter()
            .map(|node| staged.register(node.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        *self = staged;
        Ok(permissions)
    }

    /// Registers a single node
    ///
    /// Every wildcard on the path must already be registered: `a.b.c`
    /// requires `a.*` and `a.b.*`. Intermediate wildcards are never created
    /// implicitly.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidNode`] for malformed node strings
    /// - [`AuthzError::DuplicateNode`] if the node exists
    /// - [`AuthzError::MissingParent`] if a wildcard on the path is missing
    /// - [`AuthzError::InvalidParent`] if the path runs through a leaf
    pub fn register(&mut self, node: &str) -> Result<Permission> {
        let spec = NodeSpec::parse(node)?;

        if self.index.contains_key(&spec.id) {
            return Err(AuthzError::DuplicateNode { node: spec.id });
        }

        let parent = self.walk_to_parent(&spec)?;

        if let Some(existing) = self.nodes[parent.index()].children.get(&spec.key) {
            return Err(AuthzError::InvalidNode {
                node: spec.id.clone(),
                reason: format!(
                    "segment `{}` is already taken by `{}`",
                    spec.key,
                    self.nodes[existing.index()].id
                ),
            });
        }

        let permission = next_handle(self.nodes.len()).ok_or_else(|| AuthzError::InvalidNode {
            node: spec.id.clone(),
            reason: "the permission tree is full".to_string(),
        })?;
        let parent_node = &self.nodes[parent.index()];
        let mut ancestors = parent_node.ancestors.clone();
        ancestors.push(parent);

        let new_node = PermissionNode {
            permission,
            id: spec.id.clone(),
            key: spec.key.clone(),
            parent: Some(parent),
            children: BTreeMap::new(),
            ancestors,
            is_leaf: spec.is_leaf,
            has_payload: spec.has_payload,
        };

        self.nodes[parent.index()]
            .children
            .insert(spec.key.clone(), permission);
        self.index.insert(spec.id.clone(), permission);
        self.nodes.push(new_node);

        debug!("Registered permission node {}", spec.id);
        Ok(permission)
    }

    /// Follows the parent path from the root through the children maps
    fn walk_to_parent(&self, spec: &NodeSpec) -> Result<Permission> {
        let mut current = self.root();

        for (depth, segment) in spec.parent_path.iter().enumerate() {
            let node = &self.nodes[current.index()];
            match node.children.get(segment) {
                Some(child) if self.nodes[child.index()].is_leaf => {
                    return Err(AuthzError::InvalidParent {
                        node: spec.id.clone(),
                        parent: self.nodes[child.index()].id.clone(),
                    });
                }
                Some(child) => current = *child,
                None => {
                    return Err(AuthzError::MissingParent {
                        node: spec.id.clone(),
                        parent: node::wildcard_id(&spec.parent_path[..=depth]),
                    });
                }
            }
        }

        Ok(current)
    }

    /// Root handle (`*`)
    pub fn root(&self) -> Permission {
        Permission(0)
    }

    /// Looks up a node by its exact id
    pub fn get(&self, node: &str) -> Result<Permission> {
        self.index
            .get(node)
            .copied()
            .ok_or_else(|| AuthzError::UnknownPermission {
                node: node.to_string(),
            })
    }

    /// Resolves a possibly payload-bearing node string
    ///
    /// `towny.wild.build.<dirt>` resolves to the `towny.wild.build.<x>` node
    /// and the payload `dirt`; plain ids resolve to themselves.
    pub fn resolve(&self, node: &str) -> Result<(Permission, Option<String>)> {
        if let Some(permission) = self.lookup_plain(node) {
            return Ok((permission, None));
        }

        let (canonical, payload) = node::split_payload(node);
        match (self.index.get(&canonical), payload) {
            (Some(permission), Some(payload)) => Ok((*permission, Some(payload))),
            _ => Err(AuthzError::UnknownPermission {
                node: node.to_string(),
            }),
        }
    }

    /// Exact lookup that refuses payload leaves, whose ids are placeholders
    fn lookup_plain(&self, node: &str) -> Option<Permission> {
        self.index
            .get(node)
            .copied()
            .filter(|p| !self.nodes[p.index()].has_payload)
    }

    /// Serialized form of a node with an optional concrete payload
    pub fn serialize_node(&self, permission: Permission, payload: Option<&str>) -> String {
        let node = self.node(permission);
        match payload {
            Some(payload) if node.has_payload => node::embed_payload(&node.id, payload),
            _ => node.id.clone(),
        }
    }

    /// Node data for a handle
    ///
    /// # Panics
    ///
    /// Panics if `permission` was issued by a different, larger tree.
    pub fn node(&self, permission: Permission) -> &PermissionNode {
        &self.nodes[permission.index()]
    }

    /// Node data for an id
    pub fn node_by_id(&self, node: &str) -> Result<&PermissionNode> {
        self.get(node).map(|p| self.node(p))
    }

    /// Whether `ancestor` lies strictly above `descendant`
    pub fn is_ancestor(&self, ancestor: Permission, descendant: Permission) -> bool {
        self.node(descendant).ancestors.contains(&ancestor)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.index.contains_key(node)
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root is always present
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in registration order, root first
    pub fn iter(&self) -> impl Iterator<Item = &PermissionNode> {
        self.nodes.iter()
    }
}

/// Handle for the node stored at arena index `len`
fn next_handle(len: usize) -> Option<Permission> {
    u32::try_from(len).ok().map(Permission)
}

impl Default for PermissionTree {
    fn default() -> Self {
        Self::new()
    }
}
