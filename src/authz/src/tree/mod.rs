//! Permission tree module
//!
//! Parses dotted permission node strings and arranges them in a tree below
//! the implicit root `*`.
//!
//! # Node syntax
//!
//! - `towny.*` a wildcard; granting it grants every node below it
//! - `towny.chat.town` a plain leaf
//! - `towny.wild.build.<x>` a leaf that is granted per payload value
//!
//! # Example
//!
//! ```rust
//! use arbiter_authz::tree::PermissionTree;
//!
//! let tree = PermissionTree::with_nodes(["towny.*", "towny.chat.*", "towny.chat.town"]).unwrap();
//! let town = tree.node_by_id("towny.chat.town").unwrap();
//! assert_eq!(town.ancestors().len(), 3);
//! ```

mod node;
mod permission_tree;

pub use node::{embed_payload, split_payload, NodeSpec, PAYLOAD_SEGMENT, ROOT_NODE};
pub use permission_tree::{Permission, PermissionNode, PermissionTree};
