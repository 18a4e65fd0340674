//! # Arbiter Authorization Engine
//!
//! Role-based access control over hierarchical permission nodes.
//!
//! ## Features
//!
//! - **Permission tree** of dotted nodes with wildcards (`towny.chat.*`)
//!   and payload leaves (`towny.wild.build.<x>`)
//! - **Role graph** of subjects and roles with cycle-checked inheritance
//! - **Transitive resolution** through every ancestor role, diamonds included
//! - **Info export** of an entity's grants and ancestors
//! - **JSON/YAML persistence** of the whole graph
//!
//! ## Example
//!
//! ```rust
//! use arbiter_authz::Authority;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut auth = Authority::new();
//!     auth.register_permission_nodes([
//!         "towny.*",
//!         "towny.chat.*",
//!         "towny.chat.town",
//!         "towny.chat.global",
//!     ])?;
//!
//!     auth.add_role("food")?;
//!     auth.add_role("animal_based")?;
//!     auth.add_subject("egg")?;
//!     auth.role_add_inheritance("food", "animal_based")?;
//!     auth.role_assign_subject("animal_based", "egg")?;
//!     auth.role_grant_permission("food", "towny.chat.global", None)?;
//!
//!     assert!(auth.subject_has_permission("egg", "towny.chat.global", None)?);
//!     assert!(!auth.subject_has_permission("egg", "towny.chat.town", None)?);
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod config;
pub mod error;
pub mod graph;
pub mod info;
pub mod permission_map;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use authority::Authority;
pub use config::AuthorityConfig;
pub use error::{AuthzError, ErrorKind, Result};
pub use graph::{CycleDetector, EntityGraph, Permissionable, Role, Subject};
pub use info::{RoleInfo, SubjectInfo, TreeBranch};
pub use permission_map::{NodeMap, PermissionMap};
pub use resolver::{Grantor, PermissionResolver};
pub use store::{DataStore, Format};
pub use sync::SharedAuthority;
pub use tree::{Permission, PermissionNode, PermissionTree};
pub use types::{EntityId, EntityKind, IdNamespace};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
