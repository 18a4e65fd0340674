//! Role and subject graph
//!
//! Subjects are leaves; roles form a DAG through inheritance edges where a
//! child role can use everything its parents grant. Edges are stored as ID
//! sets on both endpoints, never as references, so the store is a plain
//! owned arena.
//!
//! # Example
//!
//! ```rust
//! use arbiter_authz::graph::EntityGraph;
//! use arbiter_authz::EntityId;
//!
//! let mut graph = EntityGraph::new();
//! graph.add_role(EntityId::from("food")).unwrap();
//! graph.add_role(EntityId::from("animal_based")).unwrap();
//! graph
//!     .add_inheritance(&EntityId::from("food"), &EntityId::from("animal_based"))
//!     .unwrap();
//!
//! // closing the loop is rejected and leaves the graph as it was
//! assert!(graph
//!     .add_inheritance(&EntityId::from("animal_based"), &EntityId::from("food"))
//!     .is_err());
//! ```

mod cycle;
mod entity;
mod store;

pub use cycle::CycleDetector;
pub use entity::{Permissionable, Role, Subject};
pub use store::EntityGraph;
