//! JSON and YAML persistence of the entity graph
//!
//! Only entities, edges and grants are stored. The permission tree is
//! caller-defined code and must be registered again before loading.
//!
//! ```json
//! {
//!   "roles": {
//!     "str:food": {
//!       "child_roles": ["str:animal_based"],
//!       "subjects": [],
//!       "permission_nodes": ["towny.chat.*"]
//!     }
//!   },
//!   "subjects": {
//!     "str:egg": { "permission_nodes": ["towny.wild.build.<dirt>"] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::graph::{EntityGraph, Permissionable};
use crate::permission_map::PermissionMap;
use crate::tree::PermissionTree;
use crate::types::{EntityId, IdNamespace};

/// Stored form of a role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStore {
    /// Roles inheriting from this one
    #[serde(default)]
    pub child_roles: Vec<EntityId>,
    /// Direct member subjects
    #[serde(default)]
    pub subjects: Vec<EntityId>,
    #[serde(default)]
    pub permission_nodes: Vec<String>,
}

/// Stored form of a subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStore {
    #[serde(default)]
    pub permission_nodes: Vec<String>,
}

/// Complete stored state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStore {
    #[serde(default)]
    pub roles: BTreeMap<EntityId, RoleStore>,
    #[serde(default)]
    pub subjects: BTreeMap<EntityId, SubjectStore>,
}

/// Text format of a data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Picks the format from the file extension
    ///
    /// # Errors
    ///
    /// [`AuthzError::UnsupportedFormat`] for anything but `json`, `yaml`
    /// and `yml`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        match ext {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(AuthzError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl DataStore {
    /// Captures the current graph
    pub fn capture(tree: &PermissionTree, graph: &EntityGraph) -> Self {
        let roles = graph
            .roles()
            .map(|role| {
                (
                    role.id().clone(),
                    RoleStore {
                        child_roles: role.child_ids().iter().cloned().collect(),
                        subjects: role.subject_ids().iter().cloned().collect(),
                        permission_nodes: role.permission_map().serialize(tree),
                    },
                )
            })
            .collect();

        let subjects = graph
            .subjects()
            .map(|subject| {
                (
                    subject.id().clone(),
                    SubjectStore {
                        permission_nodes: subject.permission_map().serialize(tree),
                    },
                )
            })
            .collect();

        Self { roles, subjects }
    }

    /// Rebuilds a graph from stored state
    ///
    /// Entities come first, then grants, then memberships, then inheritance
    /// edges. Every edge goes through the same checks as a live mutation, so
    /// a stored cycle is rejected.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidData`] if an edge names an undefined entity
    /// - any registration, payload, identity or cycle error raised while
    ///   replaying the state
    pub fn restore(
        &self,
        tree: &PermissionTree,
        namespace: IdNamespace,
        max_id_length: Option<usize>,
    ) -> Result<EntityGraph> {
        let mut graph = EntityGraph::with_rules(namespace, max_id_length);

        for sid in self.subjects.keys() {
            graph.add_subject(sid.clone())?;
        }
        for rid in self.roles.keys() {
            graph.add_role(rid.clone())?;
        }

        for (sid, stored) in &self.subjects {
            let map = PermissionMap::from_serialized(tree, &stored.permission_nodes)?;
            *graph.subject_mut(sid)?.permission_map_mut() = map;
        }
        for (rid, stored) in &self.roles {
            let map = PermissionMap::from_serialized(tree, &stored.permission_nodes)?;
            *graph.role_mut(rid)?.permission_map_mut() = map;
        }

        for (rid, stored) in &self.roles {
            for sid in &stored.subjects {
                if !graph.contains_subject(sid) {
                    return Err(AuthzError::InvalidData(format!(
                        "role `{}` lists undefined subject `{}`",
                        rid, sid
                    )));
                }
                graph.assign_subject(rid, sid)?;
            }
        }

        for (rid, stored) in &self.roles {
            for child in &stored.child_roles {
                if !graph.contains_role(child) {
                    return Err(AuthzError::InvalidData(format!(
                        "role `{}` lists undefined child role `{}`",
                        rid, child
                    )));
                }
                graph.add_inheritance(rid, child)?;
            }
        }

        Ok(graph)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let data = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(data)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Writes the state to `path` in the format its extension names
    pub fn write_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let data = match Format::from_path(path)? {
            Format::Json => self.to_json(pretty)?,
            Format::Yaml => self.to_yaml()?,
        };
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Reads state from `path` in the format its extension names
    pub fn read_file(path: &Path) -> Result<Self> {
        let format = Format::from_path(path)?;
        let data = std::fs::read_to_string(path)?;
        match format {
            Format::Json => Self::from_json(&data),
            Format::Yaml => Self::from_yaml(&data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn tree() -> PermissionTree {
        PermissionTree::with_nodes([
            "towny.*",
            "towny.chat.*",
            "towny.chat.town",
            "towny.wild.*",
            "towny.wild.build.*",
            "towny.wild.build.<x>",
        ])
        .unwrap()
    }

    fn graph(tree: &PermissionTree) -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph.add_role(id("food")).unwrap();
        graph.add_role(id("animal_based")).unwrap();
        graph.add_subject(id("egg")).unwrap();
        graph.add_subject(EntityId::from(100)).unwrap();
        graph.add_inheritance(&id("food"), &id("animal_based")).unwrap();
        graph.assign_subject(&id("animal_based"), &id("egg")).unwrap();

        let chat = tree.node_by_id("towny.chat.*").unwrap();
        let build = tree.node_by_id("towny.wild.build.<x>").unwrap();
        graph
            .role_mut(&id("food"))
            .unwrap()
            .permission_map_mut()
            .grant(chat, None)
            .unwrap();
        let egg = graph.subject_mut(&id("egg")).unwrap().permission_map_mut();
        egg.grant(build, Some("dirt")).unwrap();
        egg.grant(build, Some("gold")).unwrap();
        graph
    }

    #[test]
    fn test_capture_layout() {
        let tree = tree();
        let store = DataStore::capture(&tree, &graph(&tree));

        assert_eq!(store.roles[&id("food")].child_roles, vec![id("animal_based")]);
        assert_eq!(store.roles[&id("animal_based")].subjects, vec![id("egg")]);
        assert_eq!(
            store.subjects[&id("egg")].permission_nodes,
            vec![
                "towny.wild.build.<dirt>".to_string(),
                "towny.wild.build.<gold>".to_string()
            ]
        );
        assert!(store.subjects.contains_key(&EntityId::from(100)));
    }

    #[test]
    fn test_json_round_trip() {
        let tree = tree();
        let original = graph(&tree);
        let data = DataStore::capture(&tree, &original).to_json(true).unwrap();

        assert!(data.contains("\"str:egg\""));
        assert!(data.contains("\"int:100\""));

        let restored = DataStore::from_json(&data)
            .unwrap()
            .restore(&tree, IdNamespace::PerKind, None)
            .unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_yaml_round_trip() {
        let tree = tree();
        let original = graph(&tree);
        let data = DataStore::capture(&tree, &original).to_yaml().unwrap();

        let restored = DataStore::from_yaml(&data)
            .unwrap()
            .restore(&tree, IdNamespace::PerKind, None)
            .unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_missing_sections_default() {
        let store = DataStore::from_json(r#"{"subjects": {"egg": {}}}"#).unwrap();
        assert!(store.roles.is_empty());
        assert!(store.subjects[&id("egg")].permission_nodes.is_empty());
    }

    #[test]
    fn test_stored_cycle_rejected() {
        let tree = tree();
        let data = r#"{
            "roles": {
                "str:a": {"child_roles": ["str:b"]},
                "str:b": {"child_roles": ["str:a"]}
            }
        }"#;
        let err = DataStore::from_json(data)
            .unwrap()
            .restore(&tree, IdNamespace::PerKind, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GraphIntegrity);
    }

    #[test]
    fn test_dangling_reference() {
        let tree = tree();
        let data = r#"{"roles": {"str:a": {"subjects": ["str:ghost"]}}}"#;
        let err = DataStore::from_json(data)
            .unwrap()
            .restore(&tree, IdNamespace::PerKind, None)
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidData(_)));
    }

    #[test]
    fn test_unknown_node_in_store() {
        let tree = tree();
        let data = r#"{"subjects": {"str:egg": {"permission_nodes": ["towny.chat.nation"]}}}"#;
        let err = DataStore::from_json(data)
            .unwrap()
            .restore(&tree, IdNamespace::PerKind, None)
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownPermission { .. }));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/state.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("state.yml")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("state.yaml")).unwrap(), Format::Yaml);
        assert!(matches!(
            Format::from_path(Path::new("state.toml")),
            Err(AuthzError::UnsupportedFormat(ext)) if ext == "toml"
        ));
        assert!(Format::from_path(Path::new("state")).is_err());
    }
}
