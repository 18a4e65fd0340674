//! Arena of subjects and roles keyed by ID
//!
//! Relationships are stored as ID sets on both endpoints and every mutation
//! keeps the two sides in step. Inheritance edges pass through the
//! [`CycleDetector`] before anything is written.

use std::collections::{BTreeMap, BTreeSet};

use super::cycle::CycleDetector;
use super::entity::{Permissionable, Role, Subject};
use crate::error::{AuthzError, Result};
use crate::types::{EntityId, EntityKind, IdNamespace};

/// Subject and role store with bidirectional edges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityGraph {
    subjects: BTreeMap<EntityId, Subject>,
    roles: BTreeMap<EntityId, Role>,
    namespace: IdNamespace,
    max_id_length: Option<usize>,
}

impl EntityGraph {
    /// Creates an empty graph with per-kind ID namespaces and no ID limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with explicit ID rules
    pub fn with_rules(namespace: IdNamespace, max_id_length: Option<usize>) -> Self {
        Self {
            namespace,
            max_id_length,
            ..Self::default()
        }
    }

    pub fn namespace(&self) -> IdNamespace {
        self.namespace
    }

    pub fn max_id_length(&self) -> Option<usize> {
        self.max_id_length
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn add_subject(&mut self, sid: EntityId) -> Result<()> {
        self.check_new_id(EntityKind::Subject, &sid)?;
        self.subjects.insert(sid.clone(), Subject::new(sid));
        Ok(())
    }

    pub fn add_role(&mut self, rid: EntityId) -> Result<()> {
        self.check_new_id(EntityKind::Role, &rid)?;
        self.roles.insert(rid.clone(), Role::new(rid));
        Ok(())
    }

    fn check_new_id(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        if let Some(limit) = self.max_id_length {
            if id.display_len() > limit {
                return Err(AuthzError::InvalidEntityId {
                    id: id.to_string(),
                    reason: format!("longer than {} characters", limit),
                });
            }
        }

        let taken_by = match (kind, self.namespace) {
            (EntityKind::Subject, _) if self.subjects.contains_key(id) => Some(EntityKind::Subject),
            (EntityKind::Role, _) if self.roles.contains_key(id) => Some(EntityKind::Role),
            (EntityKind::Subject, IdNamespace::Shared) if self.roles.contains_key(id) => {
                Some(EntityKind::Role)
            }
            (EntityKind::Role, IdNamespace::Shared) if self.subjects.contains_key(id) => {
                Some(EntityKind::Subject)
            }
            _ => None,
        };

        match taken_by {
            Some(kind) => Err(AuthzError::EntityIdCollision {
                kind,
                id: id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Removes a subject and its memberships
    pub fn remove_subject(&mut self, sid: &EntityId) -> Result<Subject> {
        let subject = self
            .subjects
            .remove(sid)
            .ok_or_else(|| AuthzError::unknown_subject(sid))?;

        for rid in &subject.role_ids {
            if let Some(role) = self.roles.get_mut(rid) {
                role.subject_ids.remove(sid);
            }
        }
        Ok(subject)
    }

    /// Removes a role together with its memberships and inheritance edges
    pub fn remove_role(&mut self, rid: &EntityId) -> Result<Role> {
        let role = self
            .roles
            .remove(rid)
            .ok_or_else(|| AuthzError::unknown_role(rid))?;

        for sid in &role.subject_ids {
            if let Some(subject) = self.subjects.get_mut(sid) {
                subject.role_ids.remove(rid);
            }
        }
        for parent_id in &role.parent_ids {
            if let Some(parent) = self.roles.get_mut(parent_id) {
                parent.child_ids.remove(rid);
            }
        }
        for child_id in &role.child_ids {
            if let Some(child) = self.roles.get_mut(child_id) {
                child.parent_ids.remove(rid);
            }
        }
        Ok(role)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Lets `child` inherit every permission of `parent`
    ///
    /// # Errors
    ///
    /// - [`AuthzError::UnknownEntity`] if either role is missing
    /// - [`AuthzError::RoleCycle`] if the edge would close a cycle; the
    ///   graph is left untouched
    pub fn add_inheritance(&mut self, parent: &EntityId, child: &EntityId) -> Result<()> {
        self.role(parent)?;
        self.role(child)?;

        CycleDetector::new(&self.roles).check_edge(parent, child)?;

        if let Some(role) = self.roles.get_mut(parent) {
            role.child_ids.insert(child.clone());
        }
        if let Some(role) = self.roles.get_mut(child) {
            role.parent_ids.insert(parent.clone());
        }
        Ok(())
    }

    /// Removes the edge `parent -> child`; absent edges are ignored
    pub fn remove_inheritance(&mut self, parent: &EntityId, child: &EntityId) -> Result<()> {
        self.role(parent)?;
        self.role(child)?;

        if let Some(role) = self.roles.get_mut(parent) {
            role.child_ids.remove(child);
        }
        if let Some(role) = self.roles.get_mut(child) {
            role.parent_ids.remove(parent);
        }
        Ok(())
    }

    /// Makes `sid` a member of `rid`
    pub fn assign_subject(&mut self, rid: &EntityId, sid: &EntityId) -> Result<()> {
        self.role(rid)?;
        self.subject(sid)?;

        if let Some(role) = self.roles.get_mut(rid) {
            role.subject_ids.insert(sid.clone());
        }
        if let Some(subject) = self.subjects.get_mut(sid) {
            subject.role_ids.insert(rid.clone());
        }
        Ok(())
    }

    /// Ends the membership of `sid` in `rid`; absent memberships are ignored
    pub fn unassign_subject(&mut self, rid: &EntityId, sid: &EntityId) -> Result<()> {
        self.role(rid)?;
        self.subject(sid)?;

        if let Some(role) = self.roles.get_mut(rid) {
            role.subject_ids.remove(sid);
        }
        if let Some(subject) = self.subjects.get_mut(sid) {
            subject.role_ids.remove(rid);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn subject(&self, sid: &EntityId) -> Result<&Subject> {
        self.subjects
            .get(sid)
            .ok_or_else(|| AuthzError::unknown_subject(sid))
    }

    pub fn subject_mut(&mut self, sid: &EntityId) -> Result<&mut Subject> {
        self.subjects
            .get_mut(sid)
            .ok_or_else(|| AuthzError::unknown_subject(sid))
    }

    pub fn role(&self, rid: &EntityId) -> Result<&Role> {
        self.roles.get(rid).ok_or_else(|| AuthzError::unknown_role(rid))
    }

    pub fn role_mut(&mut self, rid: &EntityId) -> Result<&mut Role> {
        self.roles
            .get_mut(rid)
            .ok_or_else(|| AuthzError::unknown_role(rid))
    }

    /// Subject or role behind a kind and ID
    pub fn entity(&self, kind: EntityKind, id: &EntityId) -> Result<&dyn Permissionable> {
        match kind {
            EntityKind::Subject => self.subject(id).map(|s| s as &dyn Permissionable),
            EntityKind::Role => self.role(id).map(|r| r as &dyn Permissionable),
        }
    }

    pub fn entity_mut(&mut self, kind: EntityKind, id: &EntityId) -> Result<&mut dyn Permissionable> {
        match kind {
            EntityKind::Subject => self.subject_mut(id).map(|s| s as &mut dyn Permissionable),
            EntityKind::Role => self.role_mut(id).map(|r| r as &mut dyn Permissionable),
        }
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn subject_ids(&self) -> BTreeSet<EntityId> {
        self.subjects.keys().cloned().collect()
    }

    pub fn role_ids(&self) -> BTreeSet<EntityId> {
        self.roles.keys().cloned().collect()
    }

    pub fn contains_subject(&self, sid: &EntityId) -> bool {
        self.subjects.contains_key(sid)
    }

    pub fn contains_role(&self, rid: &EntityId) -> bool {
        self.roles.contains_key(rid)
    }

    /// Cycle checks over the current role table
    pub fn cycle_detector(&self) -> CycleDetector<'_> {
        CycleDetector::new(&self.roles)
    }

    /// Every role `rid` inherits from, transitively, excluding `rid`
    pub fn role_ancestors(&self, rid: &EntityId) -> Result<BTreeSet<EntityId>> {
        let role = self.role(rid)?;
        Ok(self.closure(role.parent_ids.iter(), |r| &r.parent_ids))
    }

    /// Every role inheriting from `rid`, transitively, excluding `rid`
    pub fn role_descendants(&self, rid: &EntityId) -> Result<BTreeSet<EntityId>> {
        let role = self.role(rid)?;
        Ok(self.closure(role.child_ids.iter(), |r| &r.child_ids))
    }

    /// Direct roles of `sid` plus all of their ancestors
    pub fn subject_role_closure(&self, sid: &EntityId) -> Result<BTreeSet<EntityId>> {
        let subject = self.subject(sid)?;
        Ok(self.closure(subject.role_ids.iter(), |r| &r.parent_ids))
    }

    fn closure<'a, I, F>(&'a self, seeds: I, next: F) -> BTreeSet<EntityId>
    where
        I: Iterator<Item = &'a EntityId>,
        F: Fn(&'a Role) -> &'a BTreeSet<EntityId>,
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&EntityId> = seeds.collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(role) = self.roles.get(id) {
                stack.extend(next(role).iter());
            }
        }
        seen
    }

    /// All inheritance edges as `(parent, child)` pairs
    pub fn inheritance_edges(&self) -> BTreeSet<(EntityId, EntityId)> {
        self.roles
            .values()
            .flat_map(|role| {
                role.child_ids
                    .iter()
                    .map(move |child| (role.id().clone(), child.clone()))
            })
            .collect()
    }

    /// All memberships as `(role, subject)` pairs
    pub fn membership_edges(&self) -> BTreeSet<(EntityId, EntityId)> {
        self.roles
            .values()
            .flat_map(|role| {
                role.subject_ids
                    .iter()
                    .map(move |sid| (role.id().clone(), sid.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn food_graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        for rid in ["food", "animal_based", "plant_based"] {
            graph.add_role(id(rid)).unwrap();
        }
        for sid in ["egg", "spam", "pear"] {
            graph.add_subject(id(sid)).unwrap();
        }
        graph.add_inheritance(&id("food"), &id("animal_based")).unwrap();
        graph.add_inheritance(&id("food"), &id("plant_based")).unwrap();
        graph.assign_subject(&id("animal_based"), &id("egg")).unwrap();
        graph.assign_subject(&id("animal_based"), &id("spam")).unwrap();
        graph.assign_subject(&id("plant_based"), &id("pear")).unwrap();
        graph
    }

    #[test]
    fn test_duplicate_ids() {
        let mut graph = food_graph();
        assert!(matches!(
            graph.add_role(id("food")),
            Err(AuthzError::EntityIdCollision { kind: EntityKind::Role, .. })
        ));
        assert!(matches!(
            graph.add_subject(id("egg")),
            Err(AuthzError::EntityIdCollision { kind: EntityKind::Subject, .. })
        ));
    }

    #[test]
    fn test_per_kind_namespace_allows_cross_kind_reuse() {
        let mut graph = food_graph();
        graph.add_subject(id("food")).unwrap();
        graph.add_role(id("egg")).unwrap();
    }

    #[test]
    fn test_shared_namespace() {
        let mut graph = EntityGraph::with_rules(IdNamespace::Shared, None);
        graph.add_role(id("admin")).unwrap();
        assert!(matches!(
            graph.add_subject(id("admin")),
            Err(AuthzError::EntityIdCollision { kind: EntityKind::Role, .. })
        ));
    }

    #[test]
    fn test_max_id_length() {
        let mut graph = EntityGraph::with_rules(IdNamespace::PerKind, Some(4));
        graph.add_subject(id("abcd")).unwrap();
        graph.add_subject(EntityId::from(1234)).unwrap();
        assert!(matches!(
            graph.add_subject(id("abcde")),
            Err(AuthzError::InvalidEntityId { .. })
        ));
    }

    #[test]
    fn test_edges_are_bidirectional() {
        let graph = food_graph();
        assert!(graph.role(&id("food")).unwrap().child_ids().contains(&id("animal_based")));
        assert!(graph.role(&id("animal_based")).unwrap().parent_ids().contains(&id("food")));
        assert!(graph.role(&id("animal_based")).unwrap().subject_ids().contains(&id("egg")));
        assert!(graph.subject(&id("egg")).unwrap().role_ids().contains(&id("animal_based")));
    }

    #[test]
    fn test_unknown_entities() {
        let mut graph = food_graph();
        assert!(matches!(
            graph.add_inheritance(&id("food"), &id("meat")),
            Err(AuthzError::UnknownEntity { kind: EntityKind::Role, .. })
        ));
        assert!(matches!(
            graph.assign_subject(&id("food"), &id("ham")),
            Err(AuthzError::UnknownEntity { kind: EntityKind::Subject, .. })
        ));
        assert!(matches!(
            graph.remove_role(&id("meat")),
            Err(AuthzError::UnknownEntity { .. })
        ));
        assert!(matches!(
            graph.remove_subject(&id("ham")),
            Err(AuthzError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_cycle_leaves_graph_unchanged() {
        let mut graph = food_graph();
        let before = graph.clone();

        let result = graph.add_inheritance(&id("animal_based"), &id("food"));
        assert!(matches!(result, Err(AuthzError::RoleCycle { .. })));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_remove_role_cascades() {
        let mut graph = food_graph();
        graph.add_role(id("vegan")).unwrap();
        graph.add_inheritance(&id("plant_based"), &id("vegan")).unwrap();

        graph.remove_role(&id("plant_based")).unwrap();

        assert!(!graph.role(&id("food")).unwrap().child_ids().contains(&id("plant_based")));
        assert!(graph.role(&id("vegan")).unwrap().parent_ids().is_empty());
        assert!(graph.subject(&id("pear")).unwrap().role_ids().is_empty());
        assert!(graph
            .inheritance_edges()
            .iter()
            .all(|(p, c)| p != &id("plant_based") && c != &id("plant_based")));
    }

    #[test]
    fn test_remove_subject_cascades() {
        let mut graph = food_graph();
        graph.remove_subject(&id("egg")).unwrap();

        let members = graph.role(&id("animal_based")).unwrap().subject_ids();
        assert!(!members.contains(&id("egg")));
        assert!(members.contains(&id("spam")));
    }

    #[test]
    fn test_edge_removal() {
        let mut graph = food_graph();
        graph.remove_inheritance(&id("food"), &id("animal_based")).unwrap();
        graph.unassign_subject(&id("animal_based"), &id("egg")).unwrap();

        assert!(graph.role(&id("animal_based")).unwrap().parent_ids().is_empty());
        assert!(graph.subject(&id("egg")).unwrap().role_ids().is_empty());

        // absent edges are ignored
        graph.remove_inheritance(&id("food"), &id("animal_based")).unwrap();
        graph.unassign_subject(&id("animal_based"), &id("egg")).unwrap();
    }

    #[test]
    fn test_closures() {
        let mut graph = food_graph();
        graph.add_role(id("vegan")).unwrap();
        graph.add_inheritance(&id("plant_based"), &id("vegan")).unwrap();

        let ancestors = graph.role_ancestors(&id("vegan")).unwrap();
        assert_eq!(ancestors, [id("food"), id("plant_based")].into_iter().collect::<BTreeSet<_>>());

        let descendants = graph.role_descendants(&id("food")).unwrap();
        assert_eq!(
            descendants,
            [id("animal_based"), id("plant_based"), id("vegan")].into_iter().collect::<BTreeSet<_>>()
        );

        let roles = graph.subject_role_closure(&id("egg")).unwrap();
        assert_eq!(roles, [id("animal_based"), id("food")].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_edge_snapshots() {
        let graph = food_graph();
        assert_eq!(graph.inheritance_edges().len(), 2);
        assert!(graph
            .membership_edges()
            .contains(&(id("plant_based"), id("pear"))));
    }
}
