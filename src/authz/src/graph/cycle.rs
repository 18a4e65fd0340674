//! Cycle detection and topological ordering for the role graph
//!
//! Both walks are depth-first searches with three states:
//! - unvisited (absent from the mark table)
//! - visiting: on the current DFS path
//! - done: fully explored
//!
//! Meeting a node that is still `visiting` means the path closed a cycle.

use std::collections::{BTreeMap, HashMap};

use super::entity::Role;
use crate::error::{AuthzError, Result};
use crate::types::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Read-only cycle checks over a role table
pub struct CycleDetector<'a> {
    roles: &'a BTreeMap<EntityId, Role>,
}

impl<'a> CycleDetector<'a> {
    pub fn new(roles: &'a BTreeMap<EntityId, Role>) -> Self {
        Self { roles }
    }

    /// Verifies that the edge `parent -> child` keeps the graph acyclic
    ///
    /// The edge closes a cycle iff `child` is `parent` itself or already an
    /// ancestor of `parent`, so the search walks upward from `parent`
    /// through `parent_ids` looking for `child`.
    ///
    /// # Errors
    ///
    /// [`AuthzError::RoleCycle`] with the offending path written in grant
    /// flow order, e.g. `A -> C -> E -> A` for a rejected edge `E -> A`.
    pub fn check_edge(&self, parent: &EntityId, child: &EntityId) -> Result<()> {
        if parent == child {
            return Err(AuthzError::RoleCycle {
                parent: parent.clone(),
                child: child.clone(),
                path: format!("{} -> {}", parent, child),
            });
        }

        let start = match self.roles.get_key_value(parent) {
            Some((key, _)) => key,
            None => return Ok(()),
        };

        let mut marks: HashMap<&EntityId, Mark> = HashMap::new();
        let mut path: Vec<&EntityId> = Vec::new();

        if self.search_upward(start, child, &mut marks, &mut path) {
            // `path` runs upward from `parent` to `child`
            let mut flow: Vec<String> = path.iter().rev().map(|id| id.to_string()).collect();
            flow.push(child.to_string());
            return Err(AuthzError::RoleCycle {
                parent: parent.clone(),
                child: child.clone(),
                path: flow.join(" -> "),
            });
        }

        Ok(())
    }

    fn search_upward(
        &self,
        current: &'a EntityId,
        target: &EntityId,
        marks: &mut HashMap<&'a EntityId, Mark>,
        path: &mut Vec<&'a EntityId>,
    ) -> bool {
        if marks.contains_key(current) {
            return false;
        }

        marks.insert(current, Mark::Visiting);
        path.push(current);

        if current == target {
            return true;
        }

        if let Some(role) = self.roles.get(current) {
            for parent_id in &role.parent_ids {
                if self.search_upward(parent_id, target, marks, path) {
                    return true;
                }
            }
        }

        marks.insert(current, Mark::Done);
        path.pop();
        false
    }

    /// Orders the ancestor closure of `starts` so that every role comes
    /// after all of its parents
    ///
    /// The start roles themselves are included.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::UnknownEntity`] if a start role does not exist
    /// - [`AuthzError::CycleDetected`] if the walk meets a role still in
    ///   progress, which the edge checks should make impossible
    pub fn topological_order<'s, I>(&self, starts: I) -> Result<Vec<EntityId>>
    where
        I: IntoIterator<Item = &'s EntityId>,
    {
        let mut marks: HashMap<&EntityId, Mark> = HashMap::new();
        let mut path: Vec<&EntityId> = Vec::new();
        let mut order = Vec::new();

        for start in starts {
            let (key, _) = self
                .roles
                .get_key_value(start)
                .ok_or_else(|| AuthzError::unknown_role(start))?;
            self.visit_parents_first(key, &mut marks, &mut path, &mut order)?;
        }

        Ok(order)
    }

    fn visit_parents_first(
        &self,
        current: &'a EntityId,
        marks: &mut HashMap<&'a EntityId, Mark>,
        path: &mut Vec<&'a EntityId>,
        order: &mut Vec<EntityId>,
    ) -> Result<()> {
        match marks.get(current) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|id| *id == current).unwrap_or(0);
                let cycle: Vec<String> = path[start..]
                    .iter()
                    .chain(std::iter::once(&current))
                    .map(|id| id.to_string())
                    .collect();
                return Err(AuthzError::CycleDetected(cycle.join(" -> ")));
            }
            None => {}
        }

        marks.insert(current, Mark::Visiting);
        path.push(current);

        if let Some(role) = self.roles.get(current) {
            for parent_id in &role.parent_ids {
                self.visit_parents_first(parent_id, marks, path, order)?;
            }
        }

        marks.insert(current, Mark::Done);
        path.pop();
        order.push(current.clone());
        Ok(())
    }

    /// Scans the whole table for a cycle
    pub fn detect_cycles(&self) -> Result<()> {
        self.topological_order(self.roles.keys()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a role table from `(parent, child)` edges without any checks
    fn table(roles: &[&str], edges: &[(&str, &str)]) -> BTreeMap<EntityId, Role> {
        let mut table: BTreeMap<EntityId, Role> = roles
            .iter()
            .map(|id| (EntityId::from(*id), Role::new(EntityId::from(*id))))
            .collect();
        for (parent, child) in edges {
            let parent = EntityId::from(*parent);
            let child = EntityId::from(*child);
            table.get_mut(&parent).unwrap().child_ids.insert(child.clone());
            table.get_mut(&child).unwrap().parent_ids.insert(parent);
        }
        table
    }

    fn acyclic() -> BTreeMap<EntityId, Role> {
        //       A
        //      / \
        //     B   C
        //    /   / \
        //   |   D   E
        //   | /
        //   F
        table(
            &["A", "B", "C", "D", "E", "F"],
            &[("A", "B"), ("A", "C"), ("B", "F"), ("C", "D"), ("C", "E"), ("D", "F")],
        )
    }

    #[test]
    fn test_allowed_edges() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);
        let id = |s: &str| EntityId::from(s);

        assert!(detector.check_edge(&id("A"), &id("F")).is_ok());
        assert!(detector.check_edge(&id("E"), &id("F")).is_ok());
        assert!(detector.check_edge(&id("B"), &id("D")).is_ok());
    }

    #[test]
    fn test_self_edge() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);
        let a = EntityId::from("A");
        assert!(matches!(
            detector.check_edge(&a, &a),
            Err(AuthzError::RoleCycle { .. })
        ));
    }

    #[test]
    fn test_long_cycle_reports_path() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);

        let err = detector
            .check_edge(&EntityId::from("E"), &EntityId::from("A"))
            .unwrap_err();
        match err {
            AuthzError::RoleCycle { path, .. } => assert_eq!(path, "A -> C -> E -> A"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cycle_through_diamond() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);

        let err = detector
            .check_edge(&EntityId::from("F"), &EntityId::from("A"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::RoleCycle { .. }));
    }

    #[test]
    fn test_topological_order_parents_first() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);

        let order = detector.topological_order([&EntityId::from("F")]).unwrap();
        let pos = |s: &str| order.iter().position(|id| id == &EntityId::from(s)).unwrap();

        assert_eq!(order.len(), 5);
        assert!(pos("A") < pos("B"));
        assert!(pos("A") < pos("C"));
        assert!(pos("C") < pos("D"));
        assert!(pos("B") < pos("F"));
        assert!(pos("D") < pos("F"));
        assert!(!order.contains(&EntityId::from("E")));
    }

    #[test]
    fn test_topological_order_trips_on_corrupt_table() {
        let roles = table(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let detector = CycleDetector::new(&roles);

        let err = detector.detect_cycles().unwrap_err();
        match err {
            AuthzError::CycleDetected(path) => {
                assert!(path.contains('A') && path.contains('B') && path.contains('C'));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unknown_start() {
        let roles = acyclic();
        let detector = CycleDetector::new(&roles);
        assert!(matches!(
            detector.topological_order([&EntityId::from("Z")]),
            Err(AuthzError::UnknownEntity { .. })
        ));
    }
}
