//! Parent/child administrator graph and its integrity rules.
//!
//! The `parent_admin_id` pointer on each administrator is the single source of
//! truth. [`HierarchyEdge`] values are an append-only log kept for audit and
//! recovery. Every traversal here carries a visited set so already-corrupted
//! cyclic data still terminates.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use scholaris_core::{AppError, TenantId};
use serde::{Deserialize, Serialize};

use crate::administrator::{Administrator, AdministratorId, AdministratorLevel};

/// Relationship kind recorded on edge log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Explicit reporting line.
    Direct,
    /// Reporting line inherited through a bulk re-parent.
    Inherited,
}

impl RelationshipKind {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Inherited => "inherited",
        }
    }
}

impl FromStr for RelationshipKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "direct" => Ok(Self::Direct),
            "inherited" => Ok(Self::Inherited),
            _ => Err(AppError::Validation(format!(
                "unknown hierarchy relationship '{value}'"
            ))),
        }
    }
}

/// Append-only record of one parent assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    /// Owning tenant.
    pub company_id: TenantId,
    /// Parent side of the edge.
    pub parent_admin_id: AdministratorId,
    /// Child side of the edge.
    pub child_admin_id: AdministratorId,
    /// Relationship kind.
    pub kind: RelationshipKind,
    /// `false` when the row records the end of a reporting line.
    pub is_active: bool,
    /// Administrator who made the change.
    pub created_by: AdministratorId,
    /// Change timestamp.
    pub created_at: DateTime<Utc>,
}

/// One problem found by an integrity scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyIssue {
    /// Parent pointer refers to an administrator that is missing from the tenant.
    OrphanedParent {
        /// Administrator holding the dangling pointer.
        admin_id: AdministratorId,
        /// Missing parent id.
        parent_admin_id: AdministratorId,
    },
    /// Child outranks its parent.
    LevelOrderViolation {
        /// Child administrator.
        admin_id: AdministratorId,
        /// Child level.
        admin_level: AdministratorLevel,
        /// Parent administrator.
        parent_admin_id: AdministratorId,
        /// Parent level.
        parent_level: AdministratorLevel,
    },
    /// Parent pointers loop back on themselves.
    Cycle {
        /// Cycle members, starting at the smallest id.
        members: Vec<AdministratorId>,
    },
}

impl Display for HierarchyIssue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrphanedParent {
                admin_id,
                parent_admin_id,
            } => write!(
                formatter,
                "administrator '{admin_id}' references missing parent '{parent_admin_id}'"
            ),
            Self::LevelOrderViolation {
                admin_id,
                admin_level,
                parent_admin_id,
                parent_level,
            } => write!(
                formatter,
                "'{admin_id}' ({admin_level}) reports to lower '{parent_admin_id}' ({parent_level})"
            ),
            Self::Cycle { members } => {
                let path: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(formatter, "hierarchy cycle detected: {}", path.join(" -> "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HierarchyNode {
    parent_admin_id: Option<AdministratorId>,
    level: AdministratorLevel,
}

/// In-memory view of one tenant's parent pointers.
#[derive(Debug, Clone, Default)]
pub struct HierarchyGraph {
    nodes: BTreeMap<AdministratorId, HierarchyNode>,
    children: BTreeMap<AdministratorId, Vec<AdministratorId>>,
}

impl HierarchyGraph {
    /// Builds a graph from administrator records of one tenant.
    pub fn from_administrators<'a>(
        administrators: impl IntoIterator<Item = &'a Administrator>,
    ) -> Self {
        let mut graph = Self::default();
        for administrator in administrators {
            graph.insert(
                administrator.id(),
                administrator.parent_admin_id(),
                administrator.level(),
            );
        }
        graph
    }

    /// Adds or replaces one node.
    pub fn insert(
        &mut self,
        admin_id: AdministratorId,
        parent_admin_id: Option<AdministratorId>,
        level: AdministratorLevel,
    ) {
        if let Some(previous) = self.nodes.insert(
            admin_id,
            HierarchyNode {
                parent_admin_id,
                level,
            },
        ) && let Some(previous_parent) = previous.parent_admin_id
            && let Some(siblings) = self.children.get_mut(&previous_parent)
        {
            siblings.retain(|child| child != &admin_id);
        }

        if let Some(parent_admin_id) = parent_admin_id {
            self.children
                .entry(parent_admin_id)
                .or_default()
                .push(admin_id);
        }
    }

    /// Returns whether the administrator is part of the graph.
    #[must_use]
    pub fn contains(&self, admin_id: AdministratorId) -> bool {
        self.nodes.contains_key(&admin_id)
    }

    /// Returns the parent pointer of an administrator.
    #[must_use]
    pub fn parent_of(&self, admin_id: AdministratorId) -> Option<AdministratorId> {
        self.nodes
            .get(&admin_id)
            .and_then(|node| node.parent_admin_id)
    }

    /// Returns direct children of an administrator.
    #[must_use]
    pub fn children_of(&self, admin_id: AdministratorId) -> &[AdministratorId] {
        self.children
            .get(&admin_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns every administrator below `admin_id`, breadth first, excluding itself.
    #[must_use]
    pub fn descendants(&self, admin_id: AdministratorId) -> Vec<AdministratorId> {
        let mut visited = BTreeSet::from([admin_id]);
        let mut queue = VecDeque::from([admin_id]);
        let mut descendants = Vec::new();

        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                if visited.insert(*child) {
                    descendants.push(*child);
                    queue.push_back(*child);
                }
            }
        }

        descendants
    }

    /// Returns the chain from the topmost reachable ancestor down to `admin_id`.
    ///
    /// Returns an empty chain for unknown ids. Walking stops at a missing
    /// parent or at the first revisited id.
    #[must_use]
    pub fn ancestor_chain(&self, admin_id: AdministratorId) -> Vec<AdministratorId> {
        if !self.contains(admin_id) {
            return Vec::new();
        }

        let mut visited = BTreeSet::from([admin_id]);
        let mut chain = vec![admin_id];
        let mut current = self.parent_of(admin_id);

        while let Some(parent_admin_id) = current {
            if !self.contains(parent_admin_id) || !visited.insert(parent_admin_id) {
                break;
            }
            chain.push(parent_admin_id);
            current = self.parent_of(parent_admin_id);
        }

        chain.reverse();
        chain
    }

    /// Returns whether making `proposed_parent` the parent of `child` would close a loop.
    #[must_use]
    pub fn would_create_cycle(
        &self,
        child: AdministratorId,
        proposed_parent: Option<AdministratorId>,
    ) -> bool {
        let Some(proposed_parent) = proposed_parent else {
            return false;
        };

        proposed_parent == child || self.descendants(child).contains(&proposed_parent)
    }

    /// Scans the graph for orphaned pointers, level-order violations and cycles.
    #[must_use]
    pub fn integrity_issues(&self) -> Vec<HierarchyIssue> {
        let mut issues = Vec::new();

        for (admin_id, node) in &self.nodes {
            let Some(parent_admin_id) = node.parent_admin_id else {
                continue;
            };

            match self.nodes.get(&parent_admin_id) {
                None => issues.push(HierarchyIssue::OrphanedParent {
                    admin_id: *admin_id,
                    parent_admin_id,
                }),
                Some(parent) if node.level.outranks(parent.level) => {
                    issues.push(HierarchyIssue::LevelOrderViolation {
                        admin_id: *admin_id,
                        admin_level: node.level,
                        parent_admin_id,
                        parent_level: parent.level,
                    });
                }
                Some(_) => {}
            }
        }

        issues.extend(
            self.cycles()
                .into_iter()
                .map(|members| HierarchyIssue::Cycle { members }),
        );
        issues
    }

    fn cycles(&self) -> Vec<Vec<AdministratorId>> {
        let mut finished = BTreeSet::new();
        let mut cycles = Vec::new();

        for start in self.nodes.keys().copied() {
            let mut path = Vec::new();
            let mut positions = HashMap::new();
            let mut current = Some(start);

            while let Some(admin_id) = current {
                if finished.contains(&admin_id) || !self.contains(admin_id) {
                    break;
                }
                if let Some(position) = positions.get(&admin_id) {
                    let mut members: Vec<AdministratorId> = path[*position..].to_vec();
                    if let Some(smallest) = members
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, member)| **member)
                        .map(|(index, _)| index)
                    {
                        members.rotate_left(smallest);
                    }
                    cycles.push(members);
                    break;
                }

                positions.insert(admin_id, path.len());
                path.push(admin_id);
                current = self.parent_of(admin_id);
            }

            finished.extend(path);
        }

        cycles
    }
}
