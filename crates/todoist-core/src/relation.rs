//! Cross-entity lookups
//!
//! Relations are computed from the current store contents on every call, so
//! they always reflect staged changes and remapped ids.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::id::Id;
use crate::models::{Item, Label, Project};
use crate::store::Stores;

/// Resolved neighbours of an item, for display
#[derive(Debug, Clone, Default)]
pub struct ItemRelation {
    pub project: Option<Project>,
    pub labels: Vec<Label>,
    pub parent: Option<Item>,
}

/// Read-only relation queries over a set of stores
pub struct RelationIndex<'a> {
    stores: &'a Stores,
}

impl<'a> RelationIndex<'a> {
    pub fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Direct sub-items
    pub fn children_of(&self, id: Id) -> Vec<&'a Item> {
        self.stores
            .items
            .find(|item| item.parent_id == Some(id))
    }

    /// All sub-items at any depth, breadth first
    pub fn descendants_of(&self, id: Id) -> Vec<&'a Item> {
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                // Guards against parent cycles in bad data
                if seen.insert(child.id) {
                    queue.push_back(child.id);
                    found.push(child);
                }
            }
        }
        found
    }

    /// Items whose project is `project_id`
    pub fn items_in_project(&self, project_id: Id) -> Vec<&'a Item> {
        self.stores
            .items
            .find(|item| item.project_id == Some(project_id))
    }

    pub fn subprojects_of(&self, project_id: Id) -> Vec<&'a Project> {
        self.stores
            .projects
            .find(|project| project.parent_id == Some(project_id))
    }

    /// Number of ancestors above an item
    pub fn depth_of(&self, item: &Item) -> usize {
        let mut depth = 0;
        let mut seen = HashSet::from([item.id]);
        let mut parent = item.parent_id;
        while let Some(id) = parent {
            if !seen.insert(id) {
                break;
            }
            match self.stores.items.resolve(id) {
                Some(p) => {
                    depth += 1;
                    parent = p.parent_id;
                }
                None => break,
            }
        }
        depth
    }

    /// Project, labels and parent for each item, keyed by item id.
    ///
    /// Dangling references are skipped rather than reported.
    pub fn item_relations(&self, items: &[Item]) -> HashMap<Id, ItemRelation> {
        items
            .iter()
            .map(|item| {
                let relation = ItemRelation {
                    project: item
                        .project_id
                        .and_then(|id| self.stores.projects.resolve(id))
                        .cloned(),
                    labels: item
                        .labels
                        .iter()
                        .filter_map(|id| self.stores.labels.resolve(*id))
                        .cloned()
                        .collect(),
                    parent: item
                        .parent_id
                        .and_then(|id| self.stores.items.resolve(id))
                        .cloned(),
                };
                (item.id, relation)
            })
            .collect()
    }
}
