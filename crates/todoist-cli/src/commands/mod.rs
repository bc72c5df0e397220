//! Command handlers

pub mod config;
pub mod item;
pub mod label;
pub mod project;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};

use todoist_core::{Entity, EntityStore, Id, IdError, Project};

/// Resolve user input to an id: numeric ids first, then names.
///
/// `inbox` also matches the project the server flags as the inbox.
pub fn resolve_id<E: Entity>(store: &EntityStore<E>, text: &str) -> Result<Id> {
    match Id::parse(text) {
        Ok(id) => Ok(id),
        Err(IdError::NotAnId(name)) => match store.find_one_by_name(&name) {
            Some(entity) => Ok(entity.id()),
            None => bail!("No {} named '{}'", E::KIND, name),
        },
        Err(e) => Err(e.into()),
    }
}

/// Resolve a project reference, honouring the `inbox` alias
pub fn resolve_project(store: &EntityStore<Project>, text: &str) -> Result<Id> {
    if text.trim().eq_ignore_ascii_case("inbox") {
        if let Some(inbox) = store.iter().find(|p| p.inbox_project) {
            return Ok(inbox.id);
        }
    }
    resolve_id(store, text)
}

/// Resolve a comma-separated list of references
pub fn resolve_ids<E: Entity>(store: &EntityStore<E>, list: &str) -> Result<Vec<Id>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| resolve_id(store, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use todoist_core::Label;

    fn projects() -> EntityStore<Project> {
        let mut inbox = Project::new("Inbox");
        inbox.id = Id::Permanent(1);
        inbox.inbox_project = true;
        let mut work = Project::new("Work");
        work.id = Id::Permanent(2);
        EntityStore::from_committed(vec![inbox, work])
    }

    #[test]
    fn test_resolve_numeric_id() {
        assert_eq!(resolve_id(&projects(), "42").unwrap(), Id::Permanent(42));
    }

    #[test]
    fn test_resolve_by_name() {
        assert_eq!(resolve_id(&projects(), "Work").unwrap(), Id::Permanent(2));
        assert!(resolve_id(&projects(), "Garden").is_err());
    }

    #[test]
    fn test_resolve_inbox_alias() {
        let mut store = projects();
        assert_eq!(resolve_project(&store, "inbox").unwrap(), Id::Permanent(1));

        // Falls back to name lookup when nothing is flagged
        let mut plain = Project::new("inbox");
        plain.id = Id::Permanent(5);
        store = EntityStore::from_committed(vec![plain]);
        assert_eq!(resolve_project(&store, "inbox").unwrap(), Id::Permanent(5));
    }

    #[test]
    fn test_resolve_label_list() {
        let mut a = Label::new("home");
        a.id = Id::Permanent(10);
        let mut b = Label::new("phone");
        b.id = Id::Permanent(11);
        let store = EntityStore::from_committed(vec![a, b]);

        let ids = resolve_ids(&store, "home, 11,").unwrap();
        assert_eq!(ids, vec![Id::Permanent(10), Id::Permanent(11)]);
        assert!(resolve_ids(&store, "home,work").is_err());
    }
}
