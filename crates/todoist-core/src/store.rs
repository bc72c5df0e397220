//! Local entity stores
//!
//! Each resource kind has an [`EntityStore`] holding two layers:
//!
//! - **committed**: state the server has confirmed (what gets persisted)
//! - **staged**: local writes whose commands have not been confirmed yet
//!
//! Reads see the staged layer on top of the committed one. After a commit
//! the staged entries produced by accepted commands are folded into the
//! committed layer and those produced by rejected commands are dropped, so
//! rolling back never has to reconstruct an earlier state by hand.
//!
//! Mutations go through [`Staging`], which borrows the stores together with
//! the [`CommandQueue`] so that every local write enqueues its command.
//!
//! ## Usage
//!
//! ```ignore
//! let id = client.items_mut().add(Item::new("Buy milk"));
//! assert!(client.items().resolve(id).is_some());
//! ```

use std::collections::HashSet;
use std::fmt::Debug;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::command::{Command, CommandAction, CommandQueue, ItemMoveOpts, MoveTarget, Record};
use crate::error::{Error, Result};
use crate::id::{Id, IdMap};
use crate::models::{EntityKind, Filter, Item, Label, Note, Project, Reminder};
use crate::relation::RelationIndex;
use crate::time::Time;

/// A synced resource kind
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> Id;

    fn set_id(&mut self, id: Id);

    /// Text matched by name/content lookups
    fn display_name(&self) -> Option<&str>;

    /// Server tombstone flag
    fn is_deleted(&self) -> bool;

    /// Rewrite every identifier-valued field through `map`
    fn remap_ids(&mut self, map: &IdMap);

    /// Every identifier-valued field, in the same set `remap_ids` rewrites
    fn references(&self) -> Vec<Id>;

    fn into_record(self) -> Record;

    fn from_record(record: &Record) -> Option<&Self>;

    fn store(stores: &Stores) -> &EntityStore<Self>;

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self>;
}

/// A staged entity and the commands that produced it
#[derive(Debug, Clone)]
struct Staged<E> {
    entity: E,
    origins: Vec<Uuid>,
}

/// Store for one entity kind
#[derive(Debug, Clone)]
pub struct EntityStore<E> {
    committed: Vec<E>,
    staged: Vec<Staged<E>>,
    pending_deletes: Vec<(Id, Uuid)>,
}

impl<E> Default for EntityStore<E> {
    fn default() -> Self {
        Self {
            committed: Vec::new(),
            staged: Vec::new(),
            pending_deletes: Vec::new(),
        }
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with confirmed entities (tombstones are skipped)
    pub fn from_committed(entities: Vec<E>) -> Self {
        Self {
            committed: entities.into_iter().filter(|e| !e.is_deleted()).collect(),
            ..Self::default()
        }
    }

    // ==================== Reads ====================

    /// Every entity, staged versions taking precedence, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        let overridden = self
            .committed
            .iter()
            .map(move |c| self.staged_entity(c.id()).unwrap_or(c));
        let added = self
            .staged
            .iter()
            .map(|s| &s.entity)
            .filter(move |e| !self.committed.iter().any(|c| c.id() == e.id()));
        overridden.chain(added)
    }

    /// Owned copy of every entity
    pub fn get_all(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }

    /// Exact id lookup
    pub fn resolve(&self, id: Id) -> Option<&E> {
        self.staged_entity(id)
            .or_else(|| self.committed.iter().find(|e| e.id() == id))
    }

    pub fn contains(&self, id: Id) -> bool {
        self.resolve(id).is_some()
    }

    /// First entity whose name matches exactly
    pub fn find_one_by_name(&self, name: &str) -> Option<&E> {
        self.iter().find(|e| e.display_name() == Some(name))
    }

    /// All entities whose content matches exactly
    pub fn find_by_content(&self, text: &str) -> Vec<&E> {
        self.find(|e| e.display_name() == Some(text))
    }

    /// All entities matching a predicate
    pub fn find<P>(&self, predicate: P) -> Vec<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.iter().filter(|e| predicate(e)).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Server-confirmed entities only
    pub fn committed(&self) -> &[E] {
        &self.committed
    }

    /// Whether the entity has unconfirmed local changes
    pub fn is_pending(&self, id: Id) -> bool {
        self.staged_entity(id).is_some() || self.is_pending_delete(id)
    }

    pub fn is_pending_delete(&self, id: Id) -> bool {
        self.pending_deletes.iter().any(|(d, _)| *d == id)
    }

    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty() || !self.pending_deletes.is_empty()
    }

    fn staged_entity(&self, id: Id) -> Option<&E> {
        self.staged
            .iter()
            .find(|s| s.entity.id() == id)
            .map(|s| &s.entity)
    }

    // ==================== Staging ====================

    pub(crate) fn stage(&mut self, entity: E, origin: Uuid) {
        let id = entity.id();
        match self.staged.iter_mut().find(|s| s.entity.id() == id) {
            Some(staged) => {
                staged.entity = entity;
                staged.origins.push(origin);
            }
            None => self.staged.push(Staged {
                entity,
                origins: vec![origin],
            }),
        }
    }

    pub(crate) fn stage_delete(&mut self, id: Id, origin: Uuid) {
        self.pending_deletes.push((id, origin));
    }

    // ==================== Reconciliation ====================

    /// Rewrite temporary ids in both layers
    pub(crate) fn remap_ids(&mut self, map: &IdMap) {
        for entity in self.committed.iter_mut() {
            entity.remap_ids(map);
        }
        for staged in self.staged.iter_mut() {
            staged.entity.remap_ids(map);
        }
        for (id, _) in self.pending_deletes.iter_mut() {
            map.remap(id);
        }
    }

    /// Resolve the staged entries touched by a sent batch of commands.
    ///
    /// Entries produced only by accepted commands move to the committed
    /// layer; entries touched by a rejected command are dropped. Entries
    /// with origins still waiting in the queue stay staged.
    pub(crate) fn settle(&mut self, sent: &HashSet<Uuid>, rejected: &HashSet<Uuid>) {
        let mut confirmed_deletes = Vec::new();
        self.pending_deletes.retain(|(id, origin)| {
            if !sent.contains(origin) {
                return true;
            }
            if !rejected.contains(origin) {
                confirmed_deletes.push(*id);
            }
            false
        });

        let mut promoted = Vec::new();
        self.staged.retain_mut(|staged| {
            if !staged.origins.iter().any(|o| sent.contains(o)) {
                return true;
            }
            if staged.origins.iter().any(|o| rejected.contains(o)) {
                return false;
            }
            staged.origins.retain(|o| !sent.contains(o));
            if staged.origins.is_empty() {
                promoted.push(staged.entity.clone());
                false
            } else {
                true
            }
        });

        for entity in promoted {
            self.upsert_committed(entity);
        }
        for id in confirmed_deletes {
            self.committed.retain(|e| e.id() != id);
            self.staged.retain(|s| s.entity.id() != id);
        }
    }

    /// Replace the committed layer with a full server snapshot
    pub(crate) fn replace_committed(&mut self, entities: Vec<E>) {
        self.committed = entities.into_iter().filter(|e| !e.is_deleted()).collect();
    }

    /// Merge an incremental delta: tombstones remove, everything else
    /// overwrites by id or appends. Entities not in the delta are untouched.
    pub(crate) fn merge_delta(&mut self, entities: Vec<E>) {
        for entity in entities {
            if entity.is_deleted() {
                let id = entity.id();
                self.committed.retain(|e| e.id() != id);
            } else {
                self.upsert_committed(entity);
            }
        }
    }

    /// Drop every unconfirmed local change
    pub(crate) fn discard_overlay(&mut self) {
        self.staged.clear();
        self.pending_deletes.clear();
    }

    fn upsert_committed(&mut self, entity: E) {
        let id = entity.id();
        match self.committed.iter_mut().find(|e| e.id() == id) {
            Some(existing) => *existing = entity,
            None => self.committed.push(entity),
        }
    }
}

/// All entity stores of a client
#[derive(Debug, Clone, Default)]
pub struct Stores {
    pub items: EntityStore<Item>,
    pub projects: EntityStore<Project>,
    pub labels: EntityStore<Label>,
    pub notes: EntityStore<Note>,
    pub filters: EntityStore<Filter>,
    pub reminders: EntityStore<Reminder>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite temporary ids in every store
    pub(crate) fn remap_ids(&mut self, map: &IdMap) {
        if map.is_empty() {
            return;
        }
        self.items.remap_ids(map);
        self.projects.remap_ids(map);
        self.labels.remap_ids(map);
        self.notes.remap_ids(map);
        self.filters.remap_ids(map);
        self.reminders.remap_ids(map);
    }

    pub(crate) fn settle(&mut self, sent: &HashSet<Uuid>, rejected: &HashSet<Uuid>) {
        self.items.settle(sent, rejected);
        self.projects.settle(sent, rejected);
        self.labels.settle(sent, rejected);
        self.notes.settle(sent, rejected);
        self.filters.settle(sent, rejected);
        self.reminders.settle(sent, rejected);
    }

    pub(crate) fn discard_overlay(&mut self) {
        self.items.discard_overlay();
        self.projects.discard_overlay();
        self.labels.discard_overlay();
        self.notes.discard_overlay();
        self.filters.discard_overlay();
        self.reminders.discard_overlay();
    }

    pub fn has_pending(&self) -> bool {
        self.items.has_pending()
            || self.projects.has_pending()
            || self.labels.has_pending()
            || self.notes.has_pending()
            || self.filters.has_pending()
            || self.reminders.has_pending()
    }

    /// Whether any entity still references a temporary id
    pub fn any_temporary(&self) -> bool {
        fn check<E: Entity>(store: &EntityStore<E>) -> bool {
            store
                .iter()
                .any(|e| e.references().iter().any(Id::is_temporary))
        }
        check(&self.items)
            || check(&self.projects)
            || check(&self.labels)
            || check(&self.notes)
            || check(&self.filters)
            || check(&self.reminders)
    }
}

/// Mutating view over one entity kind
///
/// Every operation writes the local overlay and enqueues the matching
/// command; none of them touch the network.
pub struct Staging<'a, E: Entity> {
    stores: &'a mut Stores,
    queue: &'a mut CommandQueue,
    _kind: PhantomData<E>,
}

impl<'a, E: Entity> Staging<'a, E> {
    pub(crate) fn new(stores: &'a mut Stores, queue: &'a mut CommandQueue) -> Self {
        Self {
            stores,
            queue,
            _kind: PhantomData,
        }
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &EntityStore<E> {
        E::store(self.stores)
    }

    /// Stage a new entity and enqueue its `add`.
    ///
    /// The entity keeps its id when it is an unused temporary; otherwise a
    /// fresh temporary id is assigned. Returns the id immediately.
    pub fn add(&mut self, mut entity: E) -> Id {
        let given = entity.id();
        let id = if given.is_temporary() && !self.store().contains(given) {
            given
        } else {
            let fresh = Id::new_temporary();
            entity.set_id(fresh);
            fresh
        };

        let command = Command::add(entity.clone().into_record());
        debug!(kind = %E::KIND, %id, "staged add");
        E::store_mut(self.stores).stage(entity, command.uuid);
        self.queue.enqueue(command);
        id
    }

    /// Overwrite a known entity and enqueue its `update`
    pub fn update(&mut self, entity: E) -> Result<Id> {
        let id = entity.id();
        if !self.store().contains(id) {
            return Err(Error::not_found(E::KIND, id));
        }

        let command = Command::update(entity.clone().into_record());
        debug!(kind = %E::KIND, %id, "staged update");
        E::store_mut(self.stores).stage(entity, command.uuid);
        self.queue.enqueue(command);
        Ok(id)
    }

    /// Enqueue a `delete`; the entity stays visible until confirmed
    pub fn delete(&mut self, id: Id) -> Result<()> {
        if !self.store().contains(id) {
            return Err(Error::not_found(E::KIND, id));
        }

        let command = Command::delete(E::KIND, id);
        debug!(kind = %E::KIND, %id, "staged delete");
        E::store_mut(self.stores).stage_delete(id, command.uuid);
        self.queue.enqueue(command);
        Ok(())
    }

    fn require(&self, id: Id) -> Result<E> {
        self.store()
            .resolve(id)
            .cloned()
            .ok_or_else(|| Error::not_found(E::KIND, id))
    }
}

impl Staging<'_, Item> {
    /// Move an item under another item or into a project
    pub fn move_item(&mut self, id: Id, opts: ItemMoveOpts) -> Result<()> {
        let target = opts.target()?;
        let mut item = self.require(id)?;

        match target {
            MoveTarget::Parent(parent_id) => {
                let parent = self
                    .stores
                    .items
                    .resolve(parent_id)
                    .ok_or_else(|| Error::not_found(EntityKind::Item, parent_id))?;
                let index = RelationIndex::new(self.stores);
                if parent_id == id || index.descendants_of(id).iter().any(|d| d.id == parent_id) {
                    return Err(Error::Validation(format!(
                        "cannot move item {} under itself",
                        id
                    )));
                }
                item.project_id = parent.project_id;
                item.parent_id = Some(parent_id);
            }
            MoveTarget::Project(project_id) => {
                if !self.stores.projects.contains(project_id) {
                    return Err(Error::not_found(EntityKind::Project, project_id));
                }
                item.project_id = Some(project_id);
                item.parent_id = None;
            }
        }

        let command = Command::new(CommandAction::Move { id, to: target });
        debug!(%id, ?target, "staged move");
        self.stores.items.stage(item, command.uuid);
        self.queue.enqueue(command);
        Ok(())
    }

    /// Mark an item complete.
    ///
    /// Without `force`, an item with unchecked descendants is rejected.
    /// With `force`, the descendants are completed along with it.
    pub fn complete(&mut self, id: Id, date: Time, force: bool) -> Result<()> {
        let mut item = self.require(id)?;

        let open: Vec<Item> = RelationIndex::new(self.stores)
            .descendants_of(id)
            .into_iter()
            .filter(|d| !d.checked)
            .cloned()
            .collect();
        if !force && !open.is_empty() {
            return Err(Error::IncompleteChildren {
                id,
                open: open.len(),
            });
        }

        let command = Command::new(CommandAction::Complete {
            id,
            date_completed: date,
            force_history: force,
        });
        item.checked = true;
        item.date_completed = date;
        self.stores.items.stage(item, command.uuid);
        for mut child in open {
            child.checked = true;
            child.date_completed = date;
            self.stores.items.stage(child, command.uuid);
        }
        debug!(%id, force, "staged complete");
        self.queue.enqueue(command);
        Ok(())
    }

    /// Reopen a completed item
    pub fn uncomplete(&mut self, id: Id) -> Result<()> {
        let mut item = self.require(id)?;
        item.checked = false;
        item.date_completed = Time::ZERO;

        let command = Command::new(CommandAction::Uncomplete { id });
        debug!(%id, "staged uncomplete");
        self.stores.items.stage(item, command.uuid);
        self.queue.enqueue(command);
        Ok(())
    }
}
