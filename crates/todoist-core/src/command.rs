//! Pending commands
//!
//! Every local mutation is recorded as a [`Command`] and appended to the
//! [`CommandQueue`]. The queue is replayed on the server in order, so it is
//! never reordered or deduplicated; two edits of the same item produce two
//! commands.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::id::{Id, IdMap};
use crate::models::{EntityKind, Filter, Item, Label, Note, Project, Reminder};
use crate::store::Entity;
use crate::time::Time;

/// A full entity carried by `add` and `update` commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum Record {
    Item(Item),
    Project(Project),
    Label(Label),
    Note(Note),
    Filter(Filter),
    Reminder(Reminder),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Item(_) => EntityKind::Item,
            Record::Project(_) => EntityKind::Project,
            Record::Label(_) => EntityKind::Label,
            Record::Note(_) => EntityKind::Note,
            Record::Filter(_) => EntityKind::Filter,
            Record::Reminder(_) => EntityKind::Reminder,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            Record::Item(e) => e.id(),
            Record::Project(e) => e.id(),
            Record::Label(e) => e.id(),
            Record::Note(e) => e.id(),
            Record::Filter(e) => e.id(),
            Record::Reminder(e) => e.id(),
        }
    }

    pub fn remap_ids(&mut self, map: &IdMap) {
        match self {
            Record::Item(e) => e.remap_ids(map),
            Record::Project(e) => e.remap_ids(map),
            Record::Label(e) => e.remap_ids(map),
            Record::Note(e) => e.remap_ids(map),
            Record::Filter(e) => e.remap_ids(map),
            Record::Reminder(e) => e.remap_ids(map),
        }
    }

    fn to_value(&self) -> Value {
        let value = match self {
            Record::Item(e) => serde_json::to_value(e),
            Record::Project(e) => serde_json::to_value(e),
            Record::Label(e) => serde_json::to_value(e),
            Record::Note(e) => serde_json::to_value(e),
            Record::Filter(e) => serde_json::to_value(e),
            Record::Reminder(e) => serde_json::to_value(e),
        };
        // Plain structs with string keys always serialize
        value.unwrap_or(Value::Null)
    }
}

/// Options for moving an item; exactly one target must be set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemMoveOpts {
    pub parent_id: Option<Id>,
    pub project_id: Option<Id>,
}

impl ItemMoveOpts {
    pub fn to_parent(parent_id: Id) -> Self {
        Self {
            parent_id: Some(parent_id),
            project_id: None,
        }
    }

    pub fn to_project(project_id: Id) -> Self {
        Self {
            parent_id: None,
            project_id: Some(project_id),
        }
    }

    /// Validate the option combination
    pub fn target(&self) -> Result<MoveTarget> {
        match (self.parent_id, self.project_id) {
            (Some(parent), None) => Ok(MoveTarget::Parent(parent)),
            (None, Some(project)) => Ok(MoveTarget::Project(project)),
            (None, None) => Err(Error::Validation(
                "move requires a parent id or a project id".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Validation(
                "move accepts either a parent id or a project id, not both".to_string(),
            )),
        }
    }
}

/// Where an item is moved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    Parent(Id),
    Project(Id),
}

/// What a command does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    Add { record: Record },
    Update { record: Record },
    Delete { kind: EntityKind, id: Id },
    Move { id: Id, to: MoveTarget },
    Complete {
        id: Id,
        date_completed: Time,
        force_history: bool,
    },
    Uncomplete { id: Id },
}

/// A queued mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Idempotency key; the server reports status per uuid
    pub uuid: Uuid,
    /// Temporary id of the entity created by an `add`
    pub temp_id: Option<Id>,
    pub action: CommandAction,
}

impl Command {
    pub fn new(action: CommandAction) -> Self {
        let temp_id = match &action {
            CommandAction::Add { record } if record.id().is_temporary() => Some(record.id()),
            _ => None,
        };
        Self {
            uuid: Uuid::new_v4(),
            temp_id,
            action,
        }
    }

    pub fn add(record: Record) -> Self {
        Self::new(CommandAction::Add { record })
    }

    pub fn update(record: Record) -> Self {
        Self::new(CommandAction::Update { record })
    }

    pub fn delete(kind: EntityKind, id: Id) -> Self {
        Self::new(CommandAction::Delete { kind, id })
    }

    /// Entity kind the command targets
    pub fn kind(&self) -> EntityKind {
        match &self.action {
            CommandAction::Add { record } | CommandAction::Update { record } => record.kind(),
            CommandAction::Delete { kind, .. } => *kind,
            CommandAction::Move { .. }
            | CommandAction::Complete { .. }
            | CommandAction::Uncomplete { .. } => EntityKind::Item,
        }
    }

    /// Id of the entity the command targets
    pub fn target(&self) -> Id {
        match &self.action {
            CommandAction::Add { record } | CommandAction::Update { record } => record.id(),
            CommandAction::Delete { id, .. }
            | CommandAction::Move { id, .. }
            | CommandAction::Complete { id, .. }
            | CommandAction::Uncomplete { id } => *id,
        }
    }

    /// Wire type name, e.g. `item_add`
    pub fn type_name(&self) -> String {
        let verb = match &self.action {
            CommandAction::Add { .. } => "add",
            CommandAction::Update { .. } => "update",
            CommandAction::Delete { .. } => "delete",
            CommandAction::Move { .. } => "move",
            CommandAction::Complete { .. } => "complete",
            CommandAction::Uncomplete { .. } => "uncomplete",
        };
        format!("{}_{}", self.kind(), verb)
    }

    /// Rewrite temporary references through `map`.
    ///
    /// `temp_id` is left alone: an add's own temp id is only mapped once
    /// the add itself has been sent, so it never appears while queued.
    pub fn remap_ids(&mut self, map: &IdMap) {
        match &mut self.action {
            CommandAction::Add { record } | CommandAction::Update { record } => {
                record.remap_ids(map)
            }
            CommandAction::Delete { id, .. }
            | CommandAction::Complete { id, .. }
            | CommandAction::Uncomplete { id } => map.remap(id),
            CommandAction::Move { id, to } => {
                map.remap(id);
                match to {
                    MoveTarget::Parent(parent) => map.remap(parent),
                    MoveTarget::Project(project) => map.remap(project),
                }
            }
        }
    }

    /// Arguments object in the API's format
    pub fn args(&self) -> Value {
        match &self.action {
            CommandAction::Add { record } => {
                let mut args = strip(record.to_value(), &["is_deleted"]);
                if self.temp_id.is_some() {
                    args.remove("id");
                }
                Value::Object(args)
            }
            CommandAction::Update { record } => {
                Value::Object(strip(record.to_value(), &["is_deleted", "date_added"]))
            }
            CommandAction::Delete { id, .. } | CommandAction::Uncomplete { id } => {
                json!({ "id": id })
            }
            CommandAction::Move { id, to } => match to {
                MoveTarget::Parent(parent) => json!({ "id": id, "parent_id": parent }),
                MoveTarget::Project(project) => json!({ "id": id, "project_id": project }),
            },
            CommandAction::Complete {
                id,
                date_completed,
                force_history,
            } => json!({
                "id": id,
                "date_completed": date_completed,
                "force_history": force_history,
            }),
        }
    }

    /// The command as sent to the server
    pub fn to_wire(&self) -> Value {
        let mut wire = json!({
            "type": self.type_name(),
            "uuid": self.uuid,
            "args": self.args(),
        });
        if let Some(temp_id) = self.temp_id {
            wire["temp_id"] = json!(temp_id);
        }
        wire
    }
}

fn strip(value: Value, keys: &[&str]) -> Map<String, Value> {
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for key in keys {
        map.remove(*key);
    }
    map
}

/// Ordered list of commands waiting to be sent
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn enqueue(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    /// Take every pending command, leaving the queue empty
    pub fn drain(&mut self) -> Vec<Command> {
        self.pending.drain(..).collect()
    }

    /// Put commands back at the front, keeping their order
    pub fn restore(&mut self, commands: Vec<Command>) {
        for command in commands.into_iter().rev() {
            self.pending.push_front(command);
        }
    }

    pub fn remap_ids(&mut self, map: &IdMap) {
        for command in self.pending.iter_mut() {
            command.remap_ids(map);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.pending.iter()
    }
}
