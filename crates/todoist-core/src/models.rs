//! Data models for the synced resources
//!
//! Items, projects, labels, notes, filters and reminders as the sync API
//! returns them. Each kind implements [`Entity`], which is where the
//! per-kind identifier rewrite lives: every field that holds an [`Id`] is
//! visited explicitly in `remap_ids`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::Record;
use crate::id::{Id, IdMap};
use crate::store::{Entity, EntityStore, Stores};
use crate::time::Time;

/// The resource kinds the client mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Item,
    Project,
    Label,
    Note,
    Filter,
    Reminder,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Item,
        EntityKind::Project,
        EntityKind::Label,
        EntityKind::Note,
        EntityKind::Filter,
        EntityKind::Reminder,
    ];

    /// Prefix used in command type names (`item_add`, `label_delete`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Item => "item",
            EntityKind::Project => "project",
            EntityKind::Label => "label",
            EntityKind::Note => "note",
            EntityKind::Filter => "filter",
            EntityKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 0/1 integers and booleans are both used for flags in API payloads
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Int(i64),
        }

        Ok(match Option::<Flag>::deserialize(deserializer)? {
            Some(Flag::Bool(b)) => b,
            Some(Flag::Int(n)) => n != 0,
            None => false,
        })
    }
}

fn default_priority() -> u8 {
    1
}

/// Due date of an item or reminder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Due {
    /// Resolved instant (zero until the server has parsed `string`)
    #[serde(default)]
    pub date: Time,
    /// Natural-language form, e.g. "every monday"
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, with = "flag")]
    pub is_recurring: bool,
}

impl Due {
    pub fn from_string(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            ..Self::default()
        }
    }
}

/// A task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    #[serde(default)]
    pub project_id: Option<Id>,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due: Option<Due>,
    /// 1 (normal) to 4 (urgent)
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub labels: Vec<Id>,
    #[serde(default, with = "flag")]
    pub checked: bool,
    #[serde(default, with = "flag")]
    pub collapsed: bool,
    #[serde(default)]
    pub child_order: i64,
    #[serde(default)]
    pub date_added: Time,
    #[serde(default)]
    pub date_completed: Time,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Item {
    /// New item with a fresh temporary id
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Id::new_temporary(),
            project_id: None,
            parent_id: None,
            content: content.into(),
            description: String::new(),
            due: None,
            priority: default_priority(),
            labels: Vec::new(),
            checked: false,
            collapsed: false,
            child_order: 0,
            date_added: Time::ZERO,
            date_completed: Time::ZERO,
            is_deleted: false,
        }
    }

    /// Due instant, zero when the item has no due date
    pub fn due_date(&self) -> Time {
        self.due.as_ref().map(|d| d.date).unwrap_or_default()
    }

    /// Add a label unless already present
    pub fn add_label(&mut self, label: Id) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }
}

impl Entity for Item {
    const KIND: EntityKind = EntityKind::Item;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.content)
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
        map.remap_opt(&mut self.project_id);
        map.remap_opt(&mut self.parent_id);
        map.remap_all(&mut self.labels);
    }

    fn references(&self) -> Vec<Id> {
        let mut ids = vec![self.id];
        ids.extend(self.project_id);
        ids.extend(self.parent_id);
        ids.extend(self.labels.iter().copied());
        ids
    }

    fn into_record(self) -> Record {
        Record::Item(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Item(item) => Some(item),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.items
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.items
    }
}

/// A project (items live in exactly one project)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub child_order: i64,
    #[serde(default, with = "flag")]
    pub collapsed: bool,
    #[serde(default, with = "flag")]
    pub is_favorite: bool,
    #[serde(default, with = "flag")]
    pub is_archived: bool,
    /// Set on the user's Inbox project
    #[serde(default, with = "flag")]
    pub inbox_project: bool,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::new_temporary(),
            name: name.into(),
            color: String::new(),
            parent_id: None,
            child_order: 0,
            collapsed: false,
            is_favorite: false,
            is_archived: false,
            inbox_project: false,
            is_deleted: false,
        }
    }
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
        map.remap_opt(&mut self.parent_id);
    }

    fn references(&self) -> Vec<Id> {
        let mut ids = vec![self.id];
        ids.extend(self.parent_id);
        ids
    }

    fn into_record(self) -> Record {
        Record::Project(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Project(project) => Some(project),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.projects
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.projects
    }
}

/// A personal label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub item_order: i64,
    #[serde(default, with = "flag")]
    pub is_favorite: bool,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::new_temporary(),
            name: name.into(),
            color: String::new(),
            item_order: 0,
            is_favorite: false,
            is_deleted: false,
        }
    }
}

impl Entity for Label {
    const KIND: EntityKind = EntityKind::Label;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
    }

    fn references(&self) -> Vec<Id> {
        vec![self.id]
    }

    fn into_record(self) -> Record {
        Record::Label(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Label(label) => Some(label),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.labels
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.labels
    }
}

/// A comment attached to an item or a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Id,
    #[serde(default)]
    pub item_id: Option<Id>,
    #[serde(default)]
    pub project_id: Option<Id>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub posted: Time,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Note {
    pub fn on_item(item_id: Id, content: impl Into<String>) -> Self {
        Self {
            id: Id::new_temporary(),
            item_id: Some(item_id),
            project_id: None,
            content: content.into(),
            posted: Time::ZERO,
            is_deleted: false,
        }
    }
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.content)
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
        map.remap_opt(&mut self.item_id);
        map.remap_opt(&mut self.project_id);
    }

    fn references(&self) -> Vec<Id> {
        let mut ids = vec![self.id];
        ids.extend(self.item_id);
        ids.extend(self.project_id);
        ids
    }

    fn into_record(self) -> Record {
        Record::Note(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Note(note) => Some(note),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.notes
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.notes
    }
}

/// A saved search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub item_order: i64,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Filter {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: Id::new_temporary(),
            name: name.into(),
            query: query.into(),
            color: String::new(),
            item_order: 0,
            is_deleted: false,
        }
    }
}

impl Entity for Filter {
    const KIND: EntityKind = EntityKind::Filter;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
    }

    fn references(&self) -> Vec<Id> {
        vec![self.id]
    }

    fn into_record(self) -> Record {
        Record::Filter(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.filters
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.filters
    }
}

/// A reminder on an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Id,
    pub item_id: Id,
    /// "relative" or "absolute"
    #[serde(default, rename = "type")]
    pub reminder_type: String,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub minute_offset: Option<i64>,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
}

impl Reminder {
    pub fn relative(item_id: Id, minute_offset: i64) -> Self {
        Self {
            id: Id::new_temporary(),
            item_id,
            reminder_type: "relative".to_string(),
            due: None,
            minute_offset: Some(minute_offset),
            is_deleted: false,
        }
    }
}

impl Entity for Reminder {
    const KIND: EntityKind = EntityKind::Reminder;

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn display_name(&self) -> Option<&str> {
        None
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn remap_ids(&mut self, map: &IdMap) {
        map.remap(&mut self.id);
        map.remap(&mut self.item_id);
    }

    fn references(&self) -> Vec<Id> {
        vec![self.id, self.item_id]
    }

    fn into_record(self) -> Record {
        Record::Reminder(self)
    }

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Reminder(reminder) => Some(reminder),
            _ => None,
        }
    }

    fn store(stores: &Stores) -> &EntityStore<Self> {
        &stores.reminders
    }

    fn store_mut(stores: &mut Stores) -> &mut EntityStore<Self> {
        &mut stores.reminders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_new() {
        let item = Item::new("Buy milk");
        assert_eq!(item.content, "Buy milk");
        assert!(item.id.is_temporary());
        assert_eq!(item.priority, 1);
        assert!(item.labels.is_empty());
        assert!(item.due_date().is_zero());
    }

    #[test]
    fn test_item_add_label_dedupes() {
        let mut item = Item::new("Buy milk");
        item.add_label(Id::Permanent(1));
        item.add_label(Id::Permanent(1));
        item.add_label(Id::Permanent(2));
        assert_eq!(item.labels, vec![Id::Permanent(1), Id::Permanent(2)]);
    }

    #[test]
    fn test_item_remap_visits_every_id_field() {
        let project = Id::new_temporary();
        let parent = Id::new_temporary();
        let label = Id::new_temporary();

        let mut item = Item::new("child");
        let own = item.id;
        item.project_id = Some(project);
        item.parent_id = Some(parent);
        item.labels = vec![label, Id::Permanent(5)];

        let mut map = IdMap::new();
        map.insert(own, Id::Permanent(1));
        map.insert(project, Id::Permanent(2));
        map.insert(parent, Id::Permanent(3));
        map.insert(label, Id::Permanent(4));
        item.remap_ids(&map);

        assert_eq!(item.id, Id::Permanent(1));
        assert_eq!(item.project_id, Some(Id::Permanent(2)));
        assert_eq!(item.parent_id, Some(Id::Permanent(3)));
        assert_eq!(item.labels, vec![Id::Permanent(4), Id::Permanent(5)]);
    }

    #[test]
    fn test_note_and_reminder_remap() {
        let item = Id::new_temporary();
        let mut map = IdMap::new();
        map.insert(item, Id::Permanent(10));

        let mut note = Note::on_item(item, "call first");
        note.remap_ids(&map);
        assert_eq!(note.item_id, Some(Id::Permanent(10)));

        let mut reminder = Reminder::relative(item, 30);
        reminder.remap_ids(&map);
        assert_eq!(reminder.item_id, Id::Permanent(10));
    }

    #[test]
    fn test_item_deserializes_server_payload() {
        let json = r#"{
            "id": "2995104339",
            "project_id": "2203306141",
            "parent_id": null,
            "content": "Buy Milk",
            "priority": 4,
            "labels": ["2156154810"],
            "checked": 0,
            "is_deleted": 1,
            "date_added": "Mon 2 Jan 2006 15:04:05 -0700",
            "due": {"date": null, "string": "tomorrow", "is_recurring": false}
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, Id::Permanent(2995104339));
        assert_eq!(item.project_id, Some(Id::Permanent(2203306141)));
        assert_eq!(item.priority, 4);
        assert!(!item.checked);
        assert!(item.is_deleted);
        assert!(!item.date_added.is_zero());
        assert_eq!(item.due.unwrap().string, "tomorrow");
    }

    #[test]
    fn test_project_serialization() {
        let mut project = Project::new("Work");
        project.inbox_project = true;
        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(project, back);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EntityKind::Item.as_str(), "item");
        assert_eq!(EntityKind::Reminder.to_string(), "reminder");
        assert_eq!(EntityKind::ALL.len(), 6);
    }
}
