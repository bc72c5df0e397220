//! In-memory sync server for integration tests
//!
//! Commands are applied from their wire form (`Command::to_wire`), so the
//! tests also cover what the real server would receive. Rows are kept as
//! JSON and versioned; a sync token `token-N` asks for rows changed after
//! version N.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use todoist_core::{
    CancellationToken, Command, EntityKind, Id, IdMap, SyncContext, SyncToken, Time, Transport,
    TransportError,
};
use todoist_core::sync::{CommandStatus, CommitResponse, SyncResponse};

pub const INBOX_ID: u64 = 1;

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct Request {
    pub endpoint: &'static str,
    pub token: String,
    pub commands: Vec<Value>,
}

#[derive(Debug)]
struct Row {
    kind: EntityKind,
    value: Value,
    version: u64,
}

impl Row {
    fn id(&self) -> &str {
        self.value["id"].as_str().unwrap_or_default()
    }

    fn is_deleted(&self) -> bool {
        self.value["is_deleted"].as_bool().unwrap_or(false)
    }
}

#[derive(Debug)]
struct ServerState {
    rows: Vec<Row>,
    next_id: u64,
    version: u64,
    id_map: HashMap<String, String>,
    rejected_types: HashSet<String>,
    fail_next: Option<TransportError>,
    cancel_after_next: Option<CancellationToken>,
    requests: Vec<Request>,
}

/// Fake sync endpoint with an Inbox project
#[derive(Debug)]
pub struct FakeServer {
    state: RefCell<ServerState>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self {
            state: RefCell::new(ServerState {
                rows: Vec::new(),
                next_id: 100,
                version: 0,
                id_map: HashMap::new(),
                rejected_types: HashSet::new(),
                fail_next: None,
                cancel_after_next: None,
                requests: Vec::new(),
            }),
        };
        server.insert(
            EntityKind::Project,
            json!({"id": INBOX_ID.to_string(), "name": "Inbox", "inbox_project": true}),
        );
        server
    }

    // ==================== Test controls ====================

    /// Fail the next request before anything is applied
    pub fn fail_next(&self, error: TransportError) {
        self.state.borrow_mut().fail_next = Some(error);
    }

    /// Trigger `token` once the next request has been applied, as if the
    /// user cancelled while the reply was in flight
    pub fn cancel_after_next(&self, token: CancellationToken) {
        self.state.borrow_mut().cancel_after_next = Some(token);
    }

    /// Reject every command of a wire type, e.g. `item_update`
    pub fn reject(&self, type_name: &str) {
        self.state
            .borrow_mut()
            .rejected_types
            .insert(type_name.to_string());
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.borrow().requests.clone()
    }

    /// Create an item as another device would
    pub fn remote_add_item(&self, content: &str) -> Id {
        let id = self.next_id();
        self.insert(
            EntityKind::Item,
            json!({
                "id": id.to_string(),
                "project_id": INBOX_ID.to_string(),
                "content": content,
                "date_added": Time::now(),
            }),
        );
        Id::Permanent(id)
    }

    /// Change a field of an existing row as another device would
    pub fn remote_set(&self, kind: EntityKind, id: Id, field: &str, value: Value) {
        let mut state = self.state.borrow_mut();
        state.version += 1;
        let version = state.version;
        let id = id.to_string();
        if let Some(row) = state
            .rows
            .iter_mut()
            .find(|r| r.kind == kind && r.id() == id)
        {
            row.value[field] = value;
            row.version = version;
        }
    }

    pub fn remote_delete(&self, kind: EntityKind, id: Id) {
        self.remote_set(kind, id, "is_deleted", json!(true));
    }

    /// Live (not deleted) rows of one kind
    pub fn rows<E: DeserializeOwned>(&self, kind: EntityKind) -> Vec<E> {
        self.state
            .borrow()
            .rows
            .iter()
            .filter(|r| r.kind == kind && !r.is_deleted())
            .map(|r| decode(&r.value))
            .collect()
    }

    // ==================== Internals ====================

    fn next_id(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn insert(&self, kind: EntityKind, value: Value) {
        let mut state = self.state.borrow_mut();
        state.version += 1;
        let version = state.version;
        state.rows.push(Row {
            kind,
            value,
            version,
        });
    }

    /// Log the request and consume any injected failure
    fn begin(&self, endpoint: &'static str, token: &SyncToken, commands: &[Command]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(Request {
            endpoint,
            token: token.as_wire().to_string(),
            commands: commands.iter().map(Command::to_wire).collect(),
        });
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn finish(&self) {
        if let Some(token) = self.state.borrow_mut().cancel_after_next.take() {
            token.cancel();
        }
    }

    fn apply_all(&self, commands: &[Command]) -> (IdMap, HashMap<Uuid, CommandStatus>) {
        let mut mapping = IdMap::new();
        let mut statuses = HashMap::new();
        for command in commands {
            let wire = command.to_wire();
            let status = self.apply(&wire, &mut mapping);
            statuses.insert(command.uuid, status);
        }
        (mapping, statuses)
    }

    fn apply(&self, wire: &Value, mapping: &mut IdMap) -> CommandStatus {
        let type_name = wire["type"].as_str().unwrap_or_default().to_string();
        if self.state.borrow().rejected_types.contains(&type_name) {
            return error(30, "Rejected by test server");
        }

        let (kind, verb) = type_name.split_once('_').unwrap_or_default();
        let kind = match parse_kind(kind) {
            Some(kind) => kind,
            None => return error(1, "Unknown command"),
        };

        let mut args = wire["args"].clone();
        {
            let state = self.state.borrow();
            replace_temp_ids(&mut args, &state.id_map);
        }

        match verb {
            "add" => {
                let id = self.next_id();
                args["id"] = json!(id.to_string());
                if kind == EntityKind::Item {
                    if args["project_id"].is_null() {
                        args["project_id"] = json!(INBOX_ID.to_string());
                    }
                    args["date_added"] = json!(Time::now());
                }
                if let Some(temp) = wire["temp_id"].as_str() {
                    self.state
                        .borrow_mut()
                        .id_map
                        .insert(temp.to_string(), id.to_string());
                    if let Ok(temp) = temp.parse::<Id>() {
                        mapping.insert(temp, Id::Permanent(id));
                    }
                }
                self.insert(kind, args);
                CommandStatus::Ok
            }
            "update" => self.modify(kind, &args, |row, args| {
                if let (Some(row), Some(args)) = (row.as_object_mut(), args.as_object()) {
                    for (key, value) in args {
                        row.insert(key.clone(), value.clone());
                    }
                }
            }),
            "delete" => self.modify(kind, &args, |row, _| {
                row["is_deleted"] = json!(true);
            }),
            "move" => {
                let parent_project = args["parent_id"]
                    .as_str()
                    .and_then(|parent| self.field(EntityKind::Item, parent, "project_id"));
                self.modify(kind, &args, |row, args| {
                    if let Some(parent) = args["parent_id"].as_str() {
                        row["parent_id"] = json!(parent);
                        if let Some(project) = &parent_project {
                            row["project_id"] = project.clone();
                        }
                    } else if let Some(project) = args["project_id"].as_str() {
                        row["project_id"] = json!(project);
                        row["parent_id"] = Value::Null;
                    }
                })
            }
            "complete" => {
                let status = self.modify(kind, &args, |row, args| {
                    row["checked"] = json!(true);
                    row["date_completed"] = args["date_completed"].clone();
                });
                if status.is_ok() {
                    self.complete_descendants(args["id"].as_str().unwrap_or_default(), &args);
                }
                status
            }
            "uncomplete" => self.modify(kind, &args, |row, _| {
                row["checked"] = json!(false);
                row["date_completed"] = Value::Null;
            }),
            _ => error(1, "Unknown command"),
        }
    }

    fn modify<F>(&self, kind: EntityKind, args: &Value, change: F) -> CommandStatus
    where
        F: FnOnce(&mut Value, &Value),
    {
        let id = args["id"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.borrow_mut();
        state.version += 1;
        let version = state.version;
        match state
            .rows
            .iter_mut()
            .find(|r| r.kind == kind && r.id() == id && !r.is_deleted())
        {
            Some(row) => {
                change(&mut row.value, args);
                row.version = version;
                CommandStatus::Ok
            }
            None => error(22, &format!("{} not found", kind)),
        }
    }

    fn field(&self, kind: EntityKind, id: &str, field: &str) -> Option<Value> {
        self.state
            .borrow()
            .rows
            .iter()
            .find(|r| r.kind == kind && r.id() == id)
            .map(|r| r.value[field].clone())
    }

    fn complete_descendants(&self, id: &str, args: &Value) {
        let children: Vec<String> = self
            .state
            .borrow()
            .rows
            .iter()
            .filter(|r| r.kind == EntityKind::Item && r.value["parent_id"].as_str() == Some(id))
            .map(|r| r.id().to_string())
            .collect();
        for child in children {
            let child_args = json!({"id": child, "date_completed": args["date_completed"]});
            self.modify(EntityKind::Item, &child_args, |row, args| {
                row["checked"] = json!(true);
                row["date_completed"] = args["date_completed"].clone();
            });
            self.complete_descendants(&child, args);
        }
    }

    fn current_token(&self) -> SyncToken {
        SyncToken::new(format!("token-{}", self.state.borrow().version))
    }

    fn resources<E: DeserializeOwned>(&self, kind: EntityKind, since: Option<u64>) -> Option<Vec<E>> {
        let state = self.state.borrow();
        let rows: Vec<E> = state
            .rows
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| match since {
                Some(version) => r.version > version,
                None => !r.is_deleted(),
            })
            .map(|r| decode(&r.value))
            .collect();
        // Deltas leave unchanged kinds out entirely
        if since.is_some() && rows.is_empty() {
            None
        } else {
            Some(rows)
        }
    }
}

impl Transport for FakeServer {
    fn commit(
        &self,
        _ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<CommitResponse, TransportError> {
        self.begin("commit", token, commands)?;
        let (temp_id_mapping, sync_status) = self.apply_all(commands);
        self.finish();
        Ok(CommitResponse {
            temp_id_mapping,
            sync_status,
        })
    }

    fn sync(
        &self,
        _ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<SyncResponse, TransportError> {
        self.begin("sync", token, commands)?;
        let since = token
            .as_wire()
            .strip_prefix("token-")
            .and_then(|v| v.parse::<u64>().ok());
        let (temp_id_mapping, sync_status) = self.apply_all(commands);

        let response = SyncResponse {
            sync_token: self.current_token(),
            full_sync: since.is_none(),
            items: self.resources(EntityKind::Item, since),
            projects: self.resources(EntityKind::Project, since),
            labels: self.resources(EntityKind::Label, since),
            notes: self.resources(EntityKind::Note, since),
            filters: self.resources(EntityKind::Filter, since),
            reminders: self.resources(EntityKind::Reminder, since),
            temp_id_mapping,
            sync_status,
        };
        self.finish();
        Ok(response)
    }
}

fn error(code: i64, reason: &str) -> CommandStatus {
    CommandStatus::Error {
        code: Some(code),
        reason: reason.to_string(),
    }
}

fn parse_kind(text: &str) -> Option<EntityKind> {
    EntityKind::ALL.into_iter().find(|k| k.as_str() == text)
}

fn decode<E: DeserializeOwned>(value: &Value) -> E {
    serde_json::from_value(value.clone()).expect("server row decodes")
}

/// Rewrite every string that is a known temporary id
fn replace_temp_ids(value: &mut Value, id_map: &HashMap<String, String>) {
    match value {
        Value::String(s) => {
            if let Some(permanent) = id_map.get(s.as_str()) {
                *s = permanent.clone();
            }
        }
        Value::Array(values) => values.iter_mut().for_each(|v| replace_temp_ids(v, id_map)),
        Value::Object(map) => map.values_mut().for_each(|v| replace_temp_ids(v, id_map)),
        _ => {}
    }
}
