mod support;

use serde_json::json;
use tempfile::TempDir;

use support::{FakeServer, INBOX_ID};
use todoist_core::{
    CancellationToken, Client, EntityKind, Error, FilePersistence, Id, Item, ItemMoveOpts, Label,
    MemoryPersistence, Project, SyncContext, SyncPhase, Time, TransportError,
};

type TestClient = Client<FakeServer, MemoryPersistence>;

/// Client that has completed an initial full sync
fn synced_client(server: FakeServer) -> TestClient {
    let mut client = Client::new(server, MemoryPersistence::new()).unwrap();
    client.full_sync(&SyncContext::new()).unwrap();
    client
}

fn ctx() -> SyncContext {
    SyncContext::new()
}

fn inbox(client: &TestClient) -> Project {
    client.projects().find(|p| p.inbox_project)[0].clone()
}

#[test]
fn test_add_resolves_before_commit() {
    let mut client = synced_client(FakeServer::new());

    let id = client.items_mut().add(Item::new("Buy milk"));

    assert!(id.is_temporary());
    let item = client.items().resolve(id).unwrap();
    assert_eq!(item.content, "Buy milk");
    assert!(client.transport().requests().iter().all(|r| r.commands.is_empty()));
}

#[test]
fn test_write_report_to_inbox() {
    let mut client = synced_client(FakeServer::new());
    let inbox = inbox(&client);
    assert_eq!(inbox.id, Id::Permanent(INBOX_ID));

    let mut item = Item::new("Write report");
    item.project_id = Some(inbox.id);
    let temp = client.items_mut().add(item);

    let ctx = ctx();
    let item: Item = client.submit(&ctx, temp).unwrap();

    assert!(item.id.is_permanent());
    assert_eq!(item.project_id, Some(inbox.id));
    assert!(!item.date_added.is_zero());
    assert_eq!(item.content, "Write report");
    assert!(client.items().resolve(temp).is_none());
}

#[test]
fn test_buy_milk_found_once_after_sync() {
    let mut client = synced_client(FakeServer::new());
    client.items_mut().add(Item::new("Buy milk"));

    client.commit(&ctx()).unwrap();
    client.full_sync(&ctx()).unwrap();

    let found = client.items().find_by_content("Buy milk");
    assert_eq!(found.len(), 1);
    assert!(found[0].id.is_permanent());
}

#[test]
fn test_commit_remaps_every_reference() {
    let mut client = synced_client(FakeServer::new());

    let project = client.projects_mut().add(Project::new("Work"));
    let label = client.labels_mut().add(Label::new("urgent"));
    let mut parent = Item::new("Quarterly plan");
    parent.project_id = Some(project);
    let parent = client.items_mut().add(parent);
    let mut child = Item::new("Draft outline");
    child.project_id = Some(project);
    child.parent_id = Some(parent);
    child.add_label(label);
    let child = client.items_mut().add(child);
    assert!(client.stores().any_temporary());

    let report = client.commit(&ctx()).unwrap();

    assert_eq!(report.applied, 4);
    assert!(!client.stores().any_temporary());
    assert!(!client.stores().has_pending());
    let child = client.items().resolve(report.permanent_id(child)).unwrap();
    assert_eq!(child.project_id, Some(report.permanent_id(project)));
    assert_eq!(child.parent_id, Some(report.permanent_id(parent)));
    assert_eq!(child.labels, vec![report.permanent_id(label)]);

    // The server saw the same references
    let rows: Vec<Item> = client.transport().rows(EntityKind::Item);
    let remote = rows.iter().find(|i| i.content == "Draft outline").unwrap();
    assert_eq!(remote.parent_id, child.parent_id);
}

#[test]
fn test_commit_does_not_advance_token() {
    let mut client = synced_client(FakeServer::new());
    let token = client.sync_token().clone();

    client.items_mut().add(Item::new("Buy milk"));
    client.commit(&ctx()).unwrap();

    assert_eq!(client.sync_token(), &token);
}

#[test]
fn test_failed_commit_restores_queue_in_order() {
    let mut client = synced_client(FakeServer::new());
    let first = client.items_mut().add(Item::new("one"));
    client.items_mut().add(Item::new("two"));
    client.labels_mut().add(Label::new("three"));
    let before: Vec<_> = client.queue().iter().map(|c| c.uuid).collect();

    client.transport().fail_next(TransportError::Timeout);
    let err = client.commit(&ctx()).unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Timeout)));
    assert!(err.is_retryable());
    assert_eq!(client.phase(), SyncPhase::Failed);
    let after: Vec<_> = client.queue().iter().map(|c| c.uuid).collect();
    assert_eq!(after, before);
    assert!(client.items().resolve(first).is_some());

    // A retry sends the same batch
    let report = client.commit(&ctx()).unwrap();
    assert_eq!(report.applied, 3);
    assert_eq!(client.phase(), SyncPhase::Idle);
    assert!(client.queue().is_empty());
}

#[test]
fn test_cancelled_before_send() {
    let mut client = synced_client(FakeServer::new());
    client.items_mut().add(Item::new("Buy milk"));
    let requests = client.transport().requests().len();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .commit(&ctx().with_cancellation(cancel))
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(client.transport().requests().len(), requests);
    assert_eq!(client.queue().len(), 1);
}

#[test]
fn test_cancel_after_reply_still_applies_it() {
    let mut client = synced_client(FakeServer::new());
    let temp = client.items_mut().add(Item::new("Buy milk"));

    let cancel = CancellationToken::new();
    client.transport().cancel_after_next(cancel.clone());
    let report = client
        .commit(&ctx().with_cancellation(cancel.clone()))
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(report.applied, 1);
    assert!(report.permanent_id(temp).is_permanent());
    assert!(client.queue().is_empty());
    assert_eq!(client.phase(), SyncPhase::Idle);

    // Retrying has nothing left to send
    let retry = client.commit(&ctx()).unwrap();
    assert_eq!(retry.applied, 0);
    client.full_sync(&ctx()).unwrap();

    let rows: Vec<Item> = client.transport().rows(EntityKind::Item);
    assert_eq!(rows.iter().filter(|i| i.content == "Buy milk").count(), 1);
    assert_eq!(client.items().find_by_content("Buy milk").len(), 1);
}

#[test]
fn test_partial_failure_keeps_accepted_changes() {
    let server = FakeServer::new();
    let existing = server.remote_add_item("original");
    let mut client = synced_client(server);

    let mut edited = client.items().resolve(existing).unwrap().clone();
    edited.content = "edited".to_string();
    client.items_mut().update(edited).unwrap();
    let label = client.labels_mut().add(Label::new("home"));
    client.transport().reject("item_update");

    let err = client.commit(&ctx()).unwrap_err();

    let failures = match err {
        Error::PartialCommandFailure(failures) => failures,
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "item_update");
    assert_eq!(failures[0].target, existing);
    assert_eq!(failures[0].error_code, Some(30));

    assert_eq!(client.items().resolve(existing).unwrap().content, "original");
    assert!(client.labels().resolve(label).is_none());
    let home = client.labels().find_one_by_name("home").unwrap();
    assert!(home.id.is_permanent());
    assert!(client.queue().is_empty());
}

#[test]
fn test_delete_unknown_id() {
    let mut client = synced_client(FakeServer::new());
    client.items_mut().add(Item::new("queued"));

    let err = client.items_mut().delete(Id::Permanent(424242)).unwrap_err();

    assert!(matches!(
        err,
        Error::NotFound {
            kind: EntityKind::Item,
            ..
        }
    ));
    assert_eq!(client.queue().len(), 1);
}

#[test]
fn test_delete_visible_until_confirmed() {
    let server = FakeServer::new();
    let id = server.remote_add_item("Old task");
    let mut client = synced_client(server);

    client.items_mut().delete(id).unwrap();
    assert!(client.items().resolve(id).is_some());
    assert!(client.items().is_pending_delete(id));

    client.push(&ctx()).unwrap();
    assert!(client.items().resolve(id).is_none());
    assert!(client.transport().rows::<Item>(EntityKind::Item).is_empty());
}

#[test]
fn test_two_moves_last_one_wins() {
    let mut client = synced_client(FakeServer::new());
    let a = client.items_mut().add(Item::new("A"));
    let b = client.items_mut().add(Item::new("B"));
    let c = client.items_mut().add(Item::new("C"));
    let report = client.push(&ctx()).unwrap();
    let (a, b, c) = (
        report.permanent_id(a),
        report.permanent_id(b),
        report.permanent_id(c),
    );

    client.items_mut().move_item(c, ItemMoveOpts::to_parent(a)).unwrap();
    client.items_mut().move_item(c, ItemMoveOpts::to_parent(b)).unwrap();

    let types: Vec<_> = client.queue().iter().map(|cmd| cmd.type_name()).collect();
    assert_eq!(types, vec!["item_move", "item_move"]);
    assert_eq!(client.items().resolve(c).unwrap().parent_id, Some(b));

    client.push(&ctx()).unwrap();
    assert_eq!(client.items().resolve(c).unwrap().parent_id, Some(b));
    let rows: Vec<Item> = client.transport().rows(EntityKind::Item);
    let remote = rows.iter().find(|i| i.id == c).unwrap();
    assert_eq!(remote.parent_id, Some(b));
}

#[test]
fn test_complete_with_children() {
    let mut client = synced_client(FakeServer::new());
    let parent = client.items_mut().add(Item::new("Trip"));
    let mut child = Item::new("Pack");
    child.parent_id = Some(parent);
    client.items_mut().add(child);
    let report = client.push(&ctx()).unwrap();
    let parent = report.permanent_id(parent);

    let err = client
        .items_mut()
        .complete(parent, Time::now(), false)
        .unwrap_err();
    assert!(matches!(err, Error::IncompleteChildren { open: 1, .. }));
    assert!(client.queue().is_empty());

    client.items_mut().complete(parent, Time::now(), true).unwrap();
    client.push(&ctx()).unwrap();

    assert!(client.items().iter().all(|i| i.checked));
    let rows: Vec<Item> = client.transport().rows(EntityKind::Item);
    assert!(rows.iter().all(|i| i.checked && !i.date_completed.is_zero()));
}

#[test]
fn test_delta_sync_merges_remote_changes() {
    let server = FakeServer::new();
    server.remote_add_item("keep");
    let change = server.remote_add_item("change");
    let drop = server.remote_add_item("drop");
    let mut client = synced_client(server);
    assert_eq!(client.items().len(), 3);

    let server = client.transport();
    server.remote_set(EntityKind::Item, change, "content", json!("changed"));
    server.remote_delete(EntityKind::Item, drop);
    server.remote_add_item("new");

    let report = client.full_sync(&ctx()).unwrap();

    assert!(!report.full);
    assert_eq!(report.received, 3);
    let contents: Vec<_> = client.items().iter().map(|i| i.content.clone()).collect();
    assert_eq!(contents, vec!["keep", "changed", "new"]);
    // Projects were absent from the delta
    assert_eq!(client.projects().len(), 1);
}

#[test]
fn test_reset_token_forces_full_sync() {
    let mut client = synced_client(FakeServer::new());
    client.reset_sync_token();

    let report = client.full_sync(&ctx()).unwrap();

    assert!(report.full);
    let last = client.transport().requests().pop().unwrap();
    assert_eq!(last.token, "*");
}

#[test]
fn test_commit_and_sync_is_one_request() {
    let mut client = synced_client(FakeServer::new());
    let before = client.transport().requests().len();
    client.items_mut().add(Item::new("Buy milk"));

    let report = client.commit_and_sync(&ctx()).unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), before + 1);
    let last = requests.last().unwrap();
    assert_eq!(last.endpoint, "sync");
    assert_eq!(last.commands.len(), 1);
    assert_eq!(last.commands[0]["type"], "item_add");
    assert!(last.commands[0]["temp_id"].is_string());
    assert!(last.commands[0]["args"].get("id").is_none());

    assert_eq!(report.commit.applied, 1);
    let found = client.items().find_by_content("Buy milk");
    assert_eq!(found.len(), 1);
    assert!(found[0].id.is_permanent());
    assert!(client.queue().is_empty());
}

#[test]
fn test_commit_and_sync_failure_restores_queue() {
    let mut client = synced_client(FakeServer::new());
    let temp = client.items_mut().add(Item::new("Buy milk"));
    let token = client.sync_token().clone();

    client
        .transport()
        .fail_next(TransportError::Network("connection reset".to_string()));
    let err = client.commit_and_sync(&ctx()).unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(client.queue().len(), 1);
    assert!(client.items().resolve(temp).is_some());
    assert_eq!(client.sync_token(), &token);
}

#[test]
fn test_sync_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");

    let server = FakeServer::new();
    server.remote_add_item("Buy milk");
    let mut client = Client::new(server, FilePersistence::new(&path)).unwrap();
    client.full_sync(&ctx()).unwrap();
    // Staged changes are not persisted
    client.labels_mut().add(Label::new("draft"));
    let token = client.sync_token().clone();

    let reopened = Client::new(FakeServer::new(), FilePersistence::new(&path)).unwrap();

    assert_eq!(reopened.sync_token(), &token);
    assert_eq!(reopened.items().find_by_content("Buy milk").len(), 1);
    assert_eq!(reopened.projects().len(), 1);
    assert!(reopened.labels().is_empty());
    assert!(reopened.queue().is_empty());
}
