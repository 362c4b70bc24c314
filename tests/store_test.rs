mod common;

use serde_json::{Value, json};

use common::*;
use spotdeck::{
    management::ScheduleStore,
    types::{CredentialRecord, ScheduleEntry, Token},
};

fn read(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn schedule_round_trip() {
    let sandbox = Sandbox::new();
    let store = ScheduleStore::new(sandbox.schedule_path());

    let mut entry = ScheduleEntry::new("wake", "30 7 * * 1-5", "spotify:playlist:X");
    entry.shuffle = true;
    entry.device_id = Some("kitchen".into());
    entry.title = Some("Wake up".into());
    store.save(&[entry.clone()]).await.unwrap();

    let document = store.load_document().await;
    assert_eq!(document.items, vec![entry]);
    assert!(!document.legacy);
}

#[tokio::test]
async fn save_keeps_unknown_top_level_keys() {
    let sandbox = Sandbox::new();
    sandbox
        .write_schedule(&json!({
            "items": [],
            "deviceId": "living-room",
            "devices": ["a", " ", "b"],
            "note": "hand edited",
        }))
        .await;
    let store = ScheduleStore::new(sandbox.schedule_path());

    store
        .save(&[ScheduleEntry::new("x", "* * * * *", "spotify:track:T")])
        .await
        .unwrap();

    let on_disk = read(&sandbox.schedule_path());
    assert_eq!(on_disk["note"], "hand edited");
    assert_eq!(on_disk["deviceId"], "living-room");
    assert_eq!(on_disk["items"][0]["id"], "x");
    assert_eq!(on_disk["items"][0]["startFromBeginning"], true);

    let document = store.load_document().await;
    assert_eq!(document.device_id.as_deref(), Some("living-room"));
    assert_eq!(document.devices, vec!["a", "b"]);
}

#[tokio::test]
async fn entries_keep_unknown_fields() {
    let sandbox = Sandbox::new();
    sandbox
        .write_schedule(&json!({
            "items": [{ "id": "a", "cron": "0 8 * * *", "uri": "spotify:album:A", "color": "red" }],
        }))
        .await;
    let store = ScheduleStore::new(sandbox.schedule_path());

    let items = store.load().await;
    assert_eq!(items[0].extra.get("color"), Some(&json!("red")));

    store.save(&items).await.unwrap();
    assert_eq!(read(&sandbox.schedule_path())["items"][0]["color"], "red");
}

#[tokio::test]
async fn missing_or_corrupt_schedule_is_empty() {
    let sandbox = Sandbox::new();
    let store = ScheduleStore::new(sandbox.schedule_path());
    assert!(store.load().await.is_empty());

    std::fs::write(sandbox.schedule_path(), "{ not json").unwrap();
    let document = store.load_document().await;
    assert!(document.items.is_empty());
    assert!(!document.legacy);
}

#[tokio::test]
async fn legacy_document_and_malformed_items() {
    let sandbox = Sandbox::new();
    sandbox.write_schedule(&json!({ "cron": "0 8 * * *" })).await;
    let store = ScheduleStore::new(sandbox.schedule_path());
    let document = store.load_document().await;
    assert!(document.legacy);
    assert!(document.items.is_empty());

    sandbox
        .write_schedule(&json!({
            "items": [
                { "id": "ok", "cron": "0 8 * * *", "uri": "spotify:track:T" },
                "not an entry",
                { "id": 42, "cron": [], "uri": null, "devices": ["d1", 7, null] },
            ],
        }))
        .await;
    let items = store.load().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "ok");
    assert!(items[0].enabled);
    assert!(!items[0].shuffle);

    assert_eq!(items[1].id, "42");
    assert_eq!(items[1].cron, "");
    assert_eq!(items[1].uri, "");
    assert_eq!(items[1].devices, Some(vec!["d1".to_string(), "7".to_string()]));
}

#[tokio::test]
async fn ensure_exists_creates_an_empty_schedule_once() {
    let sandbox = Sandbox::new();
    let path = sandbox.dir.path().join("nested").join("schedule.json");
    let store = ScheduleStore::new(&path);

    store.ensure_exists().await.unwrap();
    assert_eq!(read(&path), json!({ "items": [] }));

    store
        .save(&[ScheduleEntry::new("x", "* * * * *", "spotify:track:T")])
        .await
        .unwrap();
    store.ensure_exists().await.unwrap();
    assert_eq!(store.load().await.len(), 1);
}

#[tokio::test]
async fn grant_without_refresh_token_keeps_the_stored_one() {
    let sandbox = Sandbox::new();
    let store = sandbox.connect().await;

    let record = store
        .store_grant(&Token {
            access_token: "a".into(),
            refresh_token: None,
            scope: Some("user-read-private".into()),
            expires_in: 3600,
        })
        .await
        .unwrap();

    assert_eq!(record.refresh_token(), Some("stored-refresh"));
    assert_eq!(record.scope.as_deref(), Some("user-read-private"));
    assert!(record.updated_at.is_some());
    assert_eq!(store.load().await, record);
}

#[tokio::test]
async fn credential_store_is_fail_soft() {
    let sandbox = Sandbox::new();
    let store = sandbox.credentials();
    assert_eq!(store.load().await, CredentialRecord::default());
    assert!(!store.is_connected().await);

    std::fs::write(store.path(), "garbage").unwrap();
    assert_eq!(store.load().await, CredentialRecord::default());

    std::fs::write(store.path(), r#"{"refresh_token": "   "}"#).unwrap();
    assert!(!store.is_connected().await);

    store.ensure_exists().await.unwrap();
    std::fs::write(store.path(), r#"{"refresh_token": "r", "owner": "me"}"#).unwrap();
    let record = store.load().await;
    assert!(store.is_connected().await);
    assert_eq!(record.extra.get("owner"), Some(&json!("me")));
}
