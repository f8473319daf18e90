use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use basket_core::config::SyncSettings;
use basket_core::services::ItemStore;
use basket_core::sync::CycleReport;
use basket_core::util::parse_timestamp;
use basket_core::{Item, SyncState};

use crate::commands::add::run_add;
use crate::commands::bought::run_bought;
use crate::commands::common::{
    format_cycle_report, format_item_lines, format_relative_time, normalize_item_identifier,
    resolve_endpoint, resolve_item, resolve_item_name,
};
use crate::commands::delete::run_delete;
use crate::commands::rename::run_rename;
use crate::commands::status::collect_status;
use crate::commands::sync::{parse_connectivity, sync_once};
use crate::error::CliError;

#[test]
fn resolve_item_name_joins_and_rejects_empty() {
    assert_eq!(
        resolve_item_name(&["oat".to_string(), "milk ".to_string()]).unwrap(),
        "oat milk"
    );
    assert!(matches!(
        resolve_item_name(&[" ".to_string()]),
        Err(CliError::EmptyName)
    ));
    assert!(matches!(resolve_item_name(&[]), Err(CliError::EmptyName)));
}

#[test]
fn normalize_item_identifier_rejects_blank() {
    assert_eq!(normalize_item_identifier(" 0190 ").unwrap(), "0190");
    assert!(matches!(
        normalize_item_identifier("   "),
        Err(CliError::EmptyItemId)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = parse_timestamp("2024-05-02T12:00:00.000Z").unwrap();
    let ago = |text: &str| format_relative_time(&parse_timestamp(text).unwrap(), &now);

    assert_eq!(ago("2024-05-02T11:59:30.000Z"), "just now");
    assert_eq!(ago("2024-05-02T11:58:00.000Z"), "2m ago");
    assert_eq!(ago("2024-05-02T10:00:00.000Z"), "2h ago");
    assert_eq!(ago("2024-04-30T12:00:00.000Z"), "2d ago");
    assert_eq!(ago("2024-05-02T12:00:30.000Z"), "just now");
}

#[test]
fn format_item_lines_marks_bought_and_unsynced_items() {
    let mut bread = Item::new("bread").unwrap();
    bread.set_bought(true);
    let mut synced = Item::new("eggs").unwrap();
    synced.state = SyncState::Synced;

    let lines = format_item_lines(&[bread, synced]);

    assert!(lines[0].contains("[x] bread"));
    assert!(lines[0].contains(SyncState::Pending.label()));
    assert!(lines[1].contains("[ ] eggs"));
    assert!(!lines[1].contains(SyncState::Synced.label()));
}

#[test]
fn format_cycle_report_describes_outcome() {
    assert_eq!(
        format_cycle_report(&CycleReport::offline()),
        "Offline, sync skipped"
    );
    assert_eq!(
        format_cycle_report(&CycleReport::failed("bad endpoint")),
        "Sync failed: bad endpoint"
    );

    let mut report = CycleReport::default();
    report.push.created = 2;
    report.push.rejected = 1;
    report.push.superseded = 1;
    report.pull.inserted = 3;
    report.pull.error = Some("timed out".to_string());
    let line = format_cycle_report(&report);
    assert!(line.starts_with("Pushed 2 (created 2"));
    assert!(line.contains("pulled 3 (new 3"));
    assert!(line.contains("1 left pending (1 rejected, 0 failed)"));
    assert!(line.contains("1 changed while syncing, will resend"));
    assert!(line.contains("pull failed: timed out"));
}

#[test]
fn connectivity_lines_toggle_the_network_gate() {
    assert_eq!(parse_connectivity("offline"), Some(false));
    assert_eq!(parse_connectivity(" Online \n"), Some(true));
    assert_eq!(parse_connectivity(r#"{"type":"pause"}"#), None);
    assert_eq!(parse_connectivity(""), None);
}

#[tokio::test(flavor = "current_thread")]
async fn add_rename_and_buy_items_by_prefix() {
    let db_path = unique_test_db_path();

    run_add(&["rolled".to_string(), "oats".to_string()], &db_path)
        .await
        .unwrap();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    let item = store.list_items(false).await.unwrap().remove(0);
    assert_eq!(item.name, "rolled oats");
    let prefix = item.id.to_string().chars().take(13).collect::<String>();

    run_rename(&prefix, &["steel".to_string(), "cut".to_string()], &db_path)
        .await
        .unwrap();
    run_bought(&prefix, true, &db_path).await.unwrap();

    let updated = store.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(updated.name, "steel cut");
    assert!(updated.is_bought());
    assert_eq!(updated.state, SyncState::Pending);

    run_bought(&prefix, false, &db_path).await.unwrap();
    let undone = store.get_item(&item.id).await.unwrap().unwrap();
    assert!(!undone.is_bought());

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_item_reports_missing_and_ambiguous_prefixes() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    let first = store.create_item("first").await.unwrap();
    store.create_item("second").await.unwrap();

    let exact = resolve_item(&first.id.to_string(), &store).await.unwrap();
    assert_eq!(exact.id, first.id);

    let shared_prefix = first.id.to_string().chars().take(4).collect::<String>();
    assert!(matches!(
        resolve_item(&shared_prefix, &store).await,
        Err(CliError::AmbiguousItemId(_))
    ));
    assert!(matches!(
        resolve_item("zzzz", &store).await,
        Err(CliError::ItemNotFound(_))
    ));

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn delete_tombstones_item_until_sync() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    let item = store.create_item("candles").await.unwrap();

    run_delete(&item.id.to_string(), &db_path).await.unwrap();

    assert!(store.list_items(false).await.unwrap().is_empty());
    let all = store.list_items(true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].state, SyncState::Discarded);
    assert!(matches!(
        resolve_item(&item.id.to_string(), &store).await,
        Err(CliError::ItemNotFound(_))
    ));

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn status_counts_unsynced_changes() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    store.create_item("tea").await.unwrap();
    let gone = store.create_item("coffee").await.unwrap();
    store.remove_item(&gone.id).await.unwrap();

    let status = collect_status(&db_path).await.unwrap();

    assert_eq!(status.unsynced, 2);
    assert_eq!(status.endpoint, None);
    assert_eq!(status.last_sync, None);

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_endpoint_prefers_flag_then_stored_value() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    store.save_endpoint("http://stored.test").await.unwrap();

    let flagged = resolve_endpoint(Some(" http://flag.test ".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(flagged, "http://flag.test");

    if std::env::var_os("BASKET_ENDPOINT").is_none() {
        let stored = resolve_endpoint(None, &store).await.unwrap();
        assert_eq!(stored, "http://stored.test");
    }

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn sync_once_with_invalid_endpoint_fails_without_watermark() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    store.create_item("bananas").await.unwrap();

    let report = sync_once(&store, "ftp://remote.test", SyncSettings::default())
        .await
        .unwrap();

    assert!(report.error.is_some());
    assert_eq!(store.last_sync().await.unwrap(), None);
    assert_eq!(store.list_dirty_count().await, 1);

    drop(store);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn sync_once_against_unreachable_remote_keeps_changes_dirty() {
    let db_path = unique_test_db_path();
    let store = ItemStore::open_path(&db_path).await.unwrap();
    store.create_item("grapes").await.unwrap();

    let report = sync_once(&store, "http://127.0.0.1:9", SyncSettings::default())
        .await
        .unwrap();

    assert_eq!(report.push.failed, 1);
    assert!(report.pull.error.is_some());
    assert!(report.reconcile.error.is_some());
    assert_eq!(report.last_sync, None);
    assert_eq!(store.last_sync().await.unwrap(), None);
    assert_eq!(store.list_dirty_count().await, 1);

    drop(store);
    cleanup_db_files(&db_path);
}

trait DirtyCount {
    async fn list_dirty_count(&self) -> usize;
}

impl DirtyCount for ItemStore {
    async fn list_dirty_count(&self) -> usize {
        self.state_counts()
            .await
            .unwrap()
            .into_iter()
            .filter(|(state, _)| state.is_dirty())
            .map(|(_, count)| count)
            .sum()
    }
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("basket-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
