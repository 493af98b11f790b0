//! Writer behaviour against an in-memory store and a recording publisher.

use std::sync::Arc;
use std::time::Duration;

use listcast_core::{
    AckMode, Change, ChannelWriters, Command, EventBroadcaster, ListStore, ListcastError,
    WriterConfig,
};
use listcast_testing::{list, FlakyStore, RecordingPublisher};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    store: FlakyStore,
    publisher: RecordingPublisher,
    writers: ChannelWriters,
}

fn harness(config: WriterConfig) -> Harness {
    let store = FlakyStore::new();
    let publisher = RecordingPublisher::new();
    let writers = ChannelWriters::new(
        Arc::new(store.clone()),
        EventBroadcaster::new(Arc::new(publisher.clone())),
        config,
    );
    Harness {
        store,
        publisher,
        writers,
    }
}

fn fast_retries() -> WriterConfig {
    WriterConfig {
        save_backoff: Duration::from_millis(1),
        ..WriterConfig::default()
    }
}

fn insert(id: &str) -> Command {
    Command::Insert {
        id: id.into(),
        contents: format!("{id} contents"),
    }
}

#[tokio::test]
async fn changes_are_saved_then_broadcast_in_command_order() {
    let h = harness(fast_retries());

    h.writers.dispatch("groceries", insert("a")).await.unwrap();
    h.writers.dispatch("groceries", insert("b")).await.unwrap();
    h.writers
        .dispatch(
            "groceries",
            Command::Toggle {
                id: "a".into(),
                checked: true,
            },
        )
        .await
        .unwrap();
    h.writers.shutdown().await;

    assert_eq!(h.publisher.event_names(), vec!["insert", "insert", "toggle"]);
    let published = h.publisher.published_to("groceries");
    assert_eq!(published[2].data()["id"], "a");
    assert_eq!(published[2].data()["checked"], true);

    let stored = h.store.load("groceries").await.unwrap();
    assert_eq!(stored.ids(), vec!["a", "b"]);
    assert!(stored.get("a").unwrap().checked);
    assert!(stored.has_dense_positions());
}

#[tokio::test]
async fn not_found_reaches_the_caller_and_publishes_nothing() {
    let h = harness(fast_retries());

    let err = h
        .writers
        .dispatch(
            "groceries",
            Command::UpdateContents {
                id: "ghost".into(),
                contents: "boo".into(),
            },
        )
        .await
        .unwrap_err();
    h.writers.shutdown().await;

    assert!(matches!(err, ListcastError::NotFound { ref id } if id == "ghost"));
    assert!(h.publisher.published().is_empty());
    assert_eq!(h.store.save_calls(), 0);
}

#[tokio::test]
async fn concurrent_inserts_on_one_channel_lose_nothing() {
    let h = harness(fast_retries());

    let mut handles = Vec::new();
    for n in 0..50 {
        let writers = h.writers.clone();
        handles.push(tokio::spawn(async move {
            writers.dispatch("shared", insert(&format!("item-{n}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    h.writers.shutdown().await;

    let stored = h.store.load("shared").await.unwrap();
    assert_eq!(stored.len(), 50);
    assert!(stored.has_dense_positions());
    assert_eq!(h.store.load_calls(), 2, "writer loads once, the assertion once");
}

#[tokio::test]
async fn applied_ack_answers_before_the_save_lands() {
    let h = harness(fast_retries());
    h.store.delay_saves(Duration::from_millis(300));

    h.writers.dispatch("slow", insert("a")).await.unwrap();

    assert!(h.store.memory().get_raw("slow").is_none());
    assert!(h.publisher.published().is_empty());

    h.writers.shutdown().await;
    assert!(h.store.memory().get_raw("slow").is_some());
    assert_eq!(h.publisher.event_names(), vec!["insert"]);
}

#[tokio::test]
async fn failed_saves_are_retried_before_publishing() {
    let h = harness(fast_retries());
    h.store.fail_next_saves(2);

    h.writers.dispatch("groceries", insert("a")).await.unwrap();
    let published = h.publisher.wait_for(1, WAIT).await;
    h.writers.shutdown().await;

    assert_eq!(h.store.save_calls(), 3);
    assert_eq!(published.len(), 1);
    assert_eq!(h.store.load("groceries").await.unwrap().ids(), vec!["a"]);
}

#[tokio::test]
async fn committed_ack_surfaces_exhausted_saves_and_skips_broadcast() {
    let h = harness(WriterConfig {
        ack: AckMode::Committed,
        save_attempts: 2,
        ..fast_retries()
    });
    h.store.fail_next_saves(2);

    let err = h
        .writers
        .dispatch("groceries", insert("a"))
        .await
        .unwrap_err();
    assert!(matches!(err, ListcastError::StoreUnavailable { .. }));

    // The dropped change is not cached: the next command starts from storage.
    h.writers.dispatch("groceries", insert("b")).await.unwrap();
    h.writers.shutdown().await;

    assert_eq!(h.publisher.event_names(), vec!["insert"]);
    assert_eq!(h.publisher.published()[0].data()["id"], "b");
    assert_eq!(h.store.load("groceries").await.unwrap().ids(), vec!["b"]);
}

#[tokio::test]
async fn load_failure_is_reported_as_store_unavailable() {
    let h = harness(fast_retries());
    h.store.fail_next_loads(1);

    let err = h
        .writers
        .dispatch("groceries", insert("a"))
        .await
        .unwrap_err();
    assert!(matches!(err, ListcastError::StoreUnavailable { ref channel, .. } if channel == "groceries"));

    h.writers.dispatch("groceries", insert("a")).await.unwrap();
    h.writers.shutdown().await;
    assert_eq!(h.store.load("groceries").await.unwrap().len(), 1);
}

#[tokio::test]
async fn publish_failure_does_not_fail_the_command() {
    let h = harness(WriterConfig {
        ack: AckMode::Committed,
        ..fast_retries()
    });
    h.publisher.fail_next(1);

    let change = h.writers.dispatch("groceries", insert("a")).await.unwrap();
    h.writers.shutdown().await;

    assert_eq!(change.event_name(), "insert");
    assert!(h.publisher.published().is_empty());
    assert_eq!(h.store.load("groceries").await.unwrap().len(), 1);
}

#[tokio::test]
async fn init_broadcasts_repaired_list_and_me() {
    let h = harness(fast_retries());
    h.store
        .memory()
        .put_raw("legacy", r#"[{"id":"a","contents":"milk"},{"id":"b","contents":"eggs"}]"#);

    let change = h
        .writers
        .dispatch(
            "legacy",
            Command::Init {
                me: Some("tab-1".into()),
            },
        )
        .await
        .unwrap();
    let published = h.publisher.wait_for(1, WAIT).await;
    h.writers.shutdown().await;

    assert!(matches!(change, Change::Init { .. }));
    assert_eq!(h.store.save_calls(), 0);
    assert_eq!(published[0].event(), "init");
    let data = published[0].data();
    assert_eq!(data["me"], "tab-1");
    assert_eq!(data["list"][1]["position"], 1);
    assert_eq!(data["list"][1]["checked"], false);
}

#[tokio::test]
async fn insert_after_stale_positions_saves_dense_positions() {
    let h = harness(WriterConfig {
        ack: AckMode::Committed,
        ..fast_retries()
    });
    h.store
        .memory()
        .put_raw("gapped", r#"[{"id":"a","contents":"x","position":1}]"#);

    h.writers.dispatch("gapped", insert("b")).await.unwrap();
    h.writers.shutdown().await;

    let stored: serde_json::Value =
        serde_json::from_str(&h.store.memory().get_raw("gapped").unwrap()).unwrap();
    assert_eq!(stored[0]["id"], "a");
    assert_eq!(stored[0]["position"], 0);
    assert_eq!(stored[1]["id"], "b");
    assert_eq!(stored[1]["position"], 1);
}

#[tokio::test]
async fn loosely_written_records_stay_usable() {
    let h = harness(WriterConfig {
        ack: AckMode::Committed,
        ..fast_retries()
    });
    h.store.memory().put_raw(
        "loose",
        r#"[{"contents":"no id","position":0},{"id":"a","contents":"x","checked":1,"position":1}]"#,
    );

    let init = h
        .writers
        .dispatch("loose", Command::Init { me: None })
        .await
        .unwrap();
    let Change::Init { list, .. } = init else {
        panic!("expected an init change, got {init:?}");
    };
    assert_eq!(list.ids(), vec!["", "a"]);
    assert!(list.get("a").unwrap().checked);

    h.writers
        .dispatch("loose", Command::ClearCompleted)
        .await
        .unwrap();
    h.writers.shutdown().await;

    let stored = h.store.load("loose").await.unwrap();
    assert_eq!(stored.ids(), vec![""]);
    assert!(stored.has_dense_positions());
}

#[tokio::test]
async fn channels_do_not_share_lists() {
    let h = harness(fast_retries());
    h.store
        .memory()
        .put_raw("done", list(&[("x", true)]).to_json().unwrap());

    h.writers.dispatch("todo", insert("a")).await.unwrap();
    h.writers
        .dispatch("done", Command::ClearCompleted)
        .await
        .unwrap();
    h.writers.shutdown().await;

    assert_eq!(h.store.load("todo").await.unwrap().ids(), vec!["a"]);
    assert!(h.store.load("done").await.unwrap().is_empty());
    assert_eq!(h.publisher.published_to("done")[0].event(), "clear-completed");
}

#[tokio::test]
async fn reorder_is_published_with_the_full_list() {
    let h = harness(fast_retries());
    h.store
        .memory()
        .put_raw("c", list(&[("a", false), ("b", false), ("c", false)]).to_json().unwrap());

    h.writers
        .dispatch(
            "c",
            Command::UpdatePositions {
                ordered_ids: vec!["c".into(), "a".into()],
            },
        )
        .await
        .unwrap();
    h.writers.shutdown().await;

    let published = h.publisher.published();
    assert_eq!(published[0].event(), "updated-positions");
    let ids: Vec<_> = published[0].data()["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
    assert_eq!(h.store.load("c").await.unwrap().ids(), vec!["c", "a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn idle_writers_retire_and_come_back_on_demand() {
    let h = harness(WriterConfig {
        idle_timeout: Duration::from_secs(1),
        ..fast_retries()
    });

    h.writers.dispatch("groceries", insert("a")).await.unwrap();
    assert_eq!(h.writers.active_channels(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.writers.active_channels(), 0);

    h.writers.dispatch("groceries", insert("b")).await.unwrap();
    h.writers.shutdown().await;

    assert_eq!(h.store.load_calls(), 2);
    assert_eq!(h.store.load("groceries").await.unwrap().ids(), vec!["a", "b"]);
}

#[tokio::test]
async fn dispatch_after_shutdown_is_refused() {
    let h = harness(fast_retries());
    h.writers.shutdown().await;

    let err = h
        .writers
        .dispatch("groceries", insert("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, ListcastError::WriterGone { .. }));
}
