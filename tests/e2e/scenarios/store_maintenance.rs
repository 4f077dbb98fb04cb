use crate::harness::{topic, Assertion, MockClock, Scenario, TestWorkspace};
use anyhow::ensure;
use vdoc_core::{ChangeVerb, ReclaimConfig, SaveOptions, TopicObject};

#[test]
fn test_move_carries_history_and_attachments() {
    Scenario::new("move_topic")
        .saves_new_revision("Main.Old", "alice", "one")
        .saves_new_revision("Main.Old", "alice", "two")
        .attaches("Main.Old", "a.png", "alice", b"png")
        .moves("Main.Old", "Archive.New")
        .assert_text("Archive.New", "two", 2)
        .assert_text_at("Archive.New", 1, "one", 1)
        .assert(Assertion::AttachmentData {
            topic: "Archive.New".into(),
            name: "a.png".into(),
            rev: None,
            data: b"png".to_vec(),
            served: 1,
        })
        .assert_custom(|store| {
            ensure!(!store.exists(&topic("Main.Old")?));
            ensure!(store.list_topics("Main")?.is_empty());
            ensure!(store.list_topics("Archive")? == ["New"]);

            let moved: Vec<_> = store.changes_since("Archive", 0)?.into_iter().map(|c| c.verb).collect();
            ensure!(moved == [ChangeVerb::Move], "got {:?}", moved);
            let main = store.changes_since("Main", 0)?;
            ensure!(main.first().map(|c| c.verb) == Some(ChangeVerb::Remove));
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_change_log_window() {
    let workspace = TestWorkspace::with_config(|config| config.changes.retention_secs = 86_400).unwrap();
    let clock = MockClock::default();
    let store = workspace.open_store(&clock);
    let start = clock.now();

    let force = SaveOptions {
        force_new_revision: true,
        ..SaveOptions::default()
    };
    let obj = topic("Main.Obj").unwrap();
    store.save_topic(&obj, &mut TopicObject::new("one"), "alice", &force).unwrap();
    clock.advance_hours(12);
    store.save_topic(&obj, &mut TopicObject::new("two"), "bob", &force).unwrap();

    let recent = store.changes_since("Main", start + 1).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].author, "bob");
    assert_eq!(recent[0].revision, 2);

    // The first record falls out of retention on the next append
    clock.advance_hours(20);
    store.save_topic(&obj, &mut TopicObject::new("three"), "carol", &force).unwrap();
    let authors: Vec<_> = store
        .changes_since("Main", 0)
        .unwrap()
        .into_iter()
        .map(|c| c.author)
        .collect();
    assert_eq!(authors, ["carol", "bob"]);
}

#[test]
fn test_leases() {
    let workspace = TestWorkspace::empty().unwrap();
    let clock = MockClock::default();
    let store = workspace.open_store(&clock);
    let obj = topic("Main.Obj").unwrap();

    assert_eq!(store.lease(&obj).unwrap(), None);
    let lease = store.set_lease(&obj, "alice").unwrap();
    assert_eq!(lease.taken, clock.now());

    // Visible to another store over the same directory
    let other = workspace.open_store(&clock);
    assert_eq!(other.lease(&obj).unwrap().map(|l| l.user), Some("alice".to_string()));
    assert!(other.clear_lease(&obj).unwrap());
    assert!(!store.clear_lease(&obj).unwrap());
}

#[test]
fn test_reclaim_after_interrupted_save() {
    let workspace = TestWorkspace::empty().unwrap();
    let clock = MockClock::default();
    let store = workspace.open_store(&clock);
    let obj = topic("Main.Obj").unwrap();
    store
        .save_topic(&obj, &mut TopicObject::new("only"), "alice", &SaveOptions::default())
        .unwrap();

    // A history file holding just revision 1, as an interrupted save leaves it
    let file = workspace.rcs_file(&store, &obj);
    store
        .engine()
        .backend()
        .check_in(&file, &vdoc_core::CheckIn::new("alice", "").dated(clock.now()))
        .unwrap();
    assert!(file.has_history());

    let report = store.reclaim(&ReclaimConfig::default(), None).unwrap();
    assert_eq!(report.redundant.len(), 1);
    assert_eq!(report.files_deleted, 0);

    let config = ReclaimConfig {
        delete: true,
        ..ReclaimConfig::default()
    };
    let report = store.reclaim(&config, None).unwrap();
    assert_eq!(report.files_deleted, 1);
    assert!(!file.has_history());

    let loaded = store.read_topic(&obj, None).unwrap().unwrap();
    assert_eq!((loaded.value.text(), loaded.version), ("only", 1));
}
