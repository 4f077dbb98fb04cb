use crate::harness::{Assertion, Scenario};

#[test]
fn test_rollback_to_first_revision() {
    Scenario::new("rollback_to_first")
        .saves_new_revision("Main.Obj", "alice", "a")
        .saves_new_revision("Main.Obj", "alice", "b")
        .saves_new_revision("Main.Obj", "alice", "c")
        .deletes_latest("Main.Obj")
        .assert_text("Main.Obj", "b", 2)
        .assert_history_head("Main.Obj", 2)
        .deletes_latest("Main.Obj")
        .assert_text("Main.Obj", "a", 1)
        .assert_no_history("Main.Obj")
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_rollback_refuses_initial_revision() {
    Scenario::new("rollback_initial")
        .saves("Main.Obj", "alice", "a")
        .assert_custom(|store| {
            let obj = crate::harness::topic("Main.Obj")?;
            let err = store.delete_latest_revision(&obj, "alice").unwrap_err();
            anyhow::ensure!(matches!(err, vdoc_core::StoreError::InitialRevision(_)), "got {:?}", err);
            Ok(())
        })
        .assert_text("Main.Obj", "a", 1)
        .run()
        .unwrap();
}

#[test]
fn test_rollback_discards_pending_edit() {
    Scenario::new("rollback_pending_edit")
        .saves_new_revision("Main.Obj", "alice", "a")
        .saves_new_revision("Main.Obj", "alice", "b")
        .edits_primary("Main.Obj", "rogue")
        .deletes_latest("Main.Obj")
        .assert_text("Main.Obj", "b", 2)
        .assert_history_head("Main.Obj", 2)
        .run()
        .unwrap();
}

#[test]
fn test_rollback_then_save_continues_numbering() {
    Scenario::new("rollback_then_save")
        .saves_new_revision("Main.Obj", "alice", "a")
        .saves_new_revision("Main.Obj", "alice", "b")
        .saves_new_revision("Main.Obj", "alice", "c")
        .deletes_latest("Main.Obj")
        .saves_new_revision("Main.Obj", "bob", "c2")
        .assert_text("Main.Obj", "c2", 3)
        .assert_text_at("Main.Obj", 2, "b", 2)
        .assert(Assertion::ChangeCount {
            namespace: "Main".into(),
            count: 5,
        })
        .run()
        .unwrap();
}
