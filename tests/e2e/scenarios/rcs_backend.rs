//! The same lifecycles against the external RCS tools. Skipped when they
//! are not installed.
//!
//! RCS refuses check-ins dated before the previous revision, and history
//! for attachments starts at the file's mtime, so these run on wall-clock
//! time.

use crate::harness::{MockClock, Scenario};
use vdoc_core::{BackendKind, RcsWrap};

fn rcs_scenario(name: &str) -> Option<Scenario> {
    if !RcsWrap::is_available() {
        eprintln!("skipping {}: rcs not installed", name);
        return None;
    }
    Some(
        Scenario::new(name)
            .with_clock(MockClock::new())
            .with_config(|config| config.history.backend = BackendKind::Rcs),
    )
}

#[test]
fn test_rcs_hello_world_lifecycle() {
    let Some(scenario) = rcs_scenario("rcs_hello_world") else {
        return;
    };
    scenario
        .saves("Main.Obj", "alice", "hello world")
        .saves("Main.Obj", "alice", "hello world 2")
        .assert_latest("Main.Obj", 1)
        .assert_no_history("Main.Obj")
        .wait_hours(1)
        .saves_new_revision("Main.Obj", "alice", "hello world 3")
        .assert_history_head("Main.Obj", 2)
        .assert_text_at("Main.Obj", 1, "hello world 2", 1)
        .assert_text("Main.Obj", "hello world 3", 2)
        .assert_text_at("Main.Obj", 9, "hello world 3", 2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_rcs_rollback() {
    let Some(scenario) = rcs_scenario("rcs_rollback") else {
        return;
    };
    scenario
        .saves_new_revision("Main.Obj", "alice", "a")
        .wait_hours(1)
        .saves_new_revision("Main.Obj", "alice", "b")
        .wait_hours(1)
        .saves_new_revision("Main.Obj", "alice", "c")
        .deletes_latest("Main.Obj")
        .assert_text("Main.Obj", "b", 2)
        .deletes_latest("Main.Obj")
        .assert_text("Main.Obj", "a", 1)
        .assert_no_history("Main.Obj")
        .run()
        .unwrap();
}

#[test]
fn test_rcs_attachment_revisions() {
    use crate::harness::Assertion;

    let Some(scenario) = rcs_scenario("rcs_attachments") else {
        return;
    };
    scenario
        .attaches("Main.Obj", "blob.bin", "alice", &[0, 159, 146, 150])
        .wait_hours(1)
        .attaches("Main.Obj", "blob.bin", "bob", &[1, 2, 3])
        .assert(Assertion::AttachmentData {
            topic: "Main.Obj".into(),
            name: "blob.bin".into(),
            rev: Some(1),
            data: vec![0, 159, 146, 150],
            served: 1,
        })
        .run()
        .unwrap();
}
