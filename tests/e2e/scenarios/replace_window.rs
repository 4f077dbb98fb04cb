use crate::harness::Scenario;

#[test]
fn test_same_author_replaces_within_window() {
    Scenario::new("same_author_replaces")
        .saves("Main.Obj", "alice", "draft")
        .wait(std::time::Duration::from_secs(600))
        .saves("Main.Obj", "alice", "draft, polished")
        .assert_latest("Main.Obj", 1)
        .assert_no_history("Main.Obj")
        .saves("Main.Obj", "bob", "review")
        .assert_latest("Main.Obj", 2)
        .saves("Main.Obj", "bob", "review, amended")
        .assert_latest("Main.Obj", 2)
        .assert_history_head("Main.Obj", 2)
        .assert_text_at("Main.Obj", 1, "draft, polished", 1)
        .assert_text("Main.Obj", "review, amended", 2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_window_expiry_starts_new_revision() {
    Scenario::new("window_expiry")
        .saves("Main.Obj", "alice", "one")
        .wait_hours(2)
        .saves("Main.Obj", "alice", "two")
        .assert_latest("Main.Obj", 2)
        .assert_text_at("Main.Obj", 1, "one", 1)
        .run()
        .unwrap();
}

#[test]
fn test_zero_window_always_adds_revisions() {
    Scenario::new("zero_window")
        .with_config(|config| config.history.replace_window_secs = 0)
        .saves("Main.Obj", "alice", "one")
        .saves("Main.Obj", "alice", "two")
        .saves("Main.Obj", "alice", "three")
        .assert_latest("Main.Obj", 3)
        .run()
        .unwrap();
}
