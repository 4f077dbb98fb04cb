use crate::harness::Scenario;

#[test]
fn test_hello_world_lifecycle() {
    Scenario::new("hello_world_lifecycle")
        .saves("Main.Obj", "alice", "hello world")
        .assert_latest("Main.Obj", 1)
        .assert_no_history("Main.Obj")
        .saves("Main.Obj", "alice", "hello world 2")
        .assert_latest("Main.Obj", 1)
        .assert_no_history("Main.Obj")
        .saves_new_revision("Main.Obj", "alice", "hello world 3")
        .assert_latest("Main.Obj", 2)
        .assert_history("Main.Obj")
        .assert_text_at("Main.Obj", 1, "hello world 2", 1)
        .assert_text_at("Main.Obj", 2, "hello world 3", 2)
        .assert_text("Main.Obj", "hello world 3", 2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_second_save_creates_history() {
    Scenario::new("second_save_creates_history")
        .saves("Main.Obj", "alice", "first")
        .assert_no_history("Main.Obj")
        .wait_hours(2)
        .saves("Main.Obj", "bob", "second")
        .assert_history_head("Main.Obj", 2)
        .assert_text_at("Main.Obj", 1, "first", 1)
        .assert_text("Main.Obj", "second", 2)
        .run()
        .unwrap();
}

#[test]
fn test_history_keeps_original_author() {
    use crate::harness::Assertion;

    Scenario::new("history_keeps_original_author")
        .saves("Main.Obj", "alice", "first")
        .wait_hours(2)
        .saves("Main.Obj", "bob", "second")
        .assert(Assertion::RevisionAuthor {
            topic: "Main.Obj".into(),
            rev: 1,
            author: "alice".into(),
        })
        .assert(Assertion::RevisionAuthor {
            topic: "Main.Obj".into(),
            rev: 2,
            author: "bob".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_identical_saves_do_not_advance() {
    Scenario::new("identical_saves_do_not_advance")
        .saves("Main.Obj", "alice", "same")
        .saves("Main.Obj", "alice", "same")
        .wait_hours(2)
        .saves("Main.Obj", "alice", "same")
        .saves("Main.Obj", "bob", "same")
        .assert_latest("Main.Obj", 1)
        .assert_no_history("Main.Obj")
        .assert_text("Main.Obj", "same", 1)
        .run()
        .unwrap();
}

#[test]
fn test_identical_attachment_saves_do_not_advance() {
    use crate::harness::Assertion;

    Scenario::new("identical_attachment_saves")
        .attaches("Main.Obj", "logo.png", "alice", b"\x89PNG\r\n")
        .wait_hours(2)
        .attaches("Main.Obj", "logo.png", "bob", b"\x89PNG\r\n")
        .assert_custom(|store| {
            let logo = crate::harness::topic("Main.Obj")?.with_attachment("logo.png")?;
            anyhow::ensure!(store.revision_history(&logo)? == [1]);
            Ok(())
        })
        .assert(Assertion::AttachmentData {
            topic: "Main.Obj".into(),
            name: "logo.png".into(),
            rev: None,
            data: b"\x89PNG\r\n".to_vec(),
            served: 1,
        })
        .run()
        .unwrap();
}
