use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::{topic, TestWorkspace};
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::fs;
use std::time::Duration;
use vdoc_core::{CheckIn, Locator, SaveOptions, Store, TopicObject};

/// Executes scenarios against a real store
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    store: Option<Store>,
    clock: MockClock,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner over `workspace`
    pub fn new(workspace: TestWorkspace, clock: MockClock) -> Self {
        let store = workspace.open_store(&clock);
        Self {
            workspace,
            store: Some(store),
            clock,
            current_step: 0,
        }
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::SaveTopic {
                topic,
                text,
                author,
                force_new_revision,
            } => self.handle_save_topic(topic, text, author, *force_new_revision),
            ScenarioStep::SaveAttachment {
                topic,
                name,
                data,
                author,
            } => self.handle_save_attachment(topic, name, data, author),
            ScenarioStep::DeleteLatest { topic } => self.handle_delete_latest(topic),
            ScenarioStep::Move { from, to } => self.handle_move(from, to),

            ScenarioStep::EditPrimary { topic, text } => self.handle_edit_primary(topic, text),
            ScenarioStep::CheckInBehindStore { topic, text } => self.handle_check_in_behind(topic, text),

            ScenarioStep::Wait { duration } => {
                self.clock.advance(*duration);
                Ok(())
            }
            ScenarioStep::Reopen => {
                self.store = None;
                self.store = Some(self.workspace.open_store(&self.clock));
                Ok(())
            }

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or_else(|| anyhow!("store not open"))
    }

    // ===== Store operation handlers =====

    fn handle_save_topic(&self, name: &str, text: &str, author: &str, force_new_revision: bool) -> Result<()> {
        let store = self.store()?;
        let locator = topic(name)?;
        let options = SaveOptions {
            force_new_revision,
            ..SaveOptions::default()
        };
        store.save_topic(&locator, &mut TopicObject::new(text), author, &options)?;
        Ok(())
    }

    fn handle_save_attachment(&self, name: &str, attachment: &str, data: &[u8], author: &str) -> Result<()> {
        let store = self.store()?;
        let locator = topic(name)?.with_attachment(attachment)?;
        store.save_attachment(&locator, data, author, &SaveOptions::default())?;
        Ok(())
    }

    fn handle_delete_latest(&self, name: &str) -> Result<()> {
        self.store()?.delete_latest_revision(&topic(name)?, "scenario")?;
        Ok(())
    }

    fn handle_move(&self, from: &str, to: &str) -> Result<()> {
        self.store()?.move_object(&topic(from)?, &topic(to)?, "scenario")?;
        Ok(())
    }

    // ===== Out-of-band handlers =====

    /// Rewrites the text but keeps the embedded revision info, dated ahead
    /// of the history file
    fn handle_edit_primary(&self, name: &str, text: &str) -> Result<()> {
        let store = self.store()?;
        let file = self.workspace.rcs_file(store, &topic(name)?);
        let mut current = TopicObject::deserialize(&fs::read_to_string(&file.file)?);
        current.set_text(text);
        self.workspace
            .write_ahead(&file.file, current.serialize().as_bytes(), Duration::from_secs(10))
    }

    /// Writes new text and checks it in through the backend directly, the
    /// way another tool sharing the history files would
    fn handle_check_in_behind(&self, name: &str, text: &str) -> Result<()> {
        let store = self.store()?;
        let file = self.workspace.rcs_file(store, &topic(name)?);
        ensure!(file.has_history(), "{} has no history to advance", name);

        let mut current = TopicObject::deserialize(&fs::read_to_string(&file.file)?);
        current.set_text(text);
        fs::write(&file.file, current.serialize())?;
        let request = CheckIn::new("intruder", "external edit").dated(self.clock.now());
        store.engine().backend().check_in(&file, &request)?;
        Ok(())
    }

    // ===== Assertion handler =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        let store = self.store()?;
        match assertion {
            Assertion::LatestVersion { topic: name, version } => {
                let info = self.latest_info(store, &topic(name)?)?;
                ensure!(info == *version, "expected latest version {}, got {}", version, info);
            }
            Assertion::RevisionAuthor { topic: name, rev, author } => {
                let info = store
                    .revision_info(&topic(name)?, Some(*rev))?
                    .ok_or_else(|| anyhow!("{} does not exist", name))?;
                ensure!(info.author == *author, "expected author {:?}, got {:?}", author, info.author);
            }
            Assertion::RevisionComment { topic: name, rev, comment } => {
                let info = store
                    .revision_info(&topic(name)?, Some(*rev))?
                    .ok_or_else(|| anyhow!("{} does not exist", name))?;
                ensure!(info.comment == *comment, "expected comment {:?}, got {:?}", comment, info.comment);
            }
            Assertion::TopicText {
                topic: name,
                rev,
                text,
                served,
            } => {
                let loaded = store
                    .read_topic(&topic(name)?, *rev)?
                    .ok_or_else(|| anyhow!("{} does not exist", name))?;
                ensure!(loaded.value.text() == text, "expected {:?}, got {:?}", text, loaded.value.text());
                ensure!(loaded.version == *served, "expected r{} served, got r{}", served, loaded.version);
            }
            Assertion::AttachmentData {
                topic: name,
                name: attachment,
                rev,
                data,
                served,
            } => {
                let locator = topic(name)?.with_attachment(attachment)?;
                let loaded = store
                    .read_attachment(&locator, *rev)?
                    .ok_or_else(|| anyhow!("{} does not exist", locator))?;
                ensure!(loaded.value == *data, "attachment content differs");
                ensure!(loaded.version == *served, "expected r{} served, got r{}", served, loaded.version);
            }
            Assertion::HasHistory { topic: name } => {
                let path = self.workspace.history_path(store, &topic(name)?);
                ensure!(path.is_file(), "expected history file {}", path.display());
            }
            Assertion::NoHistory { topic: name } => {
                let path = self.workspace.history_path(store, &topic(name)?);
                if path.exists() {
                    bail!("unexpected history file {}", path.display());
                }
            }
            Assertion::HistoryHead { topic: name, head } => {
                let file = self.workspace.rcs_file(store, &topic(name)?);
                let actual = store.engine().backend().head_revision(&file)?;
                ensure!(actual == *head, "expected history head {}, got {}", head, actual);
            }
            Assertion::ChangeCount { namespace, count } => {
                let changes = store.changes_since(namespace, 0)?;
                ensure!(changes.len() == *count, "expected {} changes, got {}", count, changes.len());
            }
            Assertion::Custom(check) => check(store)?,
        }
        Ok(())
    }

    fn latest_info(&self, store: &Store, locator: &Locator) -> Result<u32> {
        Ok(store
            .revision_info(locator, None)?
            .ok_or_else(|| anyhow!("{} does not exist", locator))?
            .version)
    }
}
