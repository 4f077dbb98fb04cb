use super::assertions::Assertion;
use super::clock::MockClock;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::Result;
use std::time::Duration;
use vdoc_core::{Config, Store};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: Option<Box<dyn FnOnce(&mut Config)>>,
    clock: MockClock,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: None,
            clock: MockClock::default(),
            steps: Vec::new(),
        }
    }

    /// Adjust the store configuration before the first step
    pub fn with_config(mut self, tweak: impl FnOnce(&mut Config) + 'static) -> Self {
        self.config = Some(Box::new(tweak));
        self
    }

    /// Drive the store with `clock` instead of the fixed default
    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = clock;
        self
    }

    // ===== Store operations =====

    /// Save a topic, replacing the latest revision where the store allows
    pub fn saves(self, topic: &str, author: &str, text: &str) -> Self {
        self.push_save(topic, author, text, false)
    }

    /// Save a topic as a new revision
    pub fn saves_new_revision(self, topic: &str, author: &str, text: &str) -> Self {
        self.push_save(topic, author, text, true)
    }

    /// Save attachment content
    pub fn attaches(mut self, topic: &str, name: &str, author: &str, data: &[u8]) -> Self {
        self.steps.push(ScenarioStep::SaveAttachment {
            topic: topic.to_string(),
            name: name.to_string(),
            data: data.to_vec(),
            author: author.to_string(),
        });
        self
    }

    /// Roll back the latest revision
    pub fn deletes_latest(mut self, topic: &str) -> Self {
        self.steps.push(ScenarioStep::DeleteLatest {
            topic: topic.to_string(),
        });
        self
    }

    /// Move a topic with everything attached to it
    pub fn moves(mut self, from: &str, to: &str) -> Self {
        self.steps.push(ScenarioStep::Move {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    // ===== Out-of-band activity =====

    /// Rewrite a topic's primary file directly, leaving history alone
    pub fn edits_primary(mut self, topic: &str, text: &str) -> Self {
        self.steps.push(ScenarioStep::EditPrimary {
            topic: topic.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Check a new revision into history without going through the store
    pub fn checks_in_behind_store(mut self, topic: &str, text: &str) -> Self {
        self.steps.push(ScenarioStep::CheckInBehindStore {
            topic: topic.to_string(),
            text: text.to_string(),
        });
        self
    }

    // ===== Time control =====

    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    pub fn wait_hours(self, hours: u64) -> Self {
        self.wait(Duration::from_secs(hours * 3600))
    }

    // ===== Process lifecycle =====

    /// Drop the store and open a fresh one over the same directory
    pub fn reopen(mut self) -> Self {
        self.steps.push(ScenarioStep::Reopen);
        self
    }

    // ===== Assertions =====

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    pub fn assert_latest(self, topic: &str, version: u32) -> Self {
        self.assert(Assertion::LatestVersion {
            topic: topic.to_string(),
            version,
        })
    }

    /// Latest text and the version served for it
    pub fn assert_text(self, topic: &str, text: &str, served: u32) -> Self {
        self.assert(Assertion::TopicText {
            topic: topic.to_string(),
            rev: None,
            text: text.to_string(),
            served,
        })
    }

    /// Text served when asking for `rev`, and the version actually served
    pub fn assert_text_at(self, topic: &str, rev: u32, text: &str, served: u32) -> Self {
        self.assert(Assertion::TopicText {
            topic: topic.to_string(),
            rev: Some(rev),
            text: text.to_string(),
            served,
        })
    }

    pub fn assert_history(self, topic: &str) -> Self {
        self.assert(Assertion::HasHistory {
            topic: topic.to_string(),
        })
    }

    pub fn assert_no_history(self, topic: &str) -> Self {
        self.assert(Assertion::NoHistory {
            topic: topic.to_string(),
        })
    }

    pub fn assert_history_head(self, topic: &str, head: u32) -> Self {
        self.assert(Assertion::HistoryHead {
            topic: topic.to_string(),
            head,
        })
    }

    pub fn assert_custom(self, check: impl Fn(&Store) -> Result<()> + Send + Sync + 'static) -> Self {
        self.assert(Assertion::Custom(Box::new(check)))
    }

    fn push_save(mut self, topic: &str, author: &str, text: &str, force_new_revision: bool) -> Self {
        self.steps.push(ScenarioStep::SaveTopic {
            topic: topic.to_string(),
            text: text.to_string(),
            author: author.to_string(),
            force_new_revision,
        });
        self
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let workspace = match self.config {
            Some(tweak) => TestWorkspace::with_config(tweak),
            None => TestWorkspace::empty(),
        };
        let clock = self.clock;
        let mut runner = match workspace.map(|w| ScenarioRunner::new(w, clock)) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
