use std::time::Duration;

use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Store operations
    SaveTopic {
        topic: String,
        text: String,
        author: String,
        force_new_revision: bool,
    },
    SaveAttachment {
        topic: String,
        name: String,
        data: Vec<u8>,
        author: String,
    },
    DeleteLatest {
        topic: String,
    },
    Move {
        from: String,
        to: String,
    },

    // Out-of-band activity
    EditPrimary {
        topic: String,
        text: String,
    },
    CheckInBehindStore {
        topic: String,
        text: String,
    },

    // Time control
    Wait {
        duration: Duration,
    },

    // Process lifecycle
    Reopen,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
