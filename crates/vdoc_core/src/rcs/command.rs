//! Structured command descriptors for the RCS backend.

use serde::{Deserialize, Serialize};
use std::process::Command;

/// A program plus argument templates.
///
/// Placeholders (`%FILENAME%`, `%HISTORY%`, `%REVISION%`, `%USERNAME%`,
/// `%COMMENT%`, `%DATE%`) are replaced inside each argument separately. The
/// result is passed to the program as an argument vector, never through a
/// shell, so substituted values cannot inject extra arguments.
///
/// # Examples
///
/// ```
/// use vdoc_core::CommandTemplate;
///
/// let ci = CommandTemplate::new("ci", &["-m%COMMENT%", "%FILENAME%"]);
/// let args = ci.render(&[("COMMENT", "fix; rm -rf /"), ("FILENAME", "a b.txt")]);
/// assert_eq!(args, ["-mfix; rm -rf /", "a b.txt"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Program name or path.
    pub program: String,
    /// Argument templates.
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Creates a template.
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitutes `vars` (name without percent signs, value) into every
    /// argument in a single pass. Substituted values are never rescanned;
    /// unknown placeholders are kept as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| substitute(arg, vars)).collect()
    }

    /// Builds a ready-to-run command.
    pub fn command(&self, vars: &[(&str, &str)]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.render(vars));
        cmd
    }

    /// Human-readable command line for diagnostics.
    pub fn describe(&self, vars: &[(&str, &str)]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.render(vars));
        parts.join(" ")
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after
            .find('%')
            .and_then(|end| vars.iter().find(|(name, _)| *name == &after[..end]).map(|(_, v)| (end, *v)));
        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Command templates for every RCS operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSet {
    /// Create an empty history file for text content.
    pub init_text: CommandTemplate,
    /// Create an empty history file for binary content.
    pub init_binary: CommandTemplate,
    /// Set the history lock.
    pub lock: CommandTemplate,
    /// Release the history lock.
    pub unlock: CommandTemplate,
    /// Break a lock held by anyone.
    pub break_lock: CommandTemplate,
    /// Check in, dated now.
    pub check_in: CommandTemplate,
    /// Check in with an explicit date.
    pub check_in_dated: CommandTemplate,
    /// Print a revision to stdout.
    pub check_out: CommandTemplate,
    /// Print the history header.
    pub head: CommandTemplate,
    /// Print the log entry of one revision.
    pub info: CommandTemplate,
    /// Print the latest revision at or before a date.
    pub at_date: CommandTemplate,
    /// Remove a revision.
    pub delete_revision: CommandTemplate,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            init_text: CommandTemplate::new("rcs", &["-q", "-i", "-t-none", "-ko", "%FILENAME%", "%HISTORY%"]),
            init_binary: CommandTemplate::new("rcs", &["-q", "-i", "-t-none", "-kb", "%FILENAME%", "%HISTORY%"]),
            lock: CommandTemplate::new("rcs", &["-q", "-l", "%FILENAME%", "%HISTORY%"]),
            unlock: CommandTemplate::new("rcs", &["-q", "-u", "%FILENAME%", "%HISTORY%"]),
            break_lock: CommandTemplate::new("rcs", &["-q", "-M", "-u", "%FILENAME%", "%HISTORY%"]),
            check_in: CommandTemplate::new(
                "ci",
                &["-m%COMMENT%", "-t-none", "-w%USERNAME%", "-u", "%FILENAME%", "%HISTORY%"],
            ),
            check_in_dated: CommandTemplate::new(
                "ci",
                &["-m%COMMENT%", "-t-none", "-d%DATE%", "-w%USERNAME%", "-u", "%FILENAME%", "%HISTORY%"],
            ),
            check_out: CommandTemplate::new("co", &["-q", "-p%REVISION%", "-ko", "%FILENAME%", "%HISTORY%"]),
            head: CommandTemplate::new("rlog", &["-h", "%FILENAME%", "%HISTORY%"]),
            info: CommandTemplate::new("rlog", &["-r%REVISION%", "%FILENAME%", "%HISTORY%"]),
            at_date: CommandTemplate::new("rlog", &["-d%DATE%", "%FILENAME%", "%HISTORY%"]),
            delete_revision: CommandTemplate::new("rcs", &["-q", "-o%REVISION%", "%FILENAME%", "%HISTORY%"]),
        }
    }
}
