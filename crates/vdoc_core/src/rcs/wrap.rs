//! Backend driving the external RCS tools (`rcs`, `ci`, `co`, `rlog`).
//!
//! Revision numbers map to RCS trunk numbers: revision N is `1.N`.

use super::command::{CommandSet, CommandTemplate};
use super::{CheckIn, RcsFile, RevisionControl};
use crate::error::{Result, StoreError};
use crate::fsutil::{set_mode, write_atomic};
use crate::topic::RevisionInfo;
use chrono::{DateTime, NaiveDateTime};
use std::process::{Command, Output};
use std::time::Duration;
use tracing::debug;

/// Log message RCS records when none is given.
const EMPTY_LOG: &str = "*** empty log message ***";

/// Backend that shells out to RCS through configurable command templates.
pub struct RcsWrap {
    commands: CommandSet,
    stale: Duration,
    file_mode: Option<u32>,
}

impl RcsWrap {
    /// Creates a backend using `commands`.
    pub fn new(commands: CommandSet, stale: Duration) -> Self {
        Self {
            commands,
            stale,
            file_mode: None,
        }
    }

    /// Permission bits restored on the primary file after `ci -u` leaves it
    /// read-only.
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    /// Check if the RCS tools are available.
    pub fn is_available() -> bool {
        Command::new("rcs")
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, template: &CommandTemplate, file: &RcsFile, extra: &[(&str, &str)]) -> Result<Output> {
        let filename = file.file.to_string_lossy();
        let history = file.history.to_string_lossy();
        let mut vars = vec![("FILENAME", filename.as_ref()), ("HISTORY", history.as_ref())];
        vars.extend_from_slice(extra);

        let describe = template.describe(&vars);
        debug!(command = %describe, "running rcs command");

        let output = template.command(&vars).output().map_err(|e| StoreError::Backend {
            command: describe.clone(),
            status: "spawn failed".to_string(),
            stdout: String::new(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(StoreError::Backend {
                command: describe,
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }

    fn run_text(&self, template: &CommandTemplate, file: &RcsFile, extra: &[(&str, &str)]) -> Result<String> {
        let output = self.run(template, file, extra)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn clamp(&self, file: &RcsFile, rev: u32) -> Result<u32> {
        Ok(rev.clamp(1, self.head_revision(file)?))
    }
}

impl RevisionControl for RcsWrap {
    fn name(&self) -> &'static str {
        "rcs"
    }

    fn stale_after(&self) -> Duration {
        self.stale
    }

    fn try_lock(&self, file: &RcsFile) -> Result<()> {
        self.run(&self.commands.lock, file, &[]).map(drop)
    }

    fn unlock(&self, file: &RcsFile) -> Result<()> {
        self.run(&self.commands.unlock, file, &[]).map(drop)
    }

    fn break_lock(&self, file: &RcsFile) -> Result<()> {
        self.run(&self.commands.break_lock, file, &[]).map(drop)
    }

    fn check_in(&self, file: &RcsFile, request: &CheckIn) -> Result<Option<u32>> {
        if !file.has_history() {
            let init = if file.binary {
                &self.commands.init_binary
            } else {
                &self.commands.init_text
            };
            self.run(init, file, &[])?;
        }
        self.lock(file)?;

        let comment = if request.comment.is_empty() {
            EMPTY_LOG
        } else {
            request.comment.as_str()
        };
        let output = match request.date {
            Some(date) => {
                let date = format_rcs_date(date);
                self.run(
                    &self.commands.check_in_dated,
                    file,
                    &[("USERNAME", &request.author), ("COMMENT", comment), ("DATE", &date)],
                )?
            }
            None => self.run(
                &self.commands.check_in,
                file,
                &[("USERNAME", &request.author), ("COMMENT", comment)],
            )?,
        };
        set_mode(&file.file, self.file_mode)?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_reverted(&text))
    }

    fn check_out(&self, file: &RcsFile, rev: u32) -> Result<Option<(Vec<u8>, u32)>> {
        if !file.has_history() {
            return Ok(None);
        }
        let resolved = self.clamp(file, rev)?;
        let revision = format!("1.{}", resolved);
        let output = self.run(&self.commands.check_out, file, &[("REVISION", &revision)])?;
        Ok(Some((output.stdout, resolved)))
    }

    fn head_revision(&self, file: &RcsFile) -> Result<u32> {
        if !file.has_history() {
            return Ok(1);
        }
        let log = self.run_text(&self.commands.head, file, &[])?;
        Ok(parse_head(&log).unwrap_or(1))
    }

    fn delete_revision(&self, file: &RcsFile, rev: u32) -> Result<()> {
        // The lock may legitimately be absent
        if let Err(e) = self.unlock(file) {
            debug!("unlock before delete failed: {}", e);
        }
        let revision = format!("1.{}", rev);
        self.run(&self.commands.delete_revision, file, &[("REVISION", &revision)])?;

        if let Some((content, _)) = self.check_out(file, u32::MAX)? {
            write_atomic(&file.file, &content, self.file_mode)?;
        }
        Ok(())
    }

    fn revision_at_date(&self, file: &RcsFile, date: i64) -> Result<Option<u32>> {
        if !file.has_history() {
            return Ok(None);
        }
        let date = format_rcs_date(date);
        let log = self.run_text(&self.commands.at_date, file, &[("DATE", &date)])?;
        Ok(parse_log_entries(&log).first().map(|info| info.version))
    }

    fn revision_info(&self, file: &RcsFile, rev: u32) -> Result<Option<RevisionInfo>> {
        if !file.has_history() {
            return Ok(None);
        }
        let revision = format!("1.{}", self.clamp(file, rev)?);
        let log = self.run_text(&self.commands.info, file, &[("REVISION", &revision)])?;
        Ok(parse_log_entries(&log).into_iter().next())
    }
}

/// Formats unix seconds the way `ci -d` and `rlog -d` expect (UTC).
fn format_rcs_date(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y/%m/%d %H:%M:%S")
        .to_string()
}

/// Parses `2024/01/02 03:04:05` or `2024-01-02 03:04:05+00` (UTC).
fn parse_rcs_date(text: &str) -> Option<i64> {
    let (date, time) = text.trim().split_once(' ')?;
    let date = date.replace('-', "/");
    let time = time.get(..8)?;
    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y/%m/%d %H:%M:%S").ok()?;
    Some(naive.and_utc().timestamp())
}

fn parse_trunk(revision: &str) -> Option<u32> {
    revision.trim().rsplit('.').next()?.parse().ok()
}

fn parse_head(log: &str) -> Option<u32> {
    log.lines()
        .find_map(|line| line.strip_prefix("head:"))
        .and_then(parse_trunk)
}

fn parse_reverted(output: &str) -> Option<u32> {
    const MARKER: &str = "reverting to previous revision ";
    let start = output.find(MARKER)? + MARKER.len();
    let revision: String = output[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_trunk(&revision)
}

/// Parses the revision entries of `rlog` output, newest first.
fn parse_log_entries(log: &str) -> Vec<RevisionInfo> {
    let mut entries = Vec::new();
    let mut lines = log.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(version) = line.strip_prefix("revision ").and_then(|r| {
            // "revision 1.3\tlocked by: www;"
            parse_trunk(r.split_whitespace().next().unwrap_or_default())
        }) else {
            continue;
        };

        let mut info = RevisionInfo::new(version, crate::topic::UNKNOWN_AUTHOR, 0);
        if let Some(meta) = lines.next() {
            for field in meta.split(';') {
                let field = field.trim();
                if let Some(date) = field.strip_prefix("date:") {
                    info.date = parse_rcs_date(date).unwrap_or(0);
                } else if let Some(author) = field.strip_prefix("author:") {
                    info.author = author.trim().to_string();
                }
            }
        }

        let mut comment = Vec::new();
        while let Some(next) = lines.peek() {
            if next.starts_with("----------------------------") || next.starts_with("============") {
                break;
            }
            comment.push(*next);
            lines.next();
        }
        let comment = comment.join("\n");
        info.comment = if comment == EMPTY_LOG { String::new() } else { comment };
        entries.push(info);
    }
    entries
}
