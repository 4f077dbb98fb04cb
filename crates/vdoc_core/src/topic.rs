//! Topics: body text plus inline metadata records.
//!
//! A serialized topic is a block of `%META:NAME{key="value" ...}%` lines
//! followed by the body. The `TOPICINFO` record carries the embedded
//! revision info the store keeps in step with history.
//!
//! ```text
//! %META:TOPICINFO{author="alice" comment="typo" date="1700000000" format="1.1" version="3"}%
//! %META:TOPICPARENT{name="WebHome"}%
//! Body text starts here.
//! ```
//!
//! A body whose first line would itself parse as a record is preceded by an
//! empty `%META:BODY{}%` record, which ends the metadata block.

use serde::{Deserialize, Serialize};

const META_PREFIX: &str = "%META:";
const META_SUFFIX: &str = "}%";
const TOPICINFO: &str = "TOPICINFO";
const BODY_MARKER: &str = "%META:BODY{}%\n";
const BODY: &str = "BODY";
const FORMAT_VERSION: &str = "1.1";

/// Author recorded when the real author is not known.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Who changed an object, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Revision number, starting at 1.
    pub version: u32,
    /// Opaque author identity.
    pub author: String,
    /// Unix timestamp in seconds.
    pub date: i64,
    /// Check-in comment.
    pub comment: String,
}

impl RevisionInfo {
    /// Creates revision info with an empty comment.
    pub fn new(version: u32, author: impl Into<String>, date: i64) -> Self {
        Self {
            version,
            author: author.into(),
            date,
            comment: String::new(),
        }
    }
}

/// A `%META:NAME{...}%` record other than TOPICINFO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    /// Record type, e.g. `TOPICPARENT` or `FIELD`.
    pub name: String,
    /// Attributes in file order.
    pub attributes: Vec<(String, String)>,
}

impl MetaRecord {
    /// Creates a record from name and attribute pairs.
    pub fn new(name: impl Into<String>, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Looks up an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A topic with its metadata.
///
/// # Examples
///
/// ```
/// use vdoc_core::{RevisionInfo, TopicObject};
///
/// let mut topic = TopicObject::new("hello world");
/// topic.set_revision_info(RevisionInfo::new(1, "alice", 1_700_000_000));
///
/// let text = topic.serialize();
/// assert!(text.starts_with("%META:TOPICINFO{"));
///
/// let parsed = TopicObject::deserialize(&text);
/// assert_eq!(parsed, topic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicObject {
    info: Option<RevisionInfo>,
    meta: Vec<MetaRecord>,
    text: String,
}

impl TopicObject {
    /// Creates a topic with the given body and no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            info: None,
            meta: Vec::new(),
            text: text.into(),
        }
    }

    /// Body text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the body text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Embedded revision info, if the topic has been stamped.
    pub fn revision_info(&self) -> Option<&RevisionInfo> {
        self.info.as_ref()
    }

    /// Embedded version, if any.
    pub fn version(&self) -> Option<u32> {
        self.info.as_ref().map(|info| info.version)
    }

    /// Stamps the topic with revision info.
    pub fn set_revision_info(&mut self, info: RevisionInfo) {
        self.info = Some(info);
    }

    /// Overrides the embedded version number only.
    pub(crate) fn set_version(&mut self, version: u32) {
        match &mut self.info {
            Some(info) => info.version = version,
            None => self.info = Some(RevisionInfo::new(version, UNKNOWN_AUTHOR, 0)),
        }
    }

    /// True if body and metadata match, ignoring revision info.
    pub fn same_content(&self, other: &TopicObject) -> bool {
        self.text == other.text && self.meta == other.meta
    }

    /// Metadata records in file order.
    pub fn meta(&self) -> &[MetaRecord] {
        &self.meta
    }

    /// First metadata record with the given name.
    pub fn get_meta(&self, name: &str) -> Option<&MetaRecord> {
        self.meta.iter().find(|m| m.name == name)
    }

    /// Appends a metadata record. TOPICINFO records update the revision info.
    pub fn push_meta(&mut self, record: MetaRecord) {
        if record.name == TOPICINFO {
            self.info = parse_topicinfo(&record);
        } else {
            self.meta.push(record);
        }
    }

    /// Serializes to the on-disk text form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if let Some(info) = &self.info {
            let version = info.version.to_string();
            let date = info.date.to_string();
            let record = MetaRecord::new(
                TOPICINFO,
                &[
                    ("author", info.author.as_str()),
                    ("comment", info.comment.as_str()),
                    ("date", date.as_str()),
                    ("format", FORMAT_VERSION),
                    ("version", version.as_str()),
                ],
            );
            write_record(&mut out, &record);
        }
        for record in &self.meta {
            write_record(&mut out, record);
        }
        if split_record(&self.text).is_some() {
            out.push_str(BODY_MARKER);
        }
        out.push_str(&self.text);
        out
    }

    /// Parses the on-disk text form.
    ///
    /// Leading lines of the form `%META:NAME{...}%` become metadata; the
    /// remainder, byte for byte, becomes the body.
    pub fn deserialize(content: &str) -> Self {
        let mut topic = TopicObject::default();
        let text = leading_records(content, |record| topic.push_meta(record));
        topic.text = text.to_string();
        topic
    }

    /// Extracts only the embedded revision info from serialized content.
    pub fn embedded_info(content: &str) -> Option<RevisionInfo> {
        let mut info = None;
        leading_records(content, |record| {
            if record.name == TOPICINFO {
                info = parse_topicinfo(&record);
            }
        });
        info
    }
}

/// Feeds each leading record of `content` to `sink` and returns the body.
fn leading_records<'a>(content: &'a str, mut sink: impl FnMut(MetaRecord)) -> &'a str {
    let mut rest = content;
    while let Some((record, after)) = split_record(rest) {
        rest = after;
        if record.name == BODY && record.attributes.is_empty() {
            break;
        }
        sink(record);
    }
    rest
}

/// Splits off a first line that parses as a record.
fn split_record(text: &str) -> Option<(MetaRecord, &str)> {
    let end = text.find('\n')?;
    let record = parse_record(&text[..end])?;
    Some((record, &text[end + 1..]))
}

fn write_record(out: &mut String, record: &MetaRecord) {
    out.push_str(META_PREFIX);
    out.push_str(&record.name);
    out.push('{');
    for (i, (key, value)) in record.attributes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&encode_value(value));
        out.push('"');
    }
    out.push_str(META_SUFFIX);
    out.push('\n');
}

fn parse_record(line: &str) -> Option<MetaRecord> {
    let inner = line.strip_prefix(META_PREFIX)?.strip_suffix(META_SUFFIX)?;
    let brace = inner.find('{')?;
    let name = &inner[..brace];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let mut attributes = Vec::new();
    let mut rest = inner[brace + 1..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find("=\"")?;
        let key = rest[..eq].trim();
        let after = &rest[eq + 2..];
        let close = after.find('"')?;
        attributes.push((key.to_string(), decode_value(&after[..close])));
        rest = after[close + 1..].trim_start();
    }

    Some(MetaRecord {
        name: name.to_string(),
        attributes,
    })
}

fn parse_topicinfo(record: &MetaRecord) -> Option<RevisionInfo> {
    let raw = record.get("version")?;
    // Older files carry RCS-style "1.N" numbers
    let version = raw.rsplit('.').next()?.parse().ok()?;
    Some(RevisionInfo {
        version,
        author: record.get("author").unwrap_or(UNKNOWN_AUTHOR).to_string(),
        date: record.get("date").and_then(|d| d.parse().ok()).unwrap_or(0),
        comment: record.get("comment").unwrap_or_default().to_string(),
    })
}

fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' | '"' | '\r' | '\n' | '{' | '}' => out.push_str(&format!("%{:02x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

fn decode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest
            .get(pos + 1..pos + 3)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match code {
            Some(byte) => {
                out.push(byte as char);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
