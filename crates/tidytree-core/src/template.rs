//! Destination templates for organization rules.
//!
//! A template such as `images/{year}/{month}` is parsed once into literal and
//! slot segments. Expansion yields the destination directory; the file keeps
//! its own name inside it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local};

use crate::error::TidyError;

/// A placeholder in a destination template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// File stem.
    Name,
    /// Extension without the dot, empty if none.
    Ext,
    /// Name of the containing directory.
    Parent,
    /// Four-digit modification year.
    Year,
    /// Zero-padded modification month.
    Month,
    /// Zero-padded modification day.
    Day,
}

impl Slot {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "ext" => Some(Self::Ext),
            "parent" => Some(Self::Parent),
            "year" => Some(Self::Year),
            "month" => Some(Self::Month),
            "day" => Some(Self::Day),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Ext => "ext",
            Self::Parent => "parent",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// A parsed destination template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Values substituted into a template for one file.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub name: String,
    pub ext: String,
    pub parent: String,
    pub modified: DateTime<Local>,
}

impl TemplateContext {
    /// Derive the slot values from a file path and its modification time.
    pub fn for_file(path: &Path, modified: SystemTime) -> Self {
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
        };
        Self {
            name: lossy(path.file_stem()),
            ext: lossy(path.extension()),
            parent: lossy(path.parent().and_then(Path::file_name)),
            modified: DateTime::<Local>::from(modified),
        }
    }
}

impl DestinationTemplate {
    /// Parse a template, rejecting unknown slots and unbalanced braces.
    pub fn parse(template: &str) -> Result<Self, TidyError> {
        let invalid = |message: String| TidyError::InvalidTemplate {
            template: template.to_string(),
            message,
        };

        if template.is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested '{'".to_string())),
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'".to_string()));
                    }
                    let slot = Slot::parse(&name)
                        .ok_or_else(|| invalid(format!("unknown placeholder {{{name}}}")))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The template text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Slots used by this template, in order of appearance.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(slot) => Some(*slot),
            Segment::Literal(_) => None,
        })
    }

    /// Expand into a path. Relative results are joined onto `base`.
    pub fn expand(&self, ctx: &TemplateContext, base: &Path) -> PathBuf {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(Slot::Name) => out.push_str(&ctx.name),
                Segment::Slot(Slot::Ext) => out.push_str(&ctx.ext),
                Segment::Slot(Slot::Parent) => out.push_str(&ctx.parent),
                Segment::Slot(Slot::Year) => out.push_str(&ctx.modified.year().to_string()),
                Segment::Slot(Slot::Month) => {
                    out.push_str(&format!("{:02}", ctx.modified.month()))
                }
                Segment::Slot(Slot::Day) => out.push_str(&format!("{:02}", ctx.modified.day())),
            }
        }
        let path = PathBuf::from(out);
        if path.is_absolute() {
            path
        } else {
            base.join(path)
        }
    }
}

impl fmt::Display for DestinationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Slot(slot) => write!(f, "{{{}}}", slot.as_str())?,
            }
        }
        Ok(())
    }
}
