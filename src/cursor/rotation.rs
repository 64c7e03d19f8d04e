//! Directory-snapshot cursor over pcap-log rotation files.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, trace};

use super::{CursorStep, FileCursor};
use crate::error::CursorError;

/// Compiled rotation file name pattern.
///
/// `%n` is the thread number, `%i` the thread id and `%t` the rotation
/// timestamp (`secs` or `secs.usecs`). Everything else is literal. A trailing
/// `.gz` is accepted on any name.
#[derive(Debug, Clone)]
pub struct FileFormat {
    pattern: String,
    re: Regex,
}

/// What a file name tells us about its place in the rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RotationName {
    timestamp: Option<Duration>,
    thread: (Option<u64>, Option<u64>),
}

impl FileFormat {
    pub fn parse(pattern: &str) -> Result<Self, CursorError> {
        if pattern.is_empty() || pattern.contains('/') {
            return Err(CursorError::InvalidFormat(pattern.to_string()));
        }

        let mut re = String::from("^");
        let mut literal = String::new();
        let mut seen = (false, false, false);
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            re.push_str(&regex::escape(&literal));
            literal.clear();

            let (group, seen_flag) = match chars.next() {
                Some('n') => (r"(?P<n>\d+)", &mut seen.0),
                Some('i') => (r"(?P<i>\d+)", &mut seen.1),
                Some('t') => (r"(?P<t>\d+(?:\.\d+)?)", &mut seen.2),
                _ => return Err(CursorError::InvalidFormat(pattern.to_string())),
            };
            // Each token may appear once: it becomes a named group.
            if *seen_flag {
                return Err(CursorError::InvalidFormat(pattern.to_string()));
            }
            *seen_flag = true;
            re.push_str(group);
        }
        re.push_str(&regex::escape(&literal));
        re.push_str(r"(?:\.gz)?$");

        let re = Regex::new(&re).map_err(|_| CursorError::InvalidFormat(pattern.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            re,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn rotation_name(&self, name: &str) -> Option<RotationName> {
        let caps = self.re.captures(name)?;
        let number = |group: &str| caps.name(group).and_then(|m| m.as_str().parse().ok());

        Some(RotationName {
            timestamp: caps.name("t").and_then(|m| parse_timestamp(m.as_str())),
            thread: (number("n"), number("i")),
        })
    }
}

/// `secs` or `secs.frac`, the fraction read as a decimal part of a second.
fn parse_timestamp(text: &str) -> Option<Duration> {
    let (secs, frac) = match text.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (text, ""),
    };
    let secs: u64 = secs.parse().ok()?;

    let digits: String = frac.chars().take(9).collect();
    let nanos = if digits.is_empty() {
        0
    } else {
        let scale = 10u32.pow(9 - digits.len() as u32);
        digits.parse::<u32>().ok()? * scale
    };
    Some(Duration::new(secs, nanos))
}

/// Cursor over a snapshot of the capture directory.
///
/// The directory is listed once, at construction. Files written afterwards
/// are never yielded, so a cold start over a growing rotation still ends.
#[derive(Debug)]
pub struct RotationCursor {
    files: VecDeque<PathBuf>,
}

impl RotationCursor {
    /// Snapshot `dir` and position the cursor at `start`.
    ///
    /// With a starting file only files from the same thread, from that file
    /// onward, are yielded. A starting file missing from the listing leaves
    /// the cursor exhausted.
    pub fn new(dir: &Path, start: Option<&Path>, format: &FileFormat) -> Result<Self, CursorError> {
        let mut listing = list_rotation(dir, format)?;
        listing.sort_by(|a, b| (a.0.timestamp, &a.1).cmp(&(b.0.timestamp, &b.1)));

        let files: VecDeque<PathBuf> = match start.and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
            None => listing.into_iter().map(|(_, name)| dir.join(name)).collect(),
            Some(start_name) => match listing.iter().position(|(_, name)| name == start_name) {
                None => {
                    debug!("Starting file {} is not part of the rotation", start_name);
                    VecDeque::new()
                }
                Some(pos) => {
                    let thread = listing[pos].0.thread;
                    listing
                        .into_iter()
                        .skip(pos)
                        .filter(|(rotation, _)| rotation.thread == thread)
                        .map(|(_, name)| dir.join(name))
                        .collect()
                }
            },
        };

        debug!("{} rotation file(s) to walk in {}", files.len(), dir.display());
        Ok(Self { files })
    }
}

impl FileCursor for RotationCursor {
    fn next_file(&mut self) -> Result<CursorStep, CursorError> {
        Ok(match self.files.pop_front() {
            Some(path) => CursorStep::File(path),
            None => CursorStep::Exhausted,
        })
    }
}

fn list_rotation(dir: &Path, format: &FileFormat) -> Result<Vec<(RotationName, String)>, CursorError> {
    let entries = fs::read_dir(dir).map_err(|source| CursorError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut listing = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        match format.rotation_name(&name) {
            Some(rotation) => listing.push((rotation, name)),
            None => trace!("Ignoring {} (does not match {})", name, format.pattern()),
        }
    }
    Ok(listing)
}
