//! Changed-line filtering for review of a patch rather than a whole tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Added or modified lines per file, taken from a unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedLines {
    files: BTreeMap<String, BTreeSet<usize>>,
}

impl ChangedLines {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let patch = fs::read_to_string(path)
            .map_err(|e| ConfigError::file_read_error(path, e.to_string()))?;
        Ok(Self::parse(&patch))
    }

    /// Reads `+++` headers and `@@` hunks. Deleted files and context lines
    /// contribute nothing. Header prefixes count only between hunks, so an
    /// added line that itself starts with `++ ` stays part of its hunk.
    pub fn parse(patch: &str) -> Self {
        let mut files: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut hunk: Option<Hunk> = None;

        for raw in patch.lines() {
            if let Some(open) = hunk.as_mut().filter(|h| h.is_open()) {
                match raw.as_bytes().first() {
                    Some(b'+') => {
                        if let Some(file) = &current {
                            files.entry(file.clone()).or_default().insert(open.line);
                        }
                        open.line += 1;
                        open.new_left = open.new_left.saturating_sub(1);
                    }
                    Some(b'-') => open.old_left = open.old_left.saturating_sub(1),
                    Some(b'\\') => {}
                    _ => {
                        open.line += 1;
                        open.old_left = open.old_left.saturating_sub(1);
                        open.new_left = open.new_left.saturating_sub(1);
                    }
                }
                continue;
            }

            if let Some(target) = raw.strip_prefix("+++ ") {
                let target = target.split('\t').next().unwrap_or(target).trim();
                current = match target {
                    "/dev/null" => None,
                    t => Some(t.strip_prefix("b/").unwrap_or(t).to_string()),
                };
                if let Some(file) = &current {
                    files.entry(file.clone()).or_default();
                }
                continue;
            }
            if raw.starts_with("--- ") || raw.starts_with("diff ") || raw.starts_with("index ") {
                continue;
            }
            if let Some(header) = raw.strip_prefix("@@ ") {
                hunk = Hunk::parse(header);
            }
        }
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Whether `line` of `file` was added. Paths match when one is a
    /// component-wise suffix of the other, so absolute scan paths line up
    /// with repository-relative diff paths.
    pub fn contains(&self, file: &str, line: usize) -> bool {
        self.lines_for(file)
            .map(|lines| lines.contains(&line))
            .unwrap_or(false)
    }

    pub fn touches(&self, file: &str) -> bool {
        self.lines_for(file).is_some()
    }

    fn lines_for(&self, file: &str) -> Option<&BTreeSet<usize>> {
        let file = normalize(file);
        self.files
            .iter()
            .find(|(changed, _)| same_file(&file, changed))
            .map(|(_, lines)| lines)
    }
}

/// Position inside one `@@` hunk: the next new-file line and how many old
/// and new lines the hunk still has to consume.
#[derive(Debug, Clone, Copy)]
struct Hunk {
    line: usize,
    old_left: usize,
    new_left: usize,
}

impl Hunk {
    /// Parses `-a,b +c,d @@`; an omitted count means one line.
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split_whitespace();
        let (_, old_left) = range(parts.next()?.strip_prefix('-')?)?;
        let (line, new_left) = range(parts.next()?.strip_prefix('+')?)?;
        Some(Self {
            line,
            old_left,
            new_left,
        })
    }

    fn is_open(&self) -> bool {
        self.old_left > 0 || self.new_left > 0
    }
}

fn range(spec: &str) -> Option<(usize, usize)> {
    match spec.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((spec.parse().ok()?, 1)),
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn same_file(a: &str, b: &str) -> bool {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    long == short || long.ends_with(&format!("/{short}"))
}
