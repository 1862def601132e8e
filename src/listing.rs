//! Human readable listing of scanned entries.

use crate::change::{Change, ChangeFilter};
use crate::entry::{DirEntry, FileEntry, SpecialEntry};
use crate::visit::Visitor;
use std::path::Path;

/// Collects one line per matching entry, plus indented detail lines for
/// changed files and error messages.
pub struct Listing<'a> {
    root: &'a Path,
    /// `None` lists everything that changed or carries errors.
    filter: Option<ChangeFilter>,
    lines: Vec<String>,
}

impl<'a> Listing<'a> {
    pub fn new(root: &'a Path, filter: Option<ChangeFilter>) -> Self {
        Listing {
            root,
            filter,
            lines: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn print(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
    }

    fn wants(&self, change: Change, errors: &[String]) -> bool {
        match self.filter {
            Some(filter) => filter.matches(change, errors.len()),
            None => change != Change::NoChange || !errors.is_empty(),
        }
    }

    fn push_entry(&mut self, change: Change, path: &Path, suffix: &str) {
        let display = path.strip_prefix(self.root).unwrap_or(path);
        self.lines
            .push(format!("{:<2} {}{}", change.code(), display.display(), suffix));
    }

    fn push_errors(&mut self, errors: &[String]) {
        for error in errors {
            self.lines.push(format!("   error: {}", error));
        }
    }
}

impl Visitor for Listing<'_> {
    fn file(&mut self, file: &FileEntry) {
        if !self.wants(file.change, &file.errors) {
            return;
        }
        self.push_entry(file.change, &file.path, "");
        self.lines.extend(file_details(file));
        self.push_errors(&file.errors);
    }

    fn special(&mut self, special: &SpecialEntry) {
        if !self.wants(special.change, &special.errors) {
            return;
        }
        self.push_entry(special.change, &special.path, "");
        match special.change {
            Change::Added => self
                .lines
                .push(format!("   type: {}", special.staged.kind)),
            Change::Changed if special.kind != special.staged.kind => self.lines.push(format!(
                "   type: {} -> {}",
                special.kind, special.staged.kind
            )),
            _ => {}
        }
        self.push_errors(&special.errors);
    }

    fn dir(&mut self, dir: &DirEntry) {
        if !self.wants(dir.change, &dir.errors) {
            return;
        }
        self.push_entry(dir.change, &dir.path, "/");
        self.push_errors(&dir.errors);
    }
}

fn file_details(file: &FileEntry) -> Vec<String> {
    let staged = &file.staged;
    let mut lines = Vec::new();

    match file.change {
        Change::Added => {
            let mut line = format!("   size: {}", format_size(staged.size));
            if !staged.digest.is_empty() {
                line.push_str(&format!(
                    ", {}: {}",
                    staged.algorithm,
                    truncate_digest(&staged.digest)
                ));
            }
            lines.push(line);
        }
        Change::Changed | Change::TimestampChanged => {
            if file.size != staged.size {
                lines.push(format!(
                    "   size: {} -> {}",
                    format_size(file.size),
                    format_size(staged.size)
                ));
            }
            if file.mtime_nanos != staged.mtime_nanos {
                lines.push(format!(
                    "   mtime: {} -> {}",
                    format_mtime(file.mtime_nanos),
                    format_mtime(staged.mtime_nanos)
                ));
            }
            if !staged.digest.is_empty()
                && (file.digest != staged.digest || file.algorithm != staged.algorithm)
            {
                lines.push(format!(
                    "   digest: {}:{} -> {}:{}",
                    file.algorithm,
                    truncate_digest(&file.digest),
                    staged.algorithm,
                    truncate_digest(&staged.digest)
                ));
            }
        }
        Change::Removed => lines.push(format!(
            "   was: {}, {}: {}",
            format_size(file.size),
            file.algorithm,
            truncate_digest(&file.digest)
        )),
        Change::NoChange | Change::Failed => {}
    }

    lines
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_mtime(nanos: u64) -> String {
    let seconds = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;

    match chrono::DateTime::from_timestamp(seconds, subsec) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string(),
        None => format!("{} ns", nanos),
    }
}

fn truncate_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
