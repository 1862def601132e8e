use std::fmt;
use std::str::FromStr;

/// Verdict from comparing live filesystem state to the last persisted manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Change {
    /// Recorded in the manifest but no longer present on disk.
    Removed,
    /// Present on disk but not recorded in the manifest.
    Added,
    /// Size, type or content differs from the recorded state.
    Changed,
    /// Only the modification time differs.
    TimestampChanged,
    #[default]
    NoChange,
    /// The entry could not be inspected; see its error messages.
    Failed,
}

impl Change {
    pub const ALL: [Change; 6] = [
        Change::Removed,
        Change::Added,
        Change::Changed,
        Change::TimestampChanged,
        Change::NoChange,
        Change::Failed,
    ];

    /// Whether an entry with this classification survives a manifest rewrite.
    ///
    /// `Failed` entries are dropped and come back as `Added` on the next run.
    pub fn is_persisted(self) -> bool {
        match self {
            Change::Added | Change::Changed | Change::TimestampChanged | Change::NoChange => true,
            Change::Removed | Change::Failed => false,
        }
    }

    /// Whether an entry with this classification forces its manifest to be rewritten.
    pub fn requires_write(self) -> bool {
        !matches!(self, Change::NoChange | Change::Failed)
    }

    /// Whether staged values replace persisted values at write time.
    pub fn applies_staged(self) -> bool {
        matches!(
            self,
            Change::Added | Change::Changed | Change::TimestampChanged
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Change::Removed => "removed",
            Change::Added => "added",
            Change::Changed => "changed",
            Change::TimestampChanged => "timestamp",
            Change::NoChange => "unchanged",
            Change::Failed => "failed",
        }
    }

    /// Short status code used in listings.
    pub fn code(self) -> &'static str {
        match self {
            Change::Removed => "R",
            Change::Added => "A",
            Change::Changed => "M",
            Change::TimestampChanged => "T",
            Change::NoChange => ".",
            Change::Failed => "!",
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown change filter: {0:?}")]
pub struct UnknownFilter(String);

/// Query filter over classifications, for consumers that list entries.
///
/// `Any` and `HasErrors` are never stored on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    Any,
    HasErrors,
    Only(Change),
}

impl ChangeFilter {
    pub fn matches(self, change: Change, error_count: usize) -> bool {
        match self {
            ChangeFilter::Any => true,
            ChangeFilter::HasErrors => error_count > 0,
            ChangeFilter::Only(Change::Changed) => {
                matches!(change, Change::Changed | Change::TimestampChanged)
            }
            ChangeFilter::Only(wanted) => change == wanted,
        }
    }
}

impl FromStr for ChangeFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "any" => Ok(ChangeFilter::Any),
            "errors" => Ok(ChangeFilter::HasErrors),
            other => Change::ALL
                .into_iter()
                .find(|c| c.as_str() == other)
                .map(ChangeFilter::Only)
                .ok_or_else(|| UnknownFilter(other.to_string())),
        }
    }
}
