//! Branch paths and branch state as reported by the terminology server.

use std::fmt;

use crate::error::ServiceError;

/// Root branch of every path.
pub const MAIN: &str = "MAIN";

/// A terminology server branch path such as `MAIN/PROJ/PROJ-12`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchPath(String);

impl BranchPath {
    /// Wraps a path, trimming surrounding whitespace and slashes.
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(path.as_ref().trim().trim_matches('/').to_string())
    }

    /// `MAIN/<project>`.
    #[must_use]
    pub fn for_project(project: &str) -> Self {
        Self(format!("{MAIN}/{project}"))
    }

    /// `MAIN/<project>/<task>`.
    #[must_use]
    pub fn for_task(project: &str, task: &str) -> Self {
        Self(format!("{MAIN}/{project}/{task}"))
    }

    /// The path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segment(&self, index: usize) -> Option<&str> {
        let mut parts = self.0.split('/');
        if parts.next() != Some(MAIN) {
            return None;
        }
        parts.nth(index).filter(|s| !s.is_empty())
    }

    /// Project segment, if the path is under `MAIN`.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.segment(0)
    }

    /// Task segment, if the path is a task branch.
    #[must_use]
    pub fn task(&self) -> Option<&str> {
        self.segment(1)
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Branch state relative to its parent.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchState {
    UpToDate,
    Forward,
    Behind,
    Diverged,
    Stale,
}

impl BranchState {
    /// Stable token used in notifications.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::UpToDate => "UP_TO_DATE",
            Self::Forward => "FORWARD",
            Self::Behind => "BEHIND",
            Self::Diverged => "DIVERGED",
            Self::Stale => "STALE",
        }
    }

    /// Parses a token as reported by the terminology server.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "UP_TO_DATE" => Some(Self::UpToDate),
            "FORWARD" => Some(Self::Forward),
            "BEHIND" => Some(Self::Behind),
            "DIVERGED" => Some(Self::Diverged),
            "STALE" => Some(Self::Stale),
            _ => None,
        }
    }
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Point-in-time view of a branch.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSnapshot {
    pub path: BranchPath,
    pub state: BranchState,
    /// Milliseconds since the epoch of the latest commit on the branch.
    pub head_timestamp: i64,
    /// Milliseconds since the epoch of the parent commit the branch is based on.
    pub base_timestamp: i64,
}

/// Fetches current branch state (the terminology server client).
pub trait BranchStateSource: Send + Sync {
    /// Returns the current snapshot of `path`.
    fn fetch_branch(&self, path: &BranchPath) -> Result<BranchSnapshot, ServiceError>;
}
