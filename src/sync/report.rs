// reddit-transfer/src/sync/report.rs
use std::fmt;

use crate::config::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Remove,
    Add,
    Write,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Remove => "remove",
            Action::Add => "add",
            Action::Write => "write",
        })
    }
}

/// One item that could not be transferred, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: String,
    pub action: Action,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    Completed,
    Skipped,
    /// The pass stopped before writing anything further, e.g. a listing failed.
    Aborted(String),
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub kind: ResourceKind,
    pub removed: usize,
    pub added: usize,
    pub unchanged: usize,
    pub failures: Vec<ItemFailure>,
    pub status: PassStatus,
}

impl PassReport {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            removed: 0,
            added: 0,
            unchanged: 0,
            failures: Vec::new(),
            status: PassStatus::Completed,
        }
    }

    pub fn skipped(kind: ResourceKind) -> Self {
        Self {
            status: PassStatus::Skipped,
            ..Self::new(kind)
        }
    }

    pub fn fail(&mut self, item: impl fmt::Display, action: Action, reason: impl fmt::Display) {
        self.failures.push(ItemFailure {
            item: item.to_string(),
            action,
            reason: reason.to_string(),
        });
    }

    pub fn abort(mut self, reason: impl Into<String>) -> Self {
        self.status = PassStatus::Aborted(reason.into());
        self
    }

    pub fn interrupted(mut self) -> Self {
        self.status = PassStatus::Interrupted;
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.status == PassStatus::Interrupted
    }
}

/// Outcome of a whole run, printed once at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub passes: Vec<PassReport>,
}

impl SyncSummary {
    pub fn interrupted(&self) -> bool {
        self.passes.iter().any(PassReport::is_interrupted)
    }

    pub fn total_failures(&self) -> usize {
        self.passes.iter().map(|p| p.failures.len()).sum()
    }

    pub fn pass(&self, kind: ResourceKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.kind == kind)
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.dry_run { " (dry run, nothing written)" } else { "" };
        writeln!(
            f,
            "📋 Transfer summary u/{} → u/{}{}",
            self.source, self.destination, label
        )?;
        for pass in &self.passes {
            let status = match &pass.status {
                PassStatus::Completed => "done".to_string(),
                PassStatus::Skipped => "skipped".to_string(),
                PassStatus::Aborted(reason) => format!("aborted: {reason}"),
                PassStatus::Interrupted => "interrupted".to_string(),
            };
            writeln!(
                f,
                "  {:<14} removed {:>5}  added {:>5}  unchanged {:>5}  failed {:>4}  [{}]",
                pass.kind.to_string(),
                pass.removed,
                pass.added,
                pass.unchanged,
                pass.failures.len(),
                status
            )?;
        }
        for pass in self.passes.iter().filter(|p| !p.failures.is_empty()) {
            writeln!(f, "  Failed {}:", pass.kind)?;
            for failure in &pass.failures {
                writeln!(
                    f,
                    "    - {} {}: {}",
                    failure.action, failure.item, failure.reason
                )?;
            }
        }
        Ok(())
    }
}
