//! Deploy and rollback summaries

use crate::deploy::DeployStage;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use ecs_deploy_common::ResourceKind;
use std::path::PathBuf;

/// One stage the deploy chain reached and what it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEntry {
    pub stage: DeployStage,
    pub resource: String,
}

/// Stages reached by one deploy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub project: String,
    pub entries: Vec<StageEntry>,
    pub manifest_path: Option<PathBuf>,
}

impl DeployReport {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            entries: Vec::new(),
            manifest_path: None,
        }
    }

    pub fn last_stage(&self) -> Option<DeployStage> {
        self.entries.last().map(|e| e.stage)
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new("Stage"), Cell::new("Resource")]);

        for entry in &self.entries {
            table.add_row(vec![
                Cell::new(entry.stage.as_str()),
                Cell::new(&entry.resource),
            ]);
        }

        table
    }
}

/// Result of a single resource cleanup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupResult {
    /// Resource was successfully deleted
    Deleted,
    /// Resource was already deleted (not found)
    AlreadyDeleted,
    /// Cleanup failed with error
    Failed,
    /// Resource was skipped (not deletable or nothing to delete)
    Skipped,
}

impl CleanupResult {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupResult::Deleted => "deleted",
            CleanupResult::AlreadyDeleted => "already deleted",
            CleanupResult::Failed => "failed",
            CleanupResult::Skipped => "skipped",
        }
    }

    fn color(self) -> Color {
        match self {
            CleanupResult::Deleted | CleanupResult::AlreadyDeleted => Color::Green,
            CleanupResult::Skipped => Color::Yellow,
            CleanupResult::Failed => Color::Red,
        }
    }
}

/// Outcome of one rollback step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackStep {
    pub kind: ResourceKind,
    pub resource: String,
    pub result: CleanupResult,
    /// Error or warning text for non-deleted outcomes
    pub detail: Option<String>,
}

/// Outcomes of every rollback step, in the order attempted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub steps: Vec<RollbackStep>,
}

impl RollbackReport {
    pub fn count(&self, result: CleanupResult) -> usize {
        self.steps.iter().filter(|s| s.result == result).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(CleanupResult::Failed)
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Type"),
                Cell::new("Resource"),
                Cell::new("Result"),
                Cell::new("Detail"),
            ]);

        for step in &self.steps {
            table.add_row(vec![
                Cell::new(step.kind.as_str()),
                Cell::new(&step.resource),
                Cell::new(step.result.as_str()).fg(step.result.color()),
                Cell::new(step.detail.as_deref().unwrap_or("")),
            ]);
        }

        table
    }
}
