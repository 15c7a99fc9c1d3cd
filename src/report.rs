use serde::Serialize;

use crate::{repository::ItemId, warning::RowWarning};

/// Result of importing one data row. `row` is the 1-based data row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Success {
        row: usize,
        item_id: ItemId,
        created: bool,
        warnings: Vec<RowWarning>,
    },
    Error {
        row: usize,
        message: String,
        warnings: Vec<RowWarning>,
    },
}

impl RowOutcome {
    pub fn row(&self) -> usize {
        match self {
            Self::Success { row, .. } | Self::Error { row, .. } => *row,
        }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::Success { item_id, .. } => Some(*item_id),
            Self::Error { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[RowWarning] {
        match self {
            Self::Success { warnings, .. } | Self::Error { warnings, .. } => warnings,
        }
    }
}

/// Ordered per-row outcomes plus aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub warnings: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl ImportReport {
    pub fn push(&mut self, outcome: RowOutcome) {
        self.total += 1;
        match &outcome {
            RowOutcome::Success { created: true, .. } => self.created += 1,
            RowOutcome::Success { created: false, .. } => self.updated += 1,
            RowOutcome::Error { .. } => self.failed += 1,
        }
        self.warnings += outcome.warnings().len();
        self.outcomes.push(outcome);
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}
