//! Row warnings
//!
//! Problems that do not stop a row from being written end up as
//! [`RowWarning`]s in that row's outcome. They are recorded into a
//! task-local buffer installed by [`within_row`], so code deep inside term or
//! media handling does not need to thread a sink through every call.

use std::cell::RefCell;

use serde::Serialize;
use tracing::{debug, warn};

/// Non-fatal problem hit while importing one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowWarning {
    #[error("media unavailable ({url}): {detail}")]
    MediaUnavailable { url: String, detail: String },
    #[error("failed to look up term {name:?} in {taxonomy}: {detail}")]
    TermLookupFailed {
        taxonomy: String,
        name: String,
        detail: String,
    },
    #[error("failed to create term {name:?} in {taxonomy}: {detail}")]
    TermCreationFailed {
        taxonomy: String,
        name: String,
        detail: String,
    },
    #[error("sub category {name:?} skipped: no parent category")]
    SubCategoryWithoutParent { name: String },
    #[error("failed to attach {what}: {detail}")]
    AttachFailed { what: String, detail: String },
}

tokio::task_local! {
    static ROW_WARNINGS: RefCell<Vec<RowWarning>>;
}

/// Log `warning` and add it to the row being imported. Outside of
/// [`within_row`] it is only logged.
pub fn record(warning: RowWarning) {
    warn!(%warning, "row warning");
    let outside = ROW_WARNINGS
        .try_with(|warnings| warnings.borrow_mut().push(warning))
        .is_err();
    if outside {
        debug!("row warning recorded outside of a row scope");
    }
}

/// Drive `row` to completion and return its output with every warning
/// recorded meanwhile, in recording order.
pub async fn within_row<F, T>(row: F) -> (T, Vec<RowWarning>)
where
    F: Future<Output = T>,
{
    ROW_WARNINGS
        .scope(RefCell::default(), async {
            let output = row.await;
            (output, ROW_WARNINGS.with(RefCell::take))
        })
        .await
}
