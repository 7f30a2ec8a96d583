//! Target selection strategy.
//!
//! The retrieval request is narrowed to a set of local files the user cares
//! about. The default strategy selects exactly the active document; multi-file
//! workflows plug in here without reshaping the orchestrator.

use std::collections::BTreeSet;

use super::editor::Document;

pub trait TargetSelector: Send + Sync {
    /// The local file paths the retrieval should be narrowed to.
    fn select_targets(&self, document: &Document) -> BTreeSet<String>;
}

/// Selects exactly the file open in the active editor.
pub struct ActiveDocumentSelector;

impl TargetSelector for ActiveDocumentSelector {
    fn select_targets(&self, document: &Document) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        targets.insert(document.path.display().to_string());
        targets
    }
}
