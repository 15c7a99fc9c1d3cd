//! Category label → content type → taxonomy resolution, and taxonomy term
//! lookup-or-create.

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    repository::{TermId, TermStore},
    warning::{self, RowWarning},
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown category label {0:?}")]
    UnknownLabel(String),
    #[error("no taxonomy mapped for content type {0}")]
    NoTaxonomy(String),
}

/// Fixed label and taxonomy tables. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct CategoryMapping {
    post_types: IndexMap<String, String>,
    taxonomies: IndexMap<String, String>,
}

impl Default for CategoryMapping {
    fn default() -> Self {
        crate::config::Config::default().category_mapping()
    }
}

impl CategoryMapping {
    pub fn new(post_types: IndexMap<String, String>, taxonomies: IndexMap<String, String>) -> Self {
        Self {
            post_types,
            taxonomies,
        }
    }

    /// Exact match on the trimmed label. No case folding.
    pub fn resolve_post_type(&self, label: &str) -> Result<&str, LookupError> {
        let label = label.trim();
        self.post_types
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| LookupError::UnknownLabel(label.to_owned()))
    }

    pub fn taxonomy_for(&self, content_type: &str) -> Result<&str, LookupError> {
        self.taxonomies
            .get(content_type)
            .map(String::as_str)
            .ok_or_else(|| LookupError::NoTaxonomy(content_type.to_owned()))
    }

    pub fn taxonomies(&self) -> impl Iterator<Item = &str> {
        self.taxonomies.values().map(String::as_str)
    }
}

/// Resolves taxonomy terms against a [`TermStore`], creating missing ones.
///
/// Find and create for one taxonomy run under a single lock, so concurrent
/// callers asking for the same name get the same term.
pub struct CategoryMapper<S> {
    mapping: Arc<CategoryMapping>,
    store: S,
    locks: HashMap<String, Mutex<()>>,
    fallback_lock: Mutex<()>,
}

impl<S: TermStore> CategoryMapper<S> {
    pub fn new(mapping: Arc<CategoryMapping>, store: S) -> Self {
        let locks = mapping
            .taxonomies()
            .map(|taxonomy| (taxonomy.to_owned(), Mutex::new(())))
            .collect();
        Self {
            mapping,
            store,
            locks,
            fallback_lock: Mutex::new(()),
        }
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    pub async fn get_or_create_parent_term(&self, taxonomy: &str, name: &str) -> Option<TermId> {
        self.get_or_create(taxonomy, name, None).await
    }

    /// The existence check is taxonomy wide: a name already used under
    /// another parent resolves to that existing term.
    pub async fn get_or_create_child_term(
        &self,
        taxonomy: &str,
        parent: TermId,
        name: &str,
    ) -> Option<TermId> {
        self.get_or_create(taxonomy, name, Some(parent)).await
    }

    async fn get_or_create(
        &self,
        taxonomy: &str,
        name: &str,
        parent: Option<TermId>,
    ) -> Option<TermId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let _guard = self
            .locks
            .get(taxonomy)
            .unwrap_or(&self.fallback_lock)
            .lock()
            .await;
        match self.store.find_term(taxonomy, name).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(error) => {
                warning::record(RowWarning::TermLookupFailed {
                    taxonomy: taxonomy.to_owned(),
                    name: name.to_owned(),
                    detail: error.to_string(),
                });
                return None;
            }
        }
        match self.store.create_term(taxonomy, name, parent).await {
            Ok(id) => {
                debug!(taxonomy, name, %id, ?parent, "created term");
                Some(id)
            }
            Err(error) => {
                warning::record(RowWarning::TermCreationFailed {
                    taxonomy: taxonomy.to_owned(),
                    name: name.to_owned(),
                    detail: error.to_string(),
                });
                None
            }
        }
    }
}
