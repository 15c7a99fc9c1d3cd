//! Import orchestration
//!
//! A batch runs in three passes over the rows:
//! 1. every category label is mapped to a content type and taxonomy; an
//!    unknown label aborts the batch before anything is written,
//! 2. featured images are resolved with bounded concurrency, in row order,
//! 3. rows are written one at a time in file order. A failed write is
//!    recorded for that row and the batch moves on.

use std::{path::Path, sync::Arc};

use futures::{StreamExt as _, stream};
use tracing::{debug, error, info};

use crate::{
    FatalBatchError,
    category::CategoryMapper,
    config::{Columns, Config},
    content,
    media::{self, AssetRef, MediaResolver},
    progress::{ImportPhase, NullReporter, ProgressReporter, RowStatus},
    reader::{self, RawRow},
    report::{ImportReport, RowOutcome},
    repository::{ContentRepository, GROUP_ID, ItemId, NewItem, TermId, TermStore},
    sanitize::{self, SanitizedRow},
    warning::{self, RowWarning},
};

pub const BUY_LINK: &str = "buy_link";
pub const SEO_TITLE: &str = "seo_title";
pub const SEO_DESCRIPTION: &str = "seo_description";
pub const SEO_KEYWORD: &str = "seo_keyword";

/// Failure of a single row. Recorded in the report; the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum RowError<E> {
    #[error("failed to write content item: {0}")]
    RepositoryWriteFailed(E),
}

struct Category<'m> {
    content_type: &'m str,
    taxonomy: &'m str,
}

pub struct Importer<R, M> {
    repository: R,
    media: M,
    mapper: CategoryMapper<R>,
    columns: Columns,
    update_title: bool,
    spacer_height: u32,
    media_concurrency: usize,
    reporter: Arc<dyn ProgressReporter>,
}

impl<R, M> Importer<R, M>
where
    R: ContentRepository + TermStore + Clone,
    M: MediaResolver,
{
    pub fn new(config: &Config, repository: R, media: M) -> Self {
        Self {
            mapper: CategoryMapper::new(Arc::new(config.category_mapping()), repository.clone()),
            repository,
            media,
            columns: config.columns.clone(),
            update_title: config.update_title,
            spacer_height: config.spacer_height,
            media_concurrency: config.media.concurrency.max(1),
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Import one CSV file as a single batch.
    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<ImportReport, FatalBatchError> {
        let path = path.as_ref();
        self.reporter.set_phase(ImportPhase::ReadingCsv);
        let result = match reader::open(path).and_then(|rows| rows.collect::<Result<Vec<_>, _>>()) {
            Ok(rows) => {
                info!(path = %path.display(), rows = rows.len(), "read CSV");
                self.import_rows(&rows).await
            }
            Err(error) => Err(error.into()),
        };
        if let Err(error) = &result {
            error!(%error, path = %path.display(), "import aborted");
            self.reporter.set_phase(ImportPhase::Failed(error.to_string()));
        }
        result
    }

    pub async fn import_rows(&self, rows: &[RawRow]) -> Result<ImportReport, FatalBatchError> {
        if rows.is_empty() {
            return Err(FatalBatchError::EmptyInput);
        }
        self.reporter.register_rows(rows.len());

        self.reporter.set_phase(ImportPhase::ResolvingCategories);
        let sanitized = rows
            .iter()
            .map(|raw| sanitize::sanitize(raw, &self.columns))
            .collect::<Vec<_>>();
        let categories = sanitized
            .iter()
            .enumerate()
            .map(|(idx, row)| self.resolve_category(idx + 1, row))
            .collect::<Result<Vec<_>, _>>()?;

        self.reporter.set_phase(ImportPhase::FetchingMedia);
        let media = self.resolve_media(&sanitized).await;

        self.reporter.set_phase(ImportPhase::WritingItems);
        let mut report = ImportReport::default();
        for (idx, ((sanitized, category), media)) in
            sanitized.into_iter().zip(&categories).zip(media).enumerate()
        {
            let row = idx + 1;
            self.reporter.update_row(row, RowStatus::Writing);
            let (result, warnings) =
                warning::within_row(self.import_row(sanitized, category, media)).await;
            for warning in &warnings {
                self.reporter.log_warn(&format!("row {row}: {warning}"));
            }
            let outcome = match result {
                Ok((item_id, created)) => {
                    debug!(row, %item_id, created, "imported row");
                    self.reporter.update_row(
                        row,
                        if created {
                            RowStatus::Created
                        } else {
                            RowStatus::Updated
                        },
                    );
                    RowOutcome::Success {
                        row,
                        item_id,
                        created,
                        warnings,
                    }
                }
                Err(error) => {
                    error!(%error, row, "failed to import row");
                    self.reporter
                        .update_row(row, RowStatus::Failed(error.to_string()));
                    RowOutcome::Error {
                        row,
                        message: error.to_string(),
                        warnings,
                    }
                }
            };
            report.push(outcome);
        }
        self.reporter.set_phase(ImportPhase::Completed);
        info!(
            total = report.total,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "import finished"
        );
        Ok(report)
    }

    fn resolve_category(
        &self,
        row: usize,
        sanitized: &SanitizedRow,
    ) -> Result<Category<'_>, FatalBatchError> {
        let mapping = self.mapper.mapping();
        let content_type = mapping
            .resolve_post_type(&sanitized.label)
            .map_err(|_| FatalBatchError::UnknownCategory {
                row,
                label: sanitized.label.clone(),
            })?;
        let taxonomy =
            mapping
                .taxonomy_for(content_type)
                .map_err(|_| FatalBatchError::MissingTaxonomy {
                    row,
                    content_type: content_type.to_owned(),
                })?;
        Ok(Category {
            content_type,
            taxonomy,
        })
    }

    /// One result per row, in row order. Rows without an image URL (or all
    /// rows when downloads are disabled) do not count towards progress.
    async fn resolve_media(&self, rows: &[SanitizedRow]) -> Vec<Result<AssetRef, media::Error>> {
        let total = rows.iter().filter(|row| !row.image_url.is_empty()).count();
        let (mut done, mut fetched) = (0, 0);
        stream::iter(rows.iter().enumerate())
            .map(|(idx, row)| async move {
                if !row.image_url.is_empty() {
                    self.reporter.update_row(idx + 1, RowStatus::FetchingMedia);
                }
                self.media.resolve(&row.image_url).await
            })
            .buffered(self.media_concurrency)
            .inspect(|result| {
                if matches!(result, Err(error) if error.is_absent()) {
                    return;
                }
                done += 1;
                if result.is_ok() {
                    fetched += 1;
                }
                self.reporter.set_media_progress(done, total, fetched);
            })
            .collect()
            .await
    }

    async fn import_row(
        &self,
        mut row: SanitizedRow,
        category: &Category<'_>,
        media: Result<AssetRef, media::Error>,
    ) -> Result<(ItemId, bool), RowError<<R as ContentRepository>::Error>> {
        row.content_type = category.content_type.to_owned();
        row.term_ids = self.resolve_terms(category.taxonomy, &row).await;
        row.media = match media {
            Ok(asset) => Some(asset),
            Err(error) if error.is_absent() => {
                debug!(%error, "no featured media");
                None
            }
            Err(error) => {
                warning::record(RowWarning::MediaUnavailable {
                    url: row.image_url.clone(),
                    detail: error.to_string(),
                });
                None
            }
        };

        let item = NewItem {
            content_type: row.content_type.clone(),
            title: row.title.clone(),
            body: content::build_body(&row, self.spacer_height),
            excerpt: row.short_description.clone(),
            status: row.status,
            slug: row.slug.clone(),
        };
        let (item_id, created) = self
            .repository
            .upsert(row.business_key(), &item, self.update_title)
            .await
            .map_err(RowError::RepositoryWriteFailed)?;
        self.attach(item_id, category.taxonomy, &row).await;
        Ok((item_id, created))
    }

    /// Parent term first, then the child. Absent terms are left out.
    async fn resolve_terms(&self, taxonomy: &str, row: &SanitizedRow) -> Vec<TermId> {
        let parent = self
            .mapper
            .get_or_create_parent_term(taxonomy, &row.parent_category)
            .await;
        let child = match parent {
            Some(parent) => {
                self.mapper
                    .get_or_create_child_term(taxonomy, parent, &row.sub_category)
                    .await
            }
            None if !row.sub_category.is_empty() => {
                warning::record(RowWarning::SubCategoryWithoutParent {
                    name: row.sub_category.clone(),
                });
                None
            }
            None => None,
        };
        parent.into_iter().chain(child).collect()
    }

    /// Featured media, terms and metadata. Each write is independent; a
    /// failure becomes a row warning.
    async fn attach(&self, item_id: ItemId, taxonomy: &str, row: &SanitizedRow) {
        if let Some(asset) = &row.media {
            if let Err(error) = self.repository.set_featured_media(item_id, asset).await {
                attach_failed("featured media", error);
            }
        }
        if !row.term_ids.is_empty() {
            if let Err(error) = self
                .repository
                .assign_terms(item_id, taxonomy, &row.term_ids)
                .await
            {
                attach_failed(format!("{taxonomy} terms"), error);
            }
        }
        for (key, value) in [
            (GROUP_ID, &row.group_id),
            (BUY_LINK, &row.buy_link),
            (SEO_TITLE, &row.seo_title),
            (SEO_DESCRIPTION, &row.seo_description),
            (SEO_KEYWORD, &row.seo_keyword),
        ] {
            if value.is_empty() {
                continue;
            }
            if let Err(error) = self.repository.set_metadata(item_id, key, value).await {
                attach_failed(format!("metadata {key}"), error);
            }
        }
        debug!(%item_id, "attached media, terms and metadata");
    }
}

fn attach_failed(what: impl Into<String>, error: impl std::fmt::Display) {
    warning::record(RowWarning::AttachFailed {
        what: what.into(),
        detail: error.to_string(),
    });
}
