use crate::{
    FatalBatchError,
    config::Config,
    import::Importer,
    media::AssetRef,
    report::RowOutcome,
    repository::{
        ContentRepository, ItemId, NewItem, TermId, TermStore,
        sqlite::{self, Repository},
    },
    tests::{StubMedia, importer},
    warning::RowWarning,
};

/// Delegates to SQLite but refuses to write items with one title.
#[derive(Clone)]
struct RejectTitle {
    inner: Repository,
    title: &'static str,
}

impl ContentRepository for RejectTitle {
    type Error = sqlite::Error;

    async fn find_item_by_business_key(
        &self,
        content_type: &str,
        key: &str,
    ) -> Result<Option<ItemId>, Self::Error> {
        self.inner.find_item_by_business_key(content_type, key).await
    }

    async fn create_item(&self, item: &NewItem) -> Result<ItemId, Self::Error> {
        self.inner.create_item(item).await
    }

    async fn update_item(
        &self,
        id: ItemId,
        item: &NewItem,
        update_title: bool,
    ) -> Result<(), Self::Error> {
        self.inner.update_item(id, item, update_title).await
    }

    async fn upsert(
        &self,
        key: Option<&str>,
        item: &NewItem,
        update_title: bool,
    ) -> Result<(ItemId, bool), Self::Error> {
        if item.title == self.title {
            return Err(sqlx::Error::Protocol("disk I/O error".into()).into());
        }
        self.inner.upsert(key, item, update_title).await
    }

    async fn set_featured_media(&self, id: ItemId, asset: &AssetRef) -> Result<(), Self::Error> {
        self.inner.set_featured_media(id, asset).await
    }

    async fn assign_terms(
        &self,
        id: ItemId,
        taxonomy: &str,
        terms: &[TermId],
    ) -> Result<(), Self::Error> {
        self.inner.assign_terms(id, taxonomy, terms).await
    }

    async fn set_metadata(&self, id: ItemId, key: &str, value: &str) -> Result<(), Self::Error> {
        self.inner.set_metadata(id, key, value).await
    }
}

impl TermStore for RejectTitle {
    type Error = sqlite::Error;

    async fn find_term(&self, taxonomy: &str, name: &str) -> Result<Option<TermId>, Self::Error> {
        self.inner.find_term(taxonomy, name).await
    }

    async fn create_term(
        &self,
        taxonomy: &str,
        name: &str,
        parent: Option<TermId>,
    ) -> Result<TermId, Self::Error> {
        self.inner.create_term(taxonomy, name, parent).await
    }
}

#[tokio::test]
async fn unknown_category_aborts_before_writing() {
    let repository = super::memory_repository().await;
    let result = importer(&Config::default(), &repository)
        .import_file("src/tests/fixtures/unknown_category.csv")
        .await;
    match result {
        Err(FatalBatchError::UnknownCategory { row, label }) => {
            assert_eq!(row, 2);
            assert_eq!(label, "Podcast");
        }
        other => panic!("expected UnknownCategory, got {other:?}"),
    }
    assert_eq!(repository.count_items().await.unwrap(), 0);
    assert_eq!(repository.count_terms().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_taxonomy_aborts() {
    let repository = super::memory_repository().await;
    let mut config = Config::default();
    config.taxonomies.shift_remove("music");
    let result = importer(&config, &repository)
        .import_file("src/tests/fixtures/unknown_category.csv")
        .await;
    assert!(matches!(
        result,
        Err(FatalBatchError::MissingTaxonomy { row: 1, ref content_type }) if content_type == "music"
    ));
    assert_eq!(repository.count_items().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_and_missing_files() {
    let repository = super::memory_repository().await;
    let importer = importer(&Config::default(), &repository);
    assert!(matches!(
        importer
            .import_file("src/tests/fixtures/header_only.csv")
            .await,
        Err(FatalBatchError::EmptyInput)
    ));
    assert!(matches!(
        importer.import_file("src/tests/fixtures/nope.csv").await,
        Err(FatalBatchError::FileNotFound(path)) if path.ends_with("nope.csv")
    ));
    assert!(matches!(
        importer.import_rows(&[]).await,
        Err(FatalBatchError::EmptyInput)
    ));
}

#[tokio::test]
async fn media_and_term_problems_are_warnings() {
    let repository = super::memory_repository().await;
    let report = importer(&Config::default(), &repository)
        .import_file("src/tests/fixtures/broken_media.csv")
        .await
        .unwrap();
    assert_eq!((report.created, report.failed, report.warnings), (2, 0, 3));

    match report.outcomes[0].warnings() {
        [
            RowWarning::SubCategoryWithoutParent { name },
            RowWarning::MediaUnavailable { url, .. },
        ] => {
            assert_eq!(name, "Adventures");
            assert_eq!(url, "ftp://img.test/kite.png");
        }
        other => panic!("unexpected warnings {other:?}"),
    }
    assert!(matches!(
        report.outcomes[1].warnings(),
        [RowWarning::MediaUnavailable { detail, .. }] if detail.contains("unreachable host")
    ));
    assert_eq!(
        serde_json::to_value(&report.outcomes[1]).unwrap()["warnings"][0]["kind"],
        "media_unavailable"
    );

    for outcome in &report.outcomes {
        let item = repository
            .item(outcome.item_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.featured_media, None);
    }
    assert_eq!(repository.count_terms().await.unwrap(), 0);
}

#[tokio::test]
async fn write_failure_is_per_row() {
    let repository = super::memory_repository().await;
    let failing = RejectTitle {
        inner: repository.clone(),
        title: "Thunder",
    };
    let report = Importer::new(&Config::default(), failing, StubMedia)
        .import_file("src/tests/fixtures/reject_second.csv")
        .await
        .unwrap();
    assert_eq!((report.total, report.created, report.failed), (3, 2, 1));
    match &report.outcomes[1] {
        RowOutcome::Error { row, message, .. } => {
            assert_eq!(*row, 2);
            assert!(message.contains("disk I/O error"), "{message}");
        }
        other => panic!("expected an error outcome, got {other:?}"),
    }
    assert!(matches!(report.outcomes[2], RowOutcome::Success { row: 3, .. }));
    assert_eq!(repository.count_items().await.unwrap(), 2);
    // the shared parent term was created once and reused
    assert_eq!(repository.count_terms().await.unwrap(), 1);
}

#[tokio::test]
async fn latin1_bytes_do_not_abort_the_batch() {
    let repository = super::memory_repository().await;
    let report = importer(&Config::default(), &repository)
        .import_file("src/tests/fixtures/latin1.csv")
        .await
        .unwrap();
    assert_eq!((report.total, report.created, report.failed), (2, 2, 0));
    let cafe = repository
        .item(report.outcomes[1].item_id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cafe.title, "Caf\u{fffd} Jazz");
    assert_eq!(cafe.body, "<p>Smooth</p>");
}
