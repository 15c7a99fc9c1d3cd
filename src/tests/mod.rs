use std::{path::PathBuf, sync::Mutex};

use crate::{
    config::Config,
    content::DEFAULT_SPACER_HEIGHT,
    import::Importer,
    media::{AssetRef, DisabledMedia, MediaResolver},
    progress::{ImportPhase, ProgressReporter, RowStatus},
    repository::{
        GROUP_ID,
        sqlite::{LocalDatabase, Repository},
    },
};

mod failure;
mod media;

/// Resolves `img.test` URLs without touching the network. Any other host
/// fails like an unreachable server.
pub(crate) struct StubMedia;

impl MediaResolver for StubMedia {
    async fn resolve(&self, src: &str) -> Result<AssetRef, crate::media::Error> {
        let url = crate::media::parse_url(src)?;
        if url.host_str() != Some("img.test") {
            return Err(crate::media::Error::Store {
                path: url.path().into(),
                detail: "unreachable host".into(),
            });
        }
        let hash = blake3::hash(url.as_str().as_bytes());
        let name = crate::media::file_name(&url, &hash);
        Ok(AssetRef {
            path: PathBuf::from(hash.to_hex().as_str()).join(&name),
            hash,
            content_type: mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_owned(),
            size: 0,
            source: url,
        })
    }
}

/// Keeps every media progress update.
#[derive(Default)]
pub(crate) struct MediaProgress(Mutex<Vec<(usize, usize, usize)>>);

impl ProgressReporter for MediaProgress {
    fn set_phase(&self, _phase: ImportPhase) {}
    fn register_rows(&self, _count: usize) {}
    fn update_row(&self, _row: usize, _status: RowStatus) {}
    fn set_media_progress(&self, done: usize, total: usize, fetched: usize) {
        self.0.lock().unwrap().push((done, total, fetched));
    }
    fn log_warn(&self, _message: &str) {}
    fn finish(&self) {}
}

pub(crate) async fn memory_repository() -> Repository {
    LocalDatabase::open("sqlite::memory:")
        .await
        .unwrap()
        .repository()
}

pub(crate) fn importer(config: &Config, repository: &Repository) -> Importer<Repository, StubMedia> {
    Importer::new(config, repository.clone(), StubMedia)
}

#[tokio::test]
async fn import_catalog() {
    let repository = memory_repository().await;
    let report = importer(&Config::default(), &repository)
        .import_file("src/tests/fixtures/catalog.csv")
        .await
        .unwrap();

    assert_eq!(
        (report.total, report.created, report.updated, report.failed, report.warnings),
        (3, 3, 0, 0, 0)
    );
    assert_eq!(
        report.outcomes.iter().map(|o| o.row()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(repository.count_items().await.unwrap(), 3);

    let ocean = report.outcomes[0].item_id().unwrap();
    let item = repository.item(ocean).await.unwrap().unwrap();
    assert_eq!(item.content_type, "music");
    assert_eq!(item.title, "Ocean <b>Waves</b>");
    assert_eq!(item.slug, "ocean-waves");
    assert_eq!(item.status, "publish");
    assert_eq!(item.excerpt, "Short <i>one</i>");
    assert!(item.body.starts_with("<p>Calm sounds</p>\n"));
    assert!(!item.body.contains("script"));
    assert!(item.body.contains(&format!(
        r#"<div style="height:{DEFAULT_SPACER_HEIGHT}px" aria-hidden="true" class="import-spacer"></div>"#
    )));
    assert!(
        item.body
            .ends_with(r#"<iframe src="https://player.test/1"></iframe>"#)
    );

    let media = item.featured_media().unwrap();
    assert_eq!(media.source.as_str(), "https://img.test/ocean.jpg");
    assert_eq!(media.content_type, "image/jpeg");
    assert!(media.path.ends_with("ocean.jpg"));

    let meta = repository.metadata(ocean).await.unwrap();
    assert_eq!(meta[GROUP_ID], "G-100");
    assert_eq!(meta["buy_link"], "http://shop.test/ocean");
    assert_eq!(meta["seo_title"], "SEO Ocean");
    assert_eq!(meta["seo_description"], "Ocean desc");
    assert_eq!(meta["seo_keyword"], "ocean");

    assert_eq!(
        repository.item_terms(ocean).await.unwrap(),
        vec![
            ("music_category".to_owned(), "Nature".to_owned()),
            ("music_category".to_owned(), "Water".to_owned()),
        ]
    );
    assert_eq!(
        repository
            .term_parent("music_category", "Water")
            .await
            .unwrap()
            .as_deref(),
        Some("Nature")
    );

    let morning = report.outcomes[1].item_id().unwrap();
    let item = repository.item(morning).await.unwrap().unwrap();
    assert_eq!(item.content_type, "meditation");
    assert_eq!(item.status, "draft");
    assert_eq!(item.body, "<p>Breathe</p>");
    assert_eq!(item.excerpt, "");
    assert_eq!(item.featured_media, None);
    let meta = repository.metadata(morning).await.unwrap();
    assert_eq!(meta.keys().collect::<Vec<_>>(), vec![GROUP_ID]);
    assert_eq!(
        repository.item_terms(morning).await.unwrap(),
        vec![("meditation_category".to_owned(), "Mindfulness".to_owned())]
    );

    let night = report.outcomes[2].item_id().unwrap();
    let item = repository.item(night).await.unwrap().unwrap();
    assert_eq!(item.content_type, "sleep_story");
    assert_eq!(item.status, "pending");
    assert_eq!(item.slug, "night-train");
    assert!(repository.metadata(night).await.unwrap().is_empty());
    assert_eq!(
        repository
            .term_parent("sleep_category", "Trains")
            .await
            .unwrap()
            .as_deref(),
        Some("Stories")
    );
}

#[tokio::test]
async fn media_progress_counts_downloads_only() {
    let repository = memory_repository().await;

    let progress = std::sync::Arc::new(MediaProgress::default());
    importer(&Config::default(), &repository)
        .with_reporter(progress.clone())
        .import_file("src/tests/fixtures/catalog.csv")
        .await
        .unwrap();
    // one of three rows has an image URL
    assert_eq!(*progress.0.lock().unwrap(), vec![(1, 1, 1)]);

    let progress = std::sync::Arc::new(MediaProgress::default());
    importer(&Config::default(), &repository)
        .with_reporter(progress.clone())
        .import_file("src/tests/fixtures/broken_media.csv")
        .await
        .unwrap();
    assert_eq!(*progress.0.lock().unwrap(), vec![(1, 2, 0), (2, 2, 0)]);

    let progress = std::sync::Arc::new(MediaProgress::default());
    Importer::new(&Config::default(), repository.clone(), DisabledMedia)
        .with_reporter(progress.clone())
        .import_file("src/tests/fixtures/catalog.csv")
        .await
        .unwrap();
    assert!(progress.0.lock().unwrap().is_empty());
}
