use std::path::{Path, PathBuf};

use indexmap::{IndexMap, indexmap};
use serde::Deserialize;

use crate::category::CategoryMapping;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config ({}): {error}", path.display())]
    Read {
        error: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config ({}): {error}", path.display())]
    Parse {
        error: serde_yaml::Error,
        path: PathBuf,
    },
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum MediaStorage {
    Asset { dir: PathBuf },
    Database,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MediaConfig {
    pub storage: MediaStorage,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage: MediaStorage::Database,
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

/// CSV column names for every field the importer reads.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Columns {
    pub category: String,
    pub title: String,
    pub long_description: String,
    pub short_description: String,
    pub embed_code_1: String,
    pub embed_code_2: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keyword: String,
    pub group_id: String,
    pub buy_link: String,
    pub status: String,
    pub slug: String,
    pub image: String,
    pub parent_category: String,
    pub sub_category: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            category: "cpt_taxonomy".into(),
            title: "product_title".into(),
            long_description: "long_description".into(),
            short_description: "short_description".into(),
            embed_code_1: "embed_code_1".into(),
            embed_code_2: "embed_code_2".into(),
            seo_title: "seo_title".into(),
            seo_description: "seo_description".into(),
            seo_keyword: "seo_keyword".into(),
            group_id: "group_id".into(),
            buy_link: "buy_link".into(),
            status: "status".into(),
            slug: "slug".into(),
            image: "product_image".into(),
            parent_category: "parent_category".into(),
            sub_category: "sub_category".into(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// CSV category label to content type.
    pub post_types: IndexMap<String, String>,
    /// Content type to the taxonomy holding its categories.
    pub taxonomies: IndexMap<String, String>,
    pub columns: Columns,
    /// Overwrite the title of items found by business key.
    pub update_title: bool,
    pub spacer_height: u32,
    pub media: MediaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            post_types: indexmap! {
                "Library".into() => "library".into(),
                "Music".into() => "music".into(),
                "Meditation".into() => "meditation".into(),
                "Children Story".into() => "children_story".into(),
                "Sleep Story".into() => "sleep_story".into(),
                "Magazine".into() => "magazine".into(),
            },
            taxonomies: indexmap! {
                "library".into() => "library_category".into(),
                "music".into() => "music_category".into(),
                "meditation".into() => "meditation_category".into(),
                "children_story".into() => "children_category".into(),
                "sleep_story".into() => "sleep_category".into(),
                "magazine".into() => "magazine_category".into(),
            },
            columns: Columns::default(),
            update_title: false,
            spacer_height: crate::content::DEFAULT_SPACER_HEIGHT,
            media: MediaConfig::default(),
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| Error::Read {
                error,
                path: path.to_owned(),
            })?;
        serde_yaml::from_str(&content).map_err(|error| Error::Parse {
            error,
            path: path.to_owned(),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        for (label, content_type) in &self.post_types {
            if label.trim().is_empty() {
                return Err(format!("empty category label for {content_type}"));
            }
            if label.trim() != label {
                return Err(format!("category label {label:?} has surrounding whitespace"));
            }
            if !self.taxonomies.contains_key(content_type) {
                return Err(format!(
                    "content type {content_type} (label {label:?}) has no taxonomy"
                ));
            }
        }
        if self.media.concurrency == 0 {
            return Err("media.concurrency must be at least 1".into());
        }
        Ok(())
    }

    pub fn category_mapping(&self) -> CategoryMapping {
        CategoryMapping::new(self.post_types.clone(), self.taxonomies.clone())
    }
}
