//! Featured media resolution
//!
//! A [`MediaResolver`] turns the image URL of a row into an [`AssetRef`].
//! [`HttpMediaResolver`] downloads the image and hands the bytes to an
//! [`AssetStore`].

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no image URL given")]
    EmptyUrl,
    #[error("media download disabled")]
    Disabled,
    #[error("invalid image URL ({url}): {error}")]
    InvalidUrl { error: url::ParseError, url: String },
    #[error("unsupported image URL scheme ({url})")]
    UnsupportedScheme { url: Url },
    #[error("failed to fetch remote image ({url}): {error}")]
    Fetch { error: reqwest::Error, url: Url },
    #[error("failed to store asset ({}): {detail}", path.display())]
    Store { path: PathBuf, detail: String },
}

impl Error {
    /// Whether the row simply had nothing to resolve.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::EmptyUrl | Self::Disabled)
    }
}

mod serde_hash {
    use serde::Deserialize as _;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<blake3::Hash, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use std::str::FromStr as _;
        let s = String::deserialize(deserializer)?;
        blake3::Hash::from_str(&s).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S: serde::Serializer>(hash: &blake3::Hash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hash.to_string())
    }
}

/// Handle to a stored media object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef {
    #[serde(with = "serde_hash")]
    pub hash: blake3::Hash,
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
    pub source: Url,
}

pub trait MediaResolver {
    fn resolve(&self, url: &str) -> impl Future<Output = Result<AssetRef, Error>>;
}

pub trait AssetStore {
    type Error: std::fmt::Display;

    fn put(
        &self,
        path: &Path,
        content_type: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Resolver used when downloads are switched off.
pub struct DisabledMedia;

impl MediaResolver for DisabledMedia {
    async fn resolve(&self, _url: &str) -> Result<AssetRef, Error> {
        Err(Error::Disabled)
    }
}

pub struct HttpMediaResolver<A> {
    client: reqwest::Client,
    store: A,
}

impl<A> HttpMediaResolver<A> {
    pub fn new(store: A, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(
            store,
            reqwest::Client::builder().timeout(timeout).build()?,
        ))
    }

    pub fn with_client(store: A, client: reqwest::Client) -> Self {
        Self { client, store }
    }
}

/// Parse and check an image URL without touching the network.
pub fn parse_url(src: &str) -> Result<Url, Error> {
    let src = src.trim();
    if src.is_empty() {
        return Err(Error::EmptyUrl);
    }
    let url = Url::parse(src).map_err(|error| Error::InvalidUrl {
        error,
        url: src.to_owned(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::UnsupportedScheme { url });
    }
    Ok(url)
}

/// File name for the stored object, taken from the last URL path segment.
pub fn file_name(url: &Url, hash: &blake3::Hash) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| {
            segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                        c
                    } else {
                        '-'
                    }
                })
                .collect::<String>()
        })
        .unwrap_or_default();
    let name = name.trim_matches(|c| c == '.' || c == '-');
    if name.is_empty() {
        hash.to_hex().to_string()
    } else {
        name.to_owned()
    }
}

impl<A: AssetStore> MediaResolver for HttpMediaResolver<A> {
    async fn resolve(&self, src: &str) -> Result<AssetRef, Error> {
        let url = parse_url(src)?;
        let fetch_error = |error| Error::Fetch {
            error,
            url: url.clone(),
        };
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;
        trace!(%url, size = body.len(), "downloaded image");

        let hash = blake3::hash(&body);
        let name = file_name(&url, &hash);
        let content_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        let path = PathBuf::from(hash.to_hex().as_str()).join(&name);
        self.store
            .put(&path, &content_type, &body)
            .await
            .map_err(|error| Error::Store {
                path: path.clone(),
                detail: error.to_string(),
            })?;
        debug!(%url, path = %path.display(), "stored image");
        Ok(AssetRef {
            hash,
            path,
            content_type,
            size: body.len() as _,
            source: url,
        })
    }
}

/// Writes assets below a local directory.
pub struct LocalDirStore {
    dir: PathBuf,
}

impl LocalDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AssetStore for LocalDirStore {
    type Error = std::io::Error;

    async fn put(&self, path: &Path, _content_type: &str, content: &[u8]) -> Result<(), Self::Error> {
        let path = self.dir.join(path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }
}
