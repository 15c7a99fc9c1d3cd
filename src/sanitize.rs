//! RawRow → SanitizedRow projection.
//!
//! Pure and deterministic: no network or repository access. Missing columns
//! become empty strings.

use std::sync::LazyLock;

use serde::Serialize;

use crate::{
    config::Columns,
    html,
    media::AssetRef,
    reader::RawRow,
    repository::{Status, TermId},
};

static NON_SLUG_CHARS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^\p{L}\p{N}]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SanitizedRow {
    pub label: String,
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
    pub status: Status,
    pub slug: String,
    pub image_url: String,
    pub parent_category: String,
    pub sub_category: String,

    // attached by the importer
    pub content_type: String,
    pub term_ids: Vec<TermId>,
    pub media: Option<AssetRef>,
}

impl SanitizedRow {
    /// Business key, or `None` when the row has no `group_id`.
    pub fn business_key(&self) -> Option<&str> {
        Some(self.group_id.as_str()).filter(|key| !key.is_empty())
    }
}

fn field<'r>(row: &'r RawRow, column: &str) -> &'r str {
    row.get(column).map(String::as_str).unwrap_or_default()
}

/// Lower-case, hyphen separated slug. Unicode letters and digits survive.
pub fn slugify(text: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_owned()
}

/// Normalise a link to an absolute http(s) URL. Unusable input yields an
/// empty string.
pub fn normalize_url(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value.contains(char::is_whitespace) {
        return String::new();
    }
    let parsed = match url::Url::parse(value) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(&format!("http://{value}")),
        Err(error) => Err(error),
    };
    match parsed {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            url.to_string()
        }
        _ => String::new(),
    }
}

pub fn sanitize(row: &RawRow, columns: &Columns) -> SanitizedRow {
    let title = html::sanitize(field(row, &columns.title));
    let slug = match slugify(field(row, &columns.slug)) {
        slug if slug.is_empty() => slugify(&html::strip_tags(&title)),
        slug => slug,
    };
    SanitizedRow {
        label: field(row, &columns.category).trim().to_owned(),
        long_description: html::sanitize(field(row, &columns.long_description)),
        short_description: html::sanitize(field(row, &columns.short_description)),
        embed_code_1: field(row, &columns.embed_code_1).trim().to_owned(),
        embed_code_2: field(row, &columns.embed_code_2).trim().to_owned(),
        seo_title: html::strip_tags(field(row, &columns.seo_title)),
        seo_description: html::strip_tags(field(row, &columns.seo_description)),
        seo_keyword: html::strip_tags(field(row, &columns.seo_keyword)),
        group_id: html::strip_tags(field(row, &columns.group_id)),
        buy_link: normalize_url(field(row, &columns.buy_link)),
        status: Status::parse_lenient(field(row, &columns.status)),
        image_url: field(row, &columns.image).trim().to_owned(),
        parent_category: html::strip_tags(field(row, &columns.parent_category)),
        sub_category: html::strip_tags(field(row, &columns.sub_category)),
        title,
        slug,
        ..Default::default()
    }
}
