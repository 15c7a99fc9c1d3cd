use std::str::FromStr as _;

use indexmap::IndexMap;
use sqlx::{FromRow, SqliteConnection};
use tracing::{debug, error};

use crate::{
    media::{self, AssetRef},
    repository::{self, GROUP_ID, ItemId, NewItem, TermId},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("failed to encode asset reference: {0}")]
    EncodeAsset(serde_json::Error),
}

const DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS items(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_type TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        excerpt TEXT NOT NULL,
        status TEXT NOT NULL,
        slug TEXT NOT NULL,
        featured_media TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS item_meta(
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY(item_id, key)
    );

    CREATE INDEX IF NOT EXISTS item_meta_lookup ON item_meta(key, value);

    CREATE TABLE IF NOT EXISTS terms(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        taxonomy TEXT NOT NULL,
        name TEXT NOT NULL,
        parent INTEGER REFERENCES terms(id),
        UNIQUE(taxonomy, name)
    );

    CREATE TABLE IF NOT EXISTS item_terms(
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        taxonomy TEXT NOT NULL,
        term_id INTEGER NOT NULL REFERENCES terms(id),
        position INTEGER NOT NULL,
        PRIMARY KEY(item_id, term_id)
    );

    CREATE TABLE IF NOT EXISTS assets(
        path TEXT NOT NULL PRIMARY KEY,
        content_type TEXT NOT NULL,
        content BLOB NOT NULL
    );
"#;

/// SQLite backed content store.
pub struct LocalDatabase {
    pool: sqlx::SqlitePool,
}

#[derive(Clone)]
pub struct Repository {
    pool: sqlx::SqlitePool,
}

pub struct AssetClient {
    pool: sqlx::SqlitePool,
}

/// Row of the `items` table.
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub id: ItemId,
    pub content_type: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub status: String,
    pub slug: String,
    pub featured_media: Option<String>,
}

impl StoredItem {
    pub fn featured_media(&self) -> Option<AssetRef> {
        self.featured_media
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

impl LocalDatabase {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open content db"))?
            .foreign_keys(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open content db"))?;
        sqlx::query(DDL)
            .execute(&pool)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to content db"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub fn repository(&self) -> Repository {
        Repository {
            pool: self.pool.clone(),
        }
    }

    pub fn asset_client(&self) -> AssetClient {
        AssetClient {
            pool: self.pool.clone(),
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn find_by_key(
    conn: &mut SqliteConnection,
    content_type: &str,
    key: &str,
) -> Result<Option<ItemId>, sqlx::Error> {
    if key.is_empty() {
        return Ok(None);
    }
    sqlx::query_scalar(
        r#"
        SELECT items.id
        FROM items
        JOIN item_meta ON item_meta.item_id = items.id
        WHERE items.content_type = ? AND item_meta.key = ? AND item_meta.value = ?
        ORDER BY items.id
        LIMIT 1
    "#,
    )
    .bind(content_type)
    .bind(GROUP_ID)
    .bind(key)
    .fetch_optional(conn)
    .await
}

async fn insert_item(conn: &mut SqliteConnection, item: &NewItem) -> Result<ItemId, sqlx::Error> {
    let now = now();
    let result = sqlx::query(
        r#"
        INSERT INTO items(content_type, title, body, excerpt, status, slug, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#,
    )
    .bind(&item.content_type)
    .bind(&item.title)
    .bind(&item.body)
    .bind(&item.excerpt)
    .bind(item.status.as_str())
    .bind(&item.slug)
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;
    Ok(ItemId(result.last_insert_rowid()))
}

async fn update_item(
    conn: &mut SqliteConnection,
    id: ItemId,
    item: &NewItem,
    update_title: bool,
) -> Result<(), sqlx::Error> {
    let statement = if update_title {
        r#"
        UPDATE items
        SET body = ?, excerpt = ?, status = ?, slug = ?, updated_at = ?, title = ?
        WHERE id = ?
    "#
    } else {
        r#"
        UPDATE items
        SET body = ?, excerpt = ?, status = ?, slug = ?, updated_at = ?
        WHERE id = ?
    "#
    };
    let query = sqlx::query(statement)
        .bind(&item.body)
        .bind(&item.excerpt)
        .bind(item.status.as_str())
        .bind(&item.slug)
        .bind(now());
    let query = if update_title {
        query.bind(&item.title)
    } else {
        query
    };
    let result = query.bind(id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

async fn put_meta(
    conn: &mut SqliteConnection,
    id: ItemId,
    key: &str,
    value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO item_meta(item_id, key, value)
        VALUES (?, ?, ?)
        ON CONFLICT(item_id, key)
        DO UPDATE SET
            value = EXCLUDED.value
    "#,
    )
    .bind(id)
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

impl repository::ContentRepository for Repository {
    type Error = Error;

    async fn find_item_by_business_key(
        &self,
        content_type: &str,
        key: &str,
    ) -> Result<Option<ItemId>, Error> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_by_key(&mut conn, content_type, key).await?)
    }

    async fn create_item(&self, item: &NewItem) -> Result<ItemId, Error> {
        let mut conn = self.pool.acquire().await?;
        Ok(insert_item(&mut conn, item).await?)
    }

    async fn update_item(&self, id: ItemId, item: &NewItem, update_title: bool) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        Ok(update_item(&mut conn, id, item, update_title).await?)
    }

    async fn upsert(
        &self,
        key: Option<&str>,
        item: &NewItem,
        update_title: bool,
    ) -> Result<(ItemId, bool), Error> {
        let key = key.filter(|key| !key.is_empty());
        let mut tx = self.pool.begin().await?;
        let existing = match key {
            Some(key) => find_by_key(&mut tx, &item.content_type, key).await?,
            None => None,
        };
        let result = match existing {
            Some(id) => {
                update_item(&mut tx, id, item, update_title).await?;
                (id, false)
            }
            None => {
                let id = insert_item(&mut tx, item).await?;
                if let Some(key) = key {
                    put_meta(&mut tx, id, GROUP_ID, key).await?;
                }
                (id, true)
            }
        };
        tx.commit().await?;
        debug!(
            item_id = %result.0,
            created = result.1,
            content_type = %item.content_type,
            "upserted item"
        );
        Ok(result)
    }

    async fn set_featured_media(&self, id: ItemId, asset: &AssetRef) -> Result<(), Error> {
        let asset = serde_json::to_string(asset).map_err(Error::EncodeAsset)?;
        sqlx::query("UPDATE items SET featured_media = ? WHERE id = ?")
            .bind(asset)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn assign_terms(&self, id: ItemId, taxonomy: &str, terms: &[TermId]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM item_terms WHERE item_id = ? AND taxonomy = ?")
            .bind(id)
            .bind(taxonomy)
            .execute(&mut *tx)
            .await?;
        for (position, term) in terms.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO item_terms(item_id, taxonomy, term_id, position)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(item_id, term_id) DO NOTHING
            "#,
            )
            .bind(id)
            .bind(taxonomy)
            .bind(term)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_metadata(&self, id: ItemId, key: &str, value: &str) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        Ok(put_meta(&mut conn, id, key, value).await?)
    }
}

impl repository::TermStore for Repository {
    type Error = Error;

    async fn find_term(&self, taxonomy: &str, name: &str) -> Result<Option<TermId>, Error> {
        Ok(
            sqlx::query_scalar("SELECT id FROM terms WHERE taxonomy = ? AND name = ?")
                .bind(taxonomy)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_term(
        &self,
        taxonomy: &str,
        name: &str,
        parent: Option<TermId>,
    ) -> Result<TermId, Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO terms(taxonomy, name, parent)
            VALUES (?, ?, ?)
            ON CONFLICT(taxonomy, name) DO NOTHING
        "#,
        )
        .bind(taxonomy)
        .bind(name)
        .bind(parent)
        .execute(&mut *tx)
        .await?;
        let id = sqlx::query_scalar("SELECT id FROM terms WHERE taxonomy = ? AND name = ?")
            .bind(taxonomy)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(id)
    }
}

/// Read side used by reports and tests.
impl Repository {
    pub async fn item(&self, id: ItemId) -> Result<Option<StoredItem>, Error> {
        Ok(sqlx::query_as::<_, StoredItem>(
            r#"
            SELECT id, content_type, title, body, excerpt, status, slug, featured_media
            FROM items
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn count_items(&self) -> Result<i64, Error> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn metadata(&self, id: ItemId) -> Result<IndexMap<String, String>, Error> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM item_meta WHERE item_id = ? ORDER BY key",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Term names assigned to an item, in assignment order.
    pub async fn item_terms(&self, id: ItemId) -> Result<Vec<(String, String)>, Error> {
        Ok(sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT item_terms.taxonomy, terms.name
            FROM item_terms
            JOIN terms ON terms.id = item_terms.term_id
            WHERE item_terms.item_id = ?
            ORDER BY item_terms.taxonomy, item_terms.position
        "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn term_parent(&self, taxonomy: &str, name: &str) -> Result<Option<String>, Error> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT parent_terms.name
            FROM terms
            JOIN terms AS parent_terms ON parent_terms.id = terms.parent
            WHERE terms.taxonomy = ? AND terms.name = ?
        "#,
        )
        .bind(taxonomy)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn count_terms(&self) -> Result<i64, Error> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM terms")
            .fetch_one(&self.pool)
            .await?)
    }
}

impl media::AssetStore for AssetClient {
    type Error = sqlx::Error;

    async fn put(
        &self,
        path: &std::path::Path,
        content_type: &str,
        content: &[u8],
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO assets(path, content_type, content)
            VALUES (?, ?, ?)
            ON CONFLICT(path)
            DO UPDATE SET
                content_type = EXCLUDED.content_type,
                content = EXCLUDED.content
        "#,
        )
        .bind(path.display().to_string())
        .bind(content_type)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
