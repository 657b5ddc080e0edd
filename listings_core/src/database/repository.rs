use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::database::models::{Listing, ListingInput, Review, ReviewInput};
use crate::error::{AppError, Result};

fn parse_time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Failed to parse {}: {}", column, e)))
}

#[derive(Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
}

impl ListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn listing_from_row(row: &SqliteRow) -> Result<Listing> {
        Ok(Listing {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            price: row.try_get("price")?,
            location: row.try_get("location")?,
            country: row.try_get("country")?,
            owner_id: row.try_get("owner_id")?,
            owner_username: row.try_get("owner_username")?,
            created_at: parse_time(row, "created_at")?,
        })
    }

    pub async fn create(&self, input: &ListingInput, owner_id: i64) -> Result<Listing> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO listings (title, description, image_url, price, location, country, owner_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.price)
        .bind(&input.location)
        .bind(&input.country)
        .bind(owner_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::Database("Listing vanished after insert".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query(
            r#"
            SELECT l.id, l.title, l.description, l.image_url, l.price, l.location, l.country,
                   l.owner_id, u.username AS owner_username, l.created_at
            FROM listings l
            LEFT JOIN users u ON u.id = l.owner_id
            WHERE l.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::listing_from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Listing>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.title, l.description, l.image_url, l.price, l.location, l.country,
                   l.owner_id, u.username AS owner_username, l.created_at
            FROM listings l
            LEFT JOIN users u ON u.id = l.owner_id
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::listing_from_row).collect()
    }
}

#[derive(Clone)]
pub struct ReviewRepository {
    pool: SqlitePool,
}

impl ReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn review_from_row(row: &SqliteRow) -> Result<Review> {
        Ok(Review {
            id: row.try_get("id")?,
            listing_id: row.try_get("listing_id")?,
            author_id: row.try_get("author_id")?,
            author_username: row.try_get("author_username")?,
            rating: row.try_get("rating")?,
            comment: row.try_get("comment")?,
            created_at: parse_time(row, "created_at")?,
        })
    }

    pub async fn create(&self, listing_id: i64, input: &ReviewInput, author_id: i64) -> Result<Review> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO reviews (listing_id, author_id, rating, comment, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(listing_id)
        .bind(author_id)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Review {
            id: result.last_insert_rowid(),
            listing_id,
            author_id: Some(author_id),
            author_username: None,
            rating: input.rating,
            comment: input.comment.clone(),
            created_at: now,
        })
    }

    pub async fn list_for_listing(&self, listing_id: i64) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.listing_id, r.author_id, u.username AS author_username,
                   r.rating, r.comment, r.created_at
            FROM reviews r
            LEFT JOIN users u ON u.id = r.author_id
            WHERE r.listing_id = ?
            ORDER BY r.created_at, r.id
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::review_from_row).collect()
    }
}
