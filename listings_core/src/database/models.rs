use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_LISTING_IMAGE: &str =
    "https://images.unsplash.com/photo-1625505826533-5c80aca7d157?auto=format&fit=crop&w=800&q=60";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: i64,
    pub location: String,
    pub country: String,
    pub owner_id: Option<i64>,
    pub owner_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub listing_id: i64,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub rating: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Form body of `POST /listings`. Field names follow the `listing[...]` inputs
/// of the new-listing form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewListing {
    #[serde(rename = "listing[title]")]
    pub title: String,
    #[serde(rename = "listing[description]")]
    pub description: String,
    #[serde(rename = "listing[image]", default)]
    pub image_url: Option<String>,
    #[serde(rename = "listing[price]")]
    pub price: String,
    #[serde(rename = "listing[location]")]
    pub location: String,
    #[serde(rename = "listing[country]")]
    pub country: String,
}

/// Checked listing input, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: i64,
    pub location: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    #[serde(rename = "review[rating]")]
    pub rating: String,
    #[serde(rename = "review[comment]")]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    pub rating: i64,
    pub comment: String,
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("\"{}\" is not allowed to be empty", field)));
    }
    Ok(value.to_string())
}

impl NewListing {
    pub fn validate(&self) -> Result<ListingInput, AppError> {
        let price = self
            .price
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("\"listing.price\" must be a number".to_string()))?;
        if price < 0 {
            return Err(AppError::BadRequest(
                "\"listing.price\" must be greater than or equal to 0".to_string(),
            ));
        }

        let image_url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_LISTING_IMAGE)
            .to_string();

        Ok(ListingInput {
            title: required("listing.title", &self.title)?,
            description: required("listing.description", &self.description)?,
            image_url,
            price,
            location: required("listing.location", &self.location)?,
            country: required("listing.country", &self.country)?,
        })
    }
}

impl NewReview {
    pub fn validate(&self) -> Result<ReviewInput, AppError> {
        let rating = self
            .rating
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("\"review.rating\" must be a number".to_string()))?;
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest(
                "\"review.rating\" must be between 1 and 5".to_string(),
            ));
        }

        Ok(ReviewInput {
            rating,
            comment: required("review.comment", &self.comment)?,
        })
    }
}
