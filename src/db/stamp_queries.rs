use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::extraction::{MergedExtraction, StampColor, Theme};
use crate::models::stamp::{NewStamp, Stamp};

const STAMP_COLUMNS: &str = "id, name, image_path, scott_number, scott_number_confidence, \
     face_value, face_value_confidence, theme, theme_confidence, dominant_colors, \
     colors_confidence, needs_review, created_at, updated_at";

fn stamp_from_row(row: &PgRow) -> Result<Stamp, StoreError> {
    let theme: Option<String> = row.try_get("theme")?;
    let theme = theme
        .map(|t| {
            Theme::from_str(&t).map_err(|_| StoreError::Corrupt(format!("unknown theme '{t}'")))
        })
        .transpose()?;

    let colors: Vec<String> = row.try_get("dominant_colors")?;
    let dominant_colors = colors
        .iter()
        .map(|c| {
            StampColor::from_str(c).map_err(|_| StoreError::Corrupt(format!("unknown color '{c}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stamp {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        image_path: row.try_get("image_path")?,
        scott_number: row.try_get("scott_number")?,
        scott_number_confidence: row.try_get("scott_number_confidence")?,
        face_value: row.try_get("face_value")?,
        face_value_confidence: row.try_get("face_value_confidence")?,
        theme,
        theme_confidence: row.try_get("theme_confidence")?,
        dominant_colors,
        colors_confidence: row.try_get("colors_confidence")?,
        needs_review: row.try_get("needs_review")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Register a stamp whose image is already stored
pub async fn create_stamp(pool: &PgPool, stamp: &NewStamp) -> Result<Stamp, StoreError> {
    let row = sqlx::query(&format!(
        "INSERT INTO stamps (name, image_path) VALUES ($1, $2) RETURNING {STAMP_COLUMNS}"
    ))
    .bind(&stamp.name)
    .bind(&stamp.image_path)
    .fetch_one(pool)
    .await?;

    stamp_from_row(&row)
}

/// Get a stamp by ID
pub async fn get_stamp(pool: &PgPool, stamp_id: Uuid) -> Result<Option<Stamp>, StoreError> {
    let row = sqlx::query(&format!("SELECT {STAMP_COLUMNS} FROM stamps WHERE id = $1"))
        .bind(stamp_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(stamp_from_row).transpose()
}

/// Write merged extraction fields onto a stamp
pub async fn update_extraction_fields(
    pool: &PgPool,
    stamp_id: Uuid,
    extraction: &MergedExtraction,
) -> Result<Stamp, StoreError> {
    let colors: Vec<String> = extraction.colors.iter().map(|c| c.to_string()).collect();

    let row = sqlx::query(&format!(
        r#"
        UPDATE stamps
        SET scott_number = $2,
            scott_number_confidence = $3,
            face_value = $4,
            face_value_confidence = $5,
            theme = $6,
            theme_confidence = $7,
            dominant_colors = $8,
            colors_confidence = $9,
            needs_review = $10,
            name = COALESCE(name, $11),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {STAMP_COLUMNS}
        "#
    ))
    .bind(stamp_id)
    .bind(&extraction.scott_number)
    .bind(extraction.scott_number_confidence)
    .bind(&extraction.face_value)
    .bind(extraction.face_value_confidence)
    .bind(extraction.theme.map(|t| t.to_string()))
    .bind(extraction.theme_confidence)
    .bind(&colors)
    .bind(extraction.colors_confidence)
    .bind(extraction.needs_review)
    .bind(&extraction.name)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => stamp_from_row(&row),
        None => Err(StoreError::NotFound {
            entity: "stamp",
            id: stamp_id,
        }),
    }
}
