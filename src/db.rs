use std::collections::BTreeMap;

use anyhow::Context;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::dates::DateFormat;
use crate::models::CustomerRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Every stored record in insertion order, excluded ones included.
pub async fn fetch_records(pool: &PgPool) -> anyhow::Result<Vec<CustomerRecord>> {
    let rows = sqlx::query(
        "SELECT customer_id, name, email, satisfaction, loyalty, response_date, \
         date_format, attributes, excluded \
         FROM loyalty_segments.customer_records \
         ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let date_format: Option<String> = row.get("date_format");
        let date_format = date_format
            .as_deref()
            .map(DateFormat::parse)
            .transpose()
            .context("stored date format is not recognised")?;
        let Json(attributes): Json<BTreeMap<String, String>> = row.get("attributes");

        records.push(CustomerRecord {
            id: row.get("customer_id"),
            name: row.get("name"),
            email: row.get("email"),
            satisfaction: row.get("satisfaction"),
            loyalty: row.get("loyalty"),
            date: row.get("response_date"),
            date_format,
            attributes,
            excluded: row.get("excluded"),
        });
    }

    Ok(records)
}

/// Insert accepted records in one transaction. Returns the number written.
pub async fn insert_records(pool: &PgPool, records: &[CustomerRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO loyalty_segments.customer_records
            (entry_id, customer_id, name, email, satisfaction, loyalty,
             response_date, date_format, attributes, excluded)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.satisfaction)
        .bind(record.loyalty)
        .bind(&record.date)
        .bind(record.date_format.map(|f| f.as_str()))
        .bind(Json(&record.attributes))
        .bind(record.excluded)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert record '{}'", record.id))?;
    }

    tx.commit().await?;
    Ok(records.len())
}

/// Soft delete or restore every entry for a customer. Returns the rows touched.
pub async fn set_excluded(pool: &PgPool, customer_id: &str, excluded: bool) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "UPDATE loyalty_segments.customer_records SET excluded = $2 WHERE customer_id = $1",
    )
    .bind(customer_id)
    .bind(excluded)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
