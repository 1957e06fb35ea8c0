//! Transaction-aware options operations.
//!
//! Each function takes an open SQLite transaction so a read-or-create, or a
//! replace, is atomic: either the whole block is committed or nothing is.

use chrono::{DateTime, Utc};
use egm_core::{DeviceOptions, OptionsKey};
use sqlx::{Sqlite, Transaction};

use crate::error::StorageResult;

/// One `device_options` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OptionsRow {
    pub render_target: String,
    pub activation_time: Option<DateTime<Utc>>,
}

impl From<OptionsRow> for DeviceOptions {
    fn from(row: OptionsRow) -> Self {
        DeviceOptions {
            render_target: row.render_target,
            activation_time: row.activation_time,
        }
    }
}

/// Read the block for `key`, if present.
pub async fn find_options(
    tx: &mut Transaction<'_, Sqlite>,
    key: &OptionsKey,
) -> StorageResult<Option<DeviceOptions>> {
    let row = sqlx::query_as::<_, OptionsRow>(
        r#"
        SELECT render_target, activation_time
        FROM device_options
        WHERE block_name = ? AND device_index = ?
        "#,
    )
    .bind(&key.block_name)
    .bind(i64::from(key.device_index))
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(DeviceOptions::from))
}

/// Insert `options` unless a block for `key` already exists.
///
/// Returns whether a row was written.
pub async fn insert_options_if_absent(
    tx: &mut Transaction<'_, Sqlite>,
    key: &OptionsKey,
    options: &DeviceOptions,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO device_options (
            block_name, device_index, render_target, activation_time, updated_at
        )
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&key.block_name)
    .bind(i64::from(key.device_index))
    .bind(&options.render_target)
    .bind(options.activation_time)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the block for `key`. An activation time already stored is kept.
pub async fn upsert_options(
    tx: &mut Transaction<'_, Sqlite>,
    key: &OptionsKey,
    options: &DeviceOptions,
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO device_options (
            block_name, device_index, render_target, activation_time, updated_at
        )
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (block_name, device_index) DO UPDATE SET
            render_target = excluded.render_target,
            activation_time = COALESCE(device_options.activation_time, excluded.activation_time),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&key.block_name)
    .bind(i64::from(key.device_index))
    .bind(&options.render_target)
    .bind(options.activation_time)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
