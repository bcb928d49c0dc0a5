//! # Settings Repository
//!
//! The singleton settings row (`id = 'default'`). It is created once with
//! defaults, updated in place, and never deleted.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use cellar_core::validation::validate_settings_patch;
use cellar_core::{CoreError, Settings, SettingsPatch, SETTINGS_ID};

use crate::error::DbResult;
use crate::pool::StoreHandle;
use crate::repository::rows::{SettingsRow, SETTINGS_COLUMNS};

/// Repository for store settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    store: StoreHandle,
}

impl SettingsRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        SettingsRepository { store }
    }

    /// Current settings. `SettingsNotFound` if the row is missing.
    pub async fn get(&self) -> DbResult<Settings> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        settings_in(&mut conn).await
    }

    /// Applies a partial update and returns the result.
    pub async fn update(&self, patch: SettingsPatch) -> DbResult<Settings> {
        validate_settings_patch(&patch)?;

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        let current = settings_in(&mut tx).await?;
        let updated = patch.apply(&current, now);

        sqlx::query(
            r#"
            UPDATE settings SET
                currency = ?2,
                scan_default_qty = ?3,
                low_stock_threshold = ?4,
                data_path = ?5,
                backup_path = ?6,
                theme = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&updated.id)
        .bind(&updated.currency)
        .bind(updated.scan_default_qty)
        .bind(updated.low_stock_threshold)
        .bind(&updated.data_path)
        .bind(&updated.backup_path)
        .bind(updated.theme)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(currency = %updated.currency, scan_default_qty = updated.scan_default_qty, "Settings updated");
        Ok(updated)
    }

    /// Creates the default row if it is missing. Idempotent.
    pub async fn ensure_default(&self) -> DbResult<Settings> {
        let _guard = self.store.locks.write().await;
        let mut conn = self.store.pool.acquire().await?;
        let defaults = Settings::defaults(self.store.clock.now());
        ensure_default_in(&mut conn, &defaults).await?;
        settings_in(&mut conn).await
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn settings_in(conn: &mut SqliteConnection) -> DbResult<Settings> {
    let sql = format!("SELECT {SETTINGS_COLUMNS} FROM settings WHERE id = ?");
    let row = sqlx::query_as::<_, SettingsRow>(&sql)
        .bind(SETTINGS_ID)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Settings::from)
        .ok_or_else(|| CoreError::SettingsNotFound.into())
}

/// Inserts `settings` unless a row already exists.
pub(crate) async fn ensure_default_in(
    conn: &mut SqliteConnection,
    settings: &Settings,
) -> DbResult<()> {
    let inserted = write_settings_in(conn, settings, true).await?;
    if inserted {
        debug!("Default settings created");
    }
    Ok(())
}

/// Inserts a full settings row. With `or_ignore` an existing row wins.
pub(crate) async fn write_settings_in(
    conn: &mut SqliteConnection,
    settings: &Settings,
    or_ignore: bool,
) -> DbResult<bool> {
    let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
    let sql = format!("{verb} INTO settings ({SETTINGS_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)");
    let result = sqlx::query(&sql)
        .bind(&settings.id)
        .bind(&settings.currency)
        .bind(settings.scan_default_qty)
        .bind(settings.low_stock_threshold)
        .bind(&settings.data_path)
        .bind(&settings.backup_path)
        .bind(settings.theme)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
