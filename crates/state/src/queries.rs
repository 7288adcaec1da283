//! Runtime SQL queries

use chrono::{DateTime, Utc};
use sideload_errors::{Error, StateError};
use sideload_types::{Account, InstalledApp, SigningCredential};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row, Sqlite, Transaction};

const INSTALLED_COLUMNS: &str = "identifier, name, version, resigned_identifier, \
     installed_at, refreshed_at, expires_at, download_url";

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, Error> {
    let millis: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StateError::Corrupted {
            message: format!("{column} out of range: {millis}"),
        }
        .into()
    })
}

fn installed_from_row(row: &SqliteRow) -> Result<InstalledApp, Error> {
    Ok(InstalledApp {
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        resigned_identifier: row.try_get("resigned_identifier")?,
        installed_date: timestamp(row, "installed_at")?,
        refreshed_date: timestamp(row, "refreshed_at")?,
        expiration_date: timestamp(row, "expires_at")?,
        download_url: row.try_get("download_url")?,
    })
}

pub async fn get_installed_app(
    tx: &mut Transaction<'_, Sqlite>,
    identifier: &str,
) -> Result<Option<InstalledApp>, Error> {
    let row = query(&format!(
        "SELECT {INSTALLED_COLUMNS} FROM installed_apps WHERE identifier = ?1"
    ))
    .bind(identifier)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(installed_from_row).transpose()
}

pub async fn installed_app_exists(
    tx: &mut Transaction<'_, Sqlite>,
    identifier: &str,
) -> Result<bool, Error> {
    let row = query("SELECT 1 FROM installed_apps WHERE identifier = ?1")
        .bind(identifier)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

/// Insert or replace, keeping the original install date of an existing row
pub async fn upsert_installed_app(
    tx: &mut Transaction<'_, Sqlite>,
    app: &InstalledApp,
) -> Result<(), Error> {
    query(
        "INSERT INTO installed_apps
            (identifier, name, version, resigned_identifier,
             installed_at, refreshed_at, expires_at, download_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(identifier) DO UPDATE SET
            name = excluded.name,
            version = excluded.version,
            resigned_identifier = excluded.resigned_identifier,
            refreshed_at = excluded.refreshed_at,
            expires_at = excluded.expires_at,
            download_url = excluded.download_url",
    )
    .bind(&app.identifier)
    .bind(&app.name)
    .bind(&app.version)
    .bind(&app.resigned_identifier)
    .bind(app.installed_date.timestamp_millis())
    .bind(app.refreshed_date.timestamp_millis())
    .bind(app.expiration_date.timestamp_millis())
    .bind(&app.download_url)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_installed_app(
    tx: &mut Transaction<'_, Sqlite>,
    identifier: &str,
) -> Result<bool, Error> {
    let result = query("DELETE FROM installed_apps WHERE identifier = ?1")
        .bind(identifier)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_installed_apps(
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<Vec<InstalledApp>, Error> {
    let rows = query(&format!(
        "SELECT {INSTALLED_COLUMNS} FROM installed_apps ORDER BY expires_at, identifier"
    ))
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(installed_from_row).collect()
}

pub async fn get_credential(
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<Option<SigningCredential>, Error> {
    let row = query(
        "SELECT email, team_identifier, certificate_identifier, private_key
         FROM account WHERE id = 1",
    )
    .fetch_optional(&mut **tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(SigningCredential {
        account: Account {
            email: row.try_get("email")?,
            team_identifier: row.try_get("team_identifier")?,
        },
        certificate_identifier: row.try_get("certificate_identifier")?,
        private_key: row.try_get("private_key")?,
    }))
}

pub async fn save_credential(
    tx: &mut Transaction<'_, Sqlite>,
    credential: &SigningCredential,
) -> Result<(), Error> {
    query(
        "INSERT OR REPLACE INTO account
            (id, email, team_identifier, certificate_identifier, private_key, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&credential.account.email)
    .bind(&credential.account.team_identifier)
    .bind(&credential.certificate_identifier)
    .bind(&credential.private_key)
    .bind(Utc::now().timestamp())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn clear_credential(tx: &mut Transaction<'_, Sqlite>) -> Result<(), Error> {
    query("DELETE FROM account").execute(&mut **tx).await?;
    Ok(())
}
