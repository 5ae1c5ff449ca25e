//! Schema migrations for the items database.
//!
//! Migrations are plain SQL files named `NNN_description.sql` in a single
//! directory and are applied in filename order. Applied filenames are
//! recorded in the `schema_migrations` table, which is what makes re-running
//! safe: a recorded migration is never applied again.
//!
//! Before each migration the database file is copied to
//! `<db-stem>_<migration-stem>.<db-ext>` next to it, so every pre-image can
//! be restored by hand. There are no down-migrations.
//!
//! The manager is strictly sequential and must finish before anything else
//! opens the database.

use std::{
  collections::BTreeSet,
  ffi::OsString,
  path::{Path, PathBuf},
};

use rusqlite::OpenFlags;

use crate::{
  Error, Result,
  schema::{TRACKING_SCHEMA, TRACKING_TABLE},
};

// ─── Migration ───────────────────────────────────────────────────────────────

/// A migration script discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
  filename: String,
  path:     PathBuf,
}

impl Migration {
  /// The file name, which is also the migration's identity.
  pub fn filename(&self) -> &str { &self.filename }

  pub fn path(&self) -> &Path { &self.path }

  /// File name without the `.sql` extension.
  pub fn stem(&self) -> &str {
    self.filename.strip_suffix(".sql").unwrap_or(&self.filename)
  }

  /// The numeric prefix, e.g. `1` for `001_add_unique_constraint.sql`.
  pub fn ordinal(&self) -> Option<u32> {
    self.stem().split('_').next()?.parse().ok()
  }

  /// The part after the numeric prefix, e.g. `add_unique_constraint`.
  pub fn description(&self) -> &str {
    self.stem().split_once('_').map_or("", |(_, rest)| rest)
  }
}

/// What [`MigrationManager::apply_all_pending`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
  /// Filenames applied during this run, in order.
  pub applied: Vec<String>,
  /// Backup files written during this run.
  pub backups: Vec<PathBuf>,
}

/// Whether any statement in `script` starts with a transaction keyword.
///
/// Splitting on `;` is naive; a trigger body ending in `END` also counts,
/// which only means the script is not wrapped.
fn manages_transactions(script: &str) -> bool {
  script.split(';').any(|stmt| {
    let first = stmt
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with("--"))
      .flat_map(str::split_whitespace)
      .next();
    first.is_some_and(|word| {
      ["BEGIN", "COMMIT", "END", "ROLLBACK"]
        .iter()
        .any(|kw| word.eq_ignore_ascii_case(kw))
    })
  })
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct MigrationManager {
  db_path:        PathBuf,
  migrations_dir: PathBuf,
}

impl MigrationManager {
  pub fn new(db_path: impl Into<PathBuf>, migrations_dir: impl Into<PathBuf>) -> Self {
    Self { db_path: db_path.into(), migrations_dir: migrations_dir.into() }
  }

  pub fn db_path(&self) -> &Path { &self.db_path }

  pub fn migrations_dir(&self) -> &Path { &self.migrations_dir }

  /// All `*.sql` files in the migrations directory, sorted by filename.
  pub async fn available(&self) -> Result<Vec<Migration>> {
    let dir_err = |source| Error::MigrationsDir { path: self.migrations_dir.clone(), source };

    let mut entries = tokio::fs::read_dir(&self.migrations_dir).await.map_err(dir_err)?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(dir_err)? {
      let path = entry.path();
      if path.extension().is_none_or(|ext| ext != "sql") {
        continue;
      }
      if !entry.file_type().await.map_err(dir_err)?.is_file() {
        continue;
      }
      let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
        tracing::warn!(?path, "skipping migration with a non UTF-8 file name");
        continue;
      };
      found.push(Migration { filename, path });
    }

    found.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(found)
  }

  /// Filenames recorded as applied.
  ///
  /// Empty when the database file or the tracking table does not exist yet.
  /// Never creates the database file.
  pub async fn applied(&self) -> Result<BTreeSet<String>> {
    let exists = tokio::fs::try_exists(&self.db_path)
      .await
      .map_err(|source| Error::DatabaseFile { path: self.db_path.clone(), source })?;
    if !exists {
      return Ok(BTreeSet::new());
    }

    let conn = tokio_rusqlite::Connection::open_with_flags(
      &self.db_path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;

    let applied = conn
      .call(|conn| {
        let tracked = conn
          .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
          .exists([TRACKING_TABLE])?;
        if !tracked {
          return Ok(BTreeSet::new());
        }

        let mut stmt = conn.prepare("SELECT filename FROM schema_migrations")?;
        let names = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
      })
      .await?;
    conn.close().await?;

    Ok(applied)
  }

  /// Available migrations not yet applied, in application order.
  pub async fn pending(&self) -> Result<Vec<Migration>> {
    let applied = self.applied().await?;
    Ok(
      self
        .available()
        .await?
        .into_iter()
        .filter(|m| !applied.contains(&m.filename))
        .collect(),
    )
  }

  /// Where the pre-image for `migration` is written.
  pub fn backup_path(&self, migration: &Migration) -> PathBuf {
    let mut name = OsString::from(
      self.db_path.file_stem().unwrap_or(self.db_path.as_os_str()),
    );
    name.push("_");
    name.push(migration.stem());
    if let Some(ext) = self.db_path.extension() {
      name.push(".");
      name.push(ext);
    }
    self.db_path.with_file_name(name)
  }

  /// Copy the database file aside before `migration` touches it.
  ///
  /// Returns the backup path, or `None` when there is no database yet.
  pub async fn backup(&self, migration: &Migration) -> Result<Option<PathBuf>> {
    let path = self.backup_path(migration);
    let backup_err = |source| Error::Backup {
      migration: migration.filename.clone(),
      path: path.clone(),
      source,
    };

    if !tokio::fs::try_exists(&self.db_path).await.map_err(backup_err)? {
      tracing::debug!(migration = migration.filename(), "no database file yet, nothing to back up");
      return Ok(None);
    }

    tokio::fs::copy(&self.db_path, &path)
      .await
      .map_err(backup_err)?;

    tracing::info!(migration = migration.filename(), backup = ?path, "database backed up");
    Ok(Some(path))
  }

  /// Run `migration`'s script and record it as applied.
  ///
  /// A script without its own `BEGIN`/`COMMIT` runs in one transaction
  /// together with its tracking record, so it is applied and recorded or
  /// neither.
  ///
  /// A script that controls its own transactions runs as a single batch and
  /// is recorded after it completes. A crash between its `COMMIT` and the
  /// record leaves it applied but unrecorded, and it runs again on the next
  /// start; such scripts must tolerate re-running. A script that leaves a
  /// transaction open is rolled back and reported as failed.
  pub async fn apply(&self, migration: &Migration) -> Result<()> {
    let script = tokio::fs::read_to_string(&migration.path)
      .await
      .map_err(|source| Error::ReadScript { path: migration.path.clone(), source })?;
    let filename = migration.filename.clone();
    let self_managed = manages_transactions(&script);

    let conn = tokio_rusqlite::Connection::open(&self.db_path).await?;
    let completed = conn
      .call(move |conn| {
        conn.execute_batch(TRACKING_SCHEMA)?;

        if !self_managed {
          let tx = conn.transaction()?;
          tx.execute_batch(&script)?;
          tx.execute(
            "INSERT INTO schema_migrations (filename) VALUES (?1)",
            [&filename],
          )?;
          tx.commit()?;
          return Ok(true);
        }

        conn.execute_batch(&script)?;
        if !conn.is_autocommit() {
          conn.execute_batch("ROLLBACK")?;
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO schema_migrations (filename) VALUES (?1)",
          [&filename],
        )?;
        Ok(true)
      })
      .await
      .map_err(|source| Error::Migration { migration: migration.filename.clone(), source })?;
    conn.close().await?;

    if !completed {
      return Err(Error::UnterminatedTransaction(migration.filename.clone()));
    }
    tracing::info!(migration = migration.filename(), "migration applied");
    Ok(())
  }

  async fn init_tracking(&self) -> Result<()> {
    let conn = tokio_rusqlite::Connection::open(&self.db_path).await?;
    conn
      .call(|conn| {
        conn.execute_batch(TRACKING_SCHEMA)?;
        Ok(())
      })
      .await?;
    conn.close().await?;
    Ok(())
  }

  /// Back up and apply every pending migration, in order.
  ///
  /// Stops at the first failure; earlier migrations stay applied and
  /// recorded, the failing one and everything after it do not.
  pub async fn apply_all_pending(&self) -> Result<MigrationReport> {
    self.init_tracking().await?;

    let pending = self.pending().await?;
    let mut report = MigrationReport::default();
    if pending.is_empty() {
      tracing::info!(db = ?self.db_path, "database schema is up to date");
      return Ok(report);
    }

    tracing::info!(db = ?self.db_path, count = pending.len(), "applying pending migrations");
    for migration in &pending {
      let backup = self.backup(migration).await.inspect_err(|e| {
        tracing::error!(migration = migration.filename(), error = %e, "backup failed, aborting migrations");
      })?;
      report.backups.extend(backup);

      self.apply(migration).await.inspect_err(|e| {
        tracing::error!(migration = migration.filename(), error = %e, "migration failed, aborting");
      })?;
      report.applied.push(migration.filename.clone());
    }

    Ok(report)
  }
}
