use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use reqopt_semver::Stability;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{select_latest, PackageRegistry, WritableRegistry};
use crate::error::{OptimizeError, Result};
use crate::package::{Link, Package, PackageId, Release, ReleaseId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS packages (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS package_versions (
        id INTEGER PRIMARY KEY,
        package_id INTEGER NOT NULL REFERENCES packages(id),
        version TEXT NOT NULL,
        normalized_version TEXT NOT NULL,
        stability TEXT NOT NULL,
        UNIQUE (package_id, normalized_version)
    );
    CREATE TABLE IF NOT EXISTS package_deps (
        id INTEGER PRIMARY KEY,
        package_id INTEGER NOT NULL REFERENCES packages(id),
        version_id INTEGER NOT NULL REFERENCES package_versions(id),
        name TEXT NOT NULL,
        constraints TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_package_deps_version ON package_deps(version_id);
    CREATE INDEX IF NOT EXISTS idx_package_deps_package ON package_deps(package_id);
";

/// Longest `IN (...)` list bound in one statement, well below SQLite's variable limit
const MAX_IN_LIST: usize = 500;

/// `?, ?, ?` for an `IN (...)` list of `count` values
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Package store backed by a SQLite database
pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {
    /// Opens (creating if needed) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening package store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn package_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn release_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM package_versions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Runs `SELECT DISTINCT name FROM package_deps WHERE <column> IN (...)`
    /// over `ids` in bounded chunks
    fn distinct_names(&self, column: &str, ids: &[i64]) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        for chunk in ids.chunks(MAX_IN_LIST) {
            let sql = format!(
                "SELECT DISTINCT name FROM package_deps WHERE {} IN ({})",
                column,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?;
            for name in rows {
                names.insert(name?);
            }
        }

        Ok(names)
    }
}

impl PackageRegistry for SqliteRegistry {
    fn latest_release(
        &self,
        name: &str,
        minimum_stability: Stability,
        constraint: &str,
    ) -> Result<Option<Release>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.id, v.package_id, v.version, v.normalized_version, v.stability
             FROM package_versions v
             INNER JOIN packages p ON p.id = v.package_id
             WHERE p.name = ?1
             ORDER BY v.id",
        )?;

        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (id, package_id, version, normalized, stability) = row?;
            let stability = Stability::from_str(&stability).map_err(|_| {
                OptimizeError::Registry(format!("Unknown stability {} for release {} of {}", stability, id, name))
            })?;
            candidates.push(Release {
                id: ReleaseId(id),
                package_id: PackageId(package_id),
                version,
                normalized,
                stability,
            });
        }

        log::trace!("{} has {} stored releases", name, candidates.len());
        Ok(select_latest(name, candidates, minimum_stability, constraint))
    }

    fn dependency_names(&self, releases: &[ReleaseId]) -> Result<BTreeSet<String>> {
        let ids: Vec<i64> = releases.iter().map(|id| id.0).collect();
        self.distinct_names("version_id", &ids)
    }

    fn package_dependency_names(&self, packages: &[PackageId]) -> Result<BTreeSet<String>> {
        let ids: Vec<i64> = packages.iter().map(|id| id.0).collect();
        self.distinct_names("package_id", &ids)
    }

    fn package_ids(&self, names: &[String]) -> Result<Vec<PackageId>> {
        let mut ids = Vec::new();

        for chunk in names.chunks(MAX_IN_LIST) {
            let sql = format!("SELECT id FROM packages WHERE name IN ({})", placeholders(chunk.len()));
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))?;
            for id in rows {
                ids.push(PackageId(id?));
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl WritableRegistry for SqliteRegistry {
    fn add_package(&mut self, name: &str) -> Result<Package> {
        self.conn.execute(
            "INSERT INTO packages (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id: i64 = self
            .conn
            .query_row("SELECT id FROM packages WHERE name = ?1", params![name], |row| row.get(0))?;

        Ok(Package {
            id: PackageId(id),
            name: name.to_string(),
        })
    }

    fn add_release(&mut self, package: &Package, version: &str, requires: &[Link]) -> Result<ReleaseId> {
        let release = Release::from_version(ReleaseId(0), package.id, &package.name, version)?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM package_versions WHERE package_id = ?1 AND normalized_version = ?2",
                params![package.id.0, release.normalized],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                self.conn
                    .execute("DELETE FROM package_deps WHERE version_id = ?1", params![id])?;
                id
            }
            None => {
                self.conn.execute(
                    "INSERT INTO package_versions (package_id, version, normalized_version, stability)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![package.id.0, release.version, release.normalized, release.stability.as_str()],
                )?;
                self.conn.last_insert_rowid()
            }
        };

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO package_deps (package_id, version_id, name, constraints) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for link in requires {
            stmt.execute(params![package.id.0, id, link.target, link.constraint])?;
        }

        Ok(ReleaseId(id))
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
