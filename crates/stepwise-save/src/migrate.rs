//! Save migrations: a registry of version-to-version transforms walked
//! until a document reaches the target version.
//!
//! Migrations operate on raw [`Value`]s, since an old document does not
//! parse as the current [`SaveDocument`]. The registry is keyed by source
//! version; every migration must strictly advance the version, so a walk
//! always terminates.

use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use stepwise_core::Value;

use crate::error::SaveError;
use crate::format::{SaveDocument, SAVE_FORMAT_VERSION};

/// Boxed migration function.
pub type MigrateFn = Box<dyn Fn(Value) -> Result<Value, SaveError> + Send + Sync>;

/// One registered migration.
pub struct Migration {
    from_version: u32,
    to_version: u32,
    description: String,
    migrate: MigrateFn,
}

impl Migration {
    /// A migration from `from_version` to `to_version`.
    ///
    /// `migrate` receives the document produced by the previous step and
    /// must return one whose `version` field equals `to_version`.
    pub fn new<F>(
        from_version: u32,
        to_version: u32,
        description: impl Into<String>,
        migrate: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value, SaveError> + Send + Sync + 'static,
    {
        Self {
            from_version,
            to_version,
            description: description.into(),
            migrate: Box::new(migrate),
        }
    }

    /// Source version.
    pub fn from_version(&self) -> u32 {
        self.from_version
    }

    /// Target version.
    pub fn to_version(&self) -> u32 {
        self.to_version
    }

    /// Human-readable summary.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// What a migration walk did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version the document was loaded at.
    pub original_version: u32,
    /// Version after migration.
    pub final_version: u32,
    /// Descriptions of each applied migration, in order.
    pub step_descriptions: Vec<String>,
}

impl MigrationReport {
    /// Number of migrations applied.
    pub fn steps_applied(&self) -> usize {
        self.step_descriptions.len()
    }
}

/// Validated set of migrations, keyed by source version.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, Migration>,
}

impl MigrationRegistry {
    /// Build a registry.
    ///
    /// Rejects two migrations from the same version, and any migration
    /// whose target does not exceed its source.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, SaveError> {
        let mut by_version = BTreeMap::new();
        for migration in migrations {
            if migration.to_version <= migration.from_version {
                return Err(SaveError::NonAdvancingMigration {
                    from: migration.from_version,
                    to: migration.to_version,
                });
            }
            let from_version = migration.from_version;
            if by_version.insert(from_version, migration).is_some() {
                return Err(SaveError::DuplicateMigration { from_version });
            }
        }
        Ok(Self {
            migrations: by_version,
        })
    }

    /// The migrations shipped with this save format.
    pub fn builtin() -> Self {
        let mut migrations = BTreeMap::new();
        migrations.insert(
            0,
            Migration::new(
                0,
                1,
                "rename queue to commandQueue and add prd",
                migrate_v0_to_v1,
            ),
        );
        Self { migrations }
    }

    /// Migration registered from `version`.
    pub fn get(&self, version: u32) -> Option<&Migration> {
        self.migrations.get(&version)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether no migration is registered.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Walk `document` forward until it reaches `target_version`.
    pub fn migrate(
        &self,
        mut document: Value,
        target_version: u32,
    ) -> Result<(Value, MigrationReport), SaveError> {
        let original_version = detect_version(&document)?;
        if original_version > target_version {
            return Err(SaveError::UnsupportedVersion {
                found: original_version,
                supported: target_version,
            });
        }

        let mut version = original_version;
        let mut step_descriptions = Vec::new();
        while version < target_version {
            let migration = self
                .migrations
                .get(&version)
                .filter(|m| m.to_version <= target_version)
                .ok_or(SaveError::NoMigrationPath {
                    from: version,
                    to: target_version,
                })?;
            document = (migration.migrate)(document)?;
            let found = detect_version(&document).ok();
            if found != Some(migration.to_version) {
                return Err(SaveError::MigrationDidNotAdvance {
                    from: version,
                    expected: migration.to_version,
                    found,
                });
            }
            info!(
                from = version,
                to = migration.to_version,
                description = %migration.description,
                "applied save migration"
            );
            step_descriptions.push(migration.description.clone());
            version = migration.to_version;
        }

        Ok((
            document,
            MigrationReport {
                original_version,
                final_version: version,
                step_descriptions,
            },
        ))
    }
}

/// Read the `version` field of a raw document.
pub fn detect_version(document: &Value) -> Result<u32, SaveError> {
    document
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(SaveError::UndetectableVersion)
}

// ── loading ────────────────────────────────────────────────────────

/// Options for [`load_save`].
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Version to migrate to. Default: [`SAVE_FORMAT_VERSION`].
    pub target_version: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target_version: SAVE_FORMAT_VERSION,
        }
    }
}

/// A parsed save plus the migrations that produced it.
#[derive(Clone, Debug)]
pub struct LoadedSave {
    /// The migrated document.
    pub document: SaveDocument,
    /// Migration trail.
    pub report: MigrationReport,
}

/// Migrate a raw document and parse it.
pub fn load_save(
    raw: Value,
    registry: &MigrationRegistry,
    options: &LoadOptions,
) -> Result<LoadedSave, SaveError> {
    let (value, report) = registry.migrate(raw, options.target_version)?;
    let document = SaveDocument::from_value(&value)?;
    Ok(LoadedSave { document, report })
}

fn migrate_v0_to_v1(mut document: Value) -> Result<Value, SaveError> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| SaveError::MigrationFailed {
            from: 0,
            reason: "document is not an object".into(),
        })?;
    if let Some(queue) = object.remove("queue") {
        object.insert("commandQueue".into(), queue);
    }
    object
        .entry("prd".to_owned())
        .or_insert_with(Value::empty_object);
    object.insert("version".into(), Value::from(1u32));
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(version: u32) -> Value {
        Value::object([("version", Value::from(version))])
    }

    fn bump(from: u32, to: u32) -> Migration {
        Migration::new(from, to, format!("v{from} to v{to}"), move |mut v: Value| {
            v.insert("version", Value::from(to));
            Ok(v)
        })
    }

    // ── registry construction ──────────────────────────────────

    #[test]
    fn duplicate_source_versions_are_rejected() {
        let result = MigrationRegistry::new(vec![bump(0, 1), bump(0, 2)]);
        assert!(matches!(
            result,
            Err(SaveError::DuplicateMigration { from_version: 0 })
        ));
    }

    #[test]
    fn non_advancing_migrations_are_rejected() {
        let result = MigrationRegistry::new(vec![bump(2, 2)]);
        assert!(matches!(
            result,
            Err(SaveError::NonAdvancingMigration { from: 2, to: 2 })
        ));
    }

    // ── walking ────────────────────────────────────────────────

    #[test]
    fn chains_in_order() {
        let registry = MigrationRegistry::new(vec![bump(1, 3), bump(0, 1), bump(3, 4)]).unwrap();
        let (value, report) = registry.migrate(doc(0), 4).unwrap();
        assert_eq!(detect_version(&value).unwrap(), 4);
        assert_eq!(report.original_version, 0);
        assert_eq!(report.final_version, 4);
        assert_eq!(
            report.step_descriptions,
            vec!["v0 to v1", "v1 to v3", "v3 to v4"]
        );
    }

    #[test]
    fn current_version_is_a_no_op() {
        let registry = MigrationRegistry::default();
        let (_, report) = registry.migrate(doc(3), 3).unwrap();
        assert_eq!(report.steps_applied(), 0);
    }

    #[test]
    fn each_step_sees_the_previous_output() {
        let registry = MigrationRegistry::new(vec![
            Migration::new(0, 1, "add a", |mut v: Value| {
                v.insert("a", Value::from(1.0));
                v.insert("version", Value::from(1u32));
                Ok(v)
            }),
            Migration::new(1, 2, "double a", |mut v: Value| {
                let a = v.get("a").and_then(Value::as_f64).unwrap_or(0.0);
                v.insert("a", Value::from(a * 2.0));
                v.insert("version", Value::from(2u32));
                Ok(v)
            }),
        ])
        .unwrap();
        let (value, _) = registry.migrate(doc(0), 2).unwrap();
        assert_eq!(value.get("a").and_then(Value::as_f64), Some(2.0));
    }

    #[test]
    fn missing_version_is_an_error() {
        let registry = MigrationRegistry::default();
        assert!(matches!(
            registry.migrate(Value::empty_object(), 1),
            Err(SaveError::UndetectableVersion)
        ));
        assert!(matches!(
            registry.migrate(Value::object([("version", Value::from("1"))]), 1),
            Err(SaveError::UndetectableVersion)
        ));
    }

    #[test]
    fn gap_in_chain_is_no_migration_path() {
        let registry = MigrationRegistry::new(vec![bump(0, 1)]).unwrap();
        assert!(matches!(
            registry.migrate(doc(0), 2),
            Err(SaveError::NoMigrationPath { from: 1, to: 2 })
        ));
    }

    #[test]
    fn overshooting_migration_is_no_migration_path() {
        let registry = MigrationRegistry::new(vec![bump(0, 3)]).unwrap();
        assert!(matches!(
            registry.migrate(doc(0), 2),
            Err(SaveError::NoMigrationPath { from: 0, to: 2 })
        ));
    }

    #[test]
    fn newer_documents_are_rejected() {
        let registry = MigrationRegistry::default();
        assert!(matches!(
            registry.migrate(doc(5), 1),
            Err(SaveError::UnsupportedVersion {
                found: 5,
                supported: 1
            })
        ));
    }

    #[test]
    fn identity_migration_did_not_set_the_expected_version() {
        let registry =
            MigrationRegistry::new(vec![Migration::new(0, 1, "forgot", |v: Value| Ok(v))]).unwrap();
        let err = registry.migrate(doc(0), 1).unwrap_err();
        assert!(err.to_string().contains("did not set the expected version"));
    }

    #[test]
    fn builtin_v0_migration_renames_queue() {
        let v0 = Value::object([
            ("version", Value::from(0u32)),
            ("queue", Value::Array(Vec::new())),
        ]);
        let (value, report) = MigrationRegistry::builtin().migrate(v0, 1).unwrap();
        assert_eq!(report.steps_applied(), 1);
        assert!(value.get("queue").is_none());
        assert!(value.get("commandQueue").is_some());
        assert_eq!(value.get("prd"), Some(&Value::empty_object()));
    }
}
