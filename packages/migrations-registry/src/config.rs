//! Static configuration block describing every migration target.

use std::env;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::layout::MigrationOrganization;
use crate::services::ServiceCatalog;
use crate::target::{MigrationTarget, TableStorageOverrides};
use crate::tenant::{check_tenant_capability, CapabilityCheck, TenantRepositoryHandle};

pub const CONFIG_PATH_VAR: &str = "MIGRATIONS_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsConfig {
    #[serde(default, deserialize_with = "ordered_entries")]
    pub entity_managers: Vec<(String, TargetConfig)>,
}

impl MigrationsConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(raw)
            .map_err(|e| RegistryError::config(format!("invalid migrations configuration: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::config(format!("failed to read '{}': {e}", path.display()))
        })?;
        debug!("config=read path={} bytes={}", path.display(), raw.len());
        Self::from_json_str(&raw)
    }

    /// Loads the file named by `MIGRATIONS_CONFIG`.
    pub fn from_env() -> Result<Self, RegistryError> {
        let path = env::var(CONFIG_PATH_VAR).map_err(|_| {
            RegistryError::config(format!(
                "Required environment variable '{CONFIG_PATH_VAR}' is not set"
            ))
        })?;
        Self::from_path(Path::new(&path))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default, deserialize_with = "ordered_map")]
    pub migrations_paths: Vec<(String, String)>,
    #[serde(default)]
    pub migrations: Vec<String>,
    #[serde(default)]
    pub organize_migrations: OrganizeSetting,
    #[serde(default)]
    pub custom_template: Option<PathBuf>,
    #[serde(default)]
    pub all_or_nothing: bool,
    #[serde(default = "enabled")]
    pub check_database_platform: bool,
    #[serde(default)]
    pub multitenant: MultitenantConfig,
    #[serde(default, deserialize_with = "ordered_map")]
    pub services: Vec<(String, String)>,
    #[serde(default, deserialize_with = "ordered_map")]
    pub factories: Vec<(String, String)>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn enabled() -> bool {
    true
}

/// `false` or one of the organization names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrganizeSetting {
    Flag(bool),
    Named(String),
}

impl Default for OrganizeSetting {
    fn default() -> Self {
        OrganizeSetting::Flag(false)
    }
}

impl OrganizeSetting {
    fn resolve(&self) -> Result<Option<MigrationOrganization>, RegistryError> {
        match self {
            OrganizeSetting::Flag(false) => Ok(None),
            OrganizeSetting::Flag(true) => Err(RegistryError::config(
                "organize_migrations accepts false or a layout name, not true",
            )),
            OrganizeSetting::Named(name) => MigrationOrganization::parse(name),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultitenantConfig {
    #[serde(default)]
    pub repository: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub table_storage: TableStorageSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableStorageSection {
    pub table_name: Option<String>,
    pub version_column_name: Option<String>,
    pub version_column_length: Option<u32>,
    pub executed_at_column_name: Option<String>,
    pub execution_time_column_name: Option<String>,
}

impl TargetConfig {
    /// Produces the immutable target value; the tenant repository, if any, must
    /// resolve to a host service that can list tenants.
    pub fn into_target(
        self,
        name: &str,
        services: &dyn ServiceCatalog,
    ) -> Result<MigrationTarget, RegistryError> {
        let tenant_repository = match self.multitenant.repository {
            Some(service_id) => Some(tenant_repository(name, service_id, services)?),
            None => None,
        };
        let table = self.storage.table_storage;

        Ok(MigrationTarget {
            name: name.to_string(),
            migration_directories: self
                .migrations_paths
                .into_iter()
                .map(|(namespace, path)| (namespace, PathBuf::from(path)))
                .collect(),
            migration_classes: self.migrations,
            organize_migrations: self.organize_migrations.resolve()?,
            custom_template: self.custom_template,
            all_or_nothing: self.all_or_nothing,
            check_database_platform: self.check_database_platform,
            storage: TableStorageOverrides {
                table_name: table.table_name,
                version_column_name: table.version_column_name,
                version_column_length: table.version_column_length,
                executed_at_column_name: table.executed_at_column_name,
                execution_time_column_name: table.execution_time_column_name,
            },
            tenant_repository,
            service_overrides: self.services,
            factory_overrides: self.factories,
        })
    }
}

fn tenant_repository(
    name: &str,
    service_id: String,
    services: &dyn ServiceCatalog,
) -> Result<TenantRepositoryHandle, RegistryError> {
    let service = services
        .resolve(&service_id)
        .ok_or_else(|| RegistryError::UnknownService {
            name: name.to_string(),
            service: service_id.clone(),
        })?;

    match check_tenant_capability(service) {
        CapabilityCheck::Satisfied(repository) => {
            Ok(TenantRepositoryHandle::new(service_id, repository))
        }
        CapabilityCheck::NotSatisfied => {
            warn!(
                "capability=rejected target={} service={} capability=tenant_repository",
                name, service_id
            );
            Err(RegistryError::InvalidTenantRepositoryCapability {
                name: name.to_string(),
                service: service_id,
            })
        }
    }
}

/// Deserializes a mapping into key/value pairs, keeping document order. A
/// repeated key replaces the earlier value in place.
fn ordered_map<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    deserializer.deserialize_map(OrderedVisitor {
        keep_repeated: false,
        marker: PhantomData,
    })
}

/// Like [`ordered_map`], but repeated keys are kept so target-name collisions
/// reach the registry and surface as `DuplicateTarget`.
fn ordered_entries<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    deserializer.deserialize_map(OrderedVisitor {
        keep_repeated: true,
        marker: PhantomData,
    })
}

struct OrderedVisitor<V> {
    keep_repeated: bool,
    marker: PhantomData<V>,
}

impl<'de, V> Visitor<'de> for OrderedVisitor<V>
where
    V: Deserialize<'de>,
{
    type Value = Vec<(String, V)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, V>()? {
            if !self.keep_repeated {
                if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == key) {
                    debug!("config=repeated_key key={} action=replaced", key);
                    slot.1 = value;
                    continue;
                }
            }
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use sea_orm::{DatabaseConnection, DbErr};
    use serial_test::serial;

    use super::{MigrationsConfig, CONFIG_PATH_VAR};
    use crate::error::RegistryError;
    use crate::layout::MigrationOrganization;
    use crate::services::{HostService, StaticServiceCatalog};
    use crate::tenant::TenantRepository;

    struct Schemas;

    #[async_trait]
    impl TenantRepository for Schemas {
        async fn tenant_ids(&self, _conn: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
            Ok(vec!["t1".to_string()])
        }
    }

    impl HostService for Schemas {
        fn as_tenant_repository(self: Arc<Self>) -> Option<Arc<dyn TenantRepository>> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct NotARepository;

    impl HostService for NotARepository {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn catalog() -> StaticServiceCatalog {
        StaticServiceCatalog::new()
            .with("app.tenant_schemas", Arc::new(Schemas))
            .with("app.mailer", Arc::new(NotARepository))
    }

    const FULL: &str = r#"{
        "entity_managers": {
            "reporting": {
                "migrations_paths": {
                    "Zeta\\Migrations": "/db/zeta",
                    "Alpha\\Migrations": "@Core/migrations"
                },
                "migrations": ["App\\Migrations\\Version1"],
                "organize_migrations": "BY_YEAR",
                "custom_template": "/tpl/migration.tpl",
                "all_or_nothing": true,
                "check_database_platform": false,
                "multitenant": { "repository": "app.tenant_schemas" },
                "services": { "Clock": "app.clock" },
                "factories": { "Logger": "app.logger" },
                "storage": {
                    "table_storage": {
                        "table_name": "custom_migrations",
                        "version_column_length": 255
                    }
                }
            },
            "main": {}
        }
    }"#;

    #[test]
    fn full_target_block_is_assembled() {
        let config = MigrationsConfig::from_json_str(FULL).unwrap();
        let names: Vec<&str> = config.entity_managers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["reporting", "main"]);

        let (name, block) = config.entity_managers.into_iter().next().unwrap();
        let target = block.into_target(&name, &catalog()).unwrap();

        assert_eq!(
            target.migration_directories,
            vec![
                ("Zeta\\Migrations".to_string(), PathBuf::from("/db/zeta")),
                ("Alpha\\Migrations".to_string(), PathBuf::from("@Core/migrations")),
            ]
        );
        assert_eq!(target.migration_classes, vec!["App\\Migrations\\Version1"]);
        assert_eq!(target.organize_migrations, Some(MigrationOrganization::ByYear));
        assert_eq!(target.custom_template, Some(PathBuf::from("/tpl/migration.tpl")));
        assert!(target.all_or_nothing);
        assert!(!target.check_database_platform);
        assert_eq!(
            target.tenant_repository.as_ref().map(|h| h.service_id()),
            Some("app.tenant_schemas")
        );
        assert_eq!(
            target.service_overrides,
            vec![("Clock".to_string(), "app.clock".to_string())]
        );
        assert_eq!(
            target.factory_overrides,
            vec![("Logger".to_string(), "app.logger".to_string())]
        );
        assert_eq!(target.storage.table_name.as_deref(), Some("custom_migrations"));
        assert_eq!(target.storage.version_column_length, Some(255));
        assert_eq!(target.storage.version_column_name, None);
    }

    #[test]
    fn empty_block_uses_defaults() {
        let config = MigrationsConfig::from_json_str(r#"{"entity_managers": {"main": {}}}"#).unwrap();
        let (name, block) = config.entity_managers.into_iter().next().unwrap();
        let target = block.into_target(&name, &catalog()).unwrap();

        assert!(target.migration_directories.is_empty());
        assert!(target.migration_classes.is_empty());
        assert_eq!(target.organize_migrations, None);
        assert_eq!(target.custom_template, None);
        assert!(!target.all_or_nothing);
        assert!(target.check_database_platform);
        assert!(!target.is_multi_tenant());
    }

    #[test]
    fn repository_without_capability_is_an_error() {
        let raw = r#"{"entity_managers": {"main": {"multitenant": {"repository": "app.mailer"}}}}"#;
        let config = MigrationsConfig::from_json_str(raw).unwrap();
        let (name, block) = config.entity_managers.into_iter().next().unwrap();

        let err = block.into_target(&name, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTenantRepositoryCapability { ref service, .. } if service == "app.mailer"
        ));
    }

    #[test]
    fn unknown_repository_service_is_an_error() {
        let raw = r#"{"entity_managers": {"main": {"multitenant": {"repository": "app.nope"}}}}"#;
        let config = MigrationsConfig::from_json_str(raw).unwrap();
        let (name, block) = config.entity_managers.into_iter().next().unwrap();

        let err = block.into_target(&name, &catalog()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownService { .. }));
    }

    #[test]
    fn organize_true_is_rejected() {
        let raw = r#"{"entity_managers": {"main": {"organize_migrations": true}}}"#;
        let config = MigrationsConfig::from_json_str(raw).unwrap();
        let (name, block) = config.entity_managers.into_iter().next().unwrap();
        assert!(block.into_target(&name, &catalog()).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"entity_managers": {"main": {"migration_paths": {}}}}"#;
        let err = MigrationsConfig::from_json_str(raw).unwrap_err();
        assert!(err.to_string().contains("migration_paths"));
    }

    #[test]
    #[serial]
    fn from_env_reads_configured_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        std::env::set_var(CONFIG_PATH_VAR, file.path());
        let config = MigrationsConfig::from_env().unwrap();
        std::env::remove_var(CONFIG_PATH_VAR);

        assert_eq!(config.entity_managers.len(), 2);
    }

    #[test]
    #[serial]
    fn from_env_requires_variable() {
        std::env::remove_var(CONFIG_PATH_VAR);
        let err = MigrationsConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(CONFIG_PATH_VAR));
    }

    #[test]
    fn repeated_map_keys_keep_the_last_value_in_first_position() {
        let raw = r#"{"entity_managers": {"main": {
            "migrations_paths": {
                "App\\Migrations": "/db/a",
                "Lib\\Migrations": "/db/lib",
                "App\\Migrations": "/db/b"
            },
            "services": {
                "MetadataStorage": "app.first",
                "MetadataStorage": "app.second"
            }
        }}}"#;
        let config = MigrationsConfig::from_json_str(raw).unwrap();
        let (name, block) = config.entity_managers.into_iter().next().unwrap();
        let target = block.into_target(&name, &catalog()).unwrap();

        assert_eq!(
            target.migration_directories,
            vec![
                ("App\\Migrations".to_string(), PathBuf::from("/db/b")),
                ("Lib\\Migrations".to_string(), PathBuf::from("/db/lib")),
            ]
        );
        assert_eq!(target.custom_metadata_storage(), Some("app.second"));
        assert_eq!(target.service_overrides.len(), 1);
    }

    #[test]
    fn repeated_target_names_are_kept_for_the_registry_to_reject() {
        let raw = r#"{"entity_managers": {"main": {}, "main": {"all_or_nothing": true}}}"#;
        let config = MigrationsConfig::from_json_str(raw).unwrap();
        assert_eq!(config.entity_managers.len(), 2);
    }

    #[test]
    fn null_mapping_is_rejected() {
        let raw = r#"{"entity_managers": {"main": {"services": null}}}"#;
        assert!(MigrationsConfig::from_json_str(raw).is_err());
    }
}
