use std::path::PathBuf;

use crate::layout::MigrationOrganization;
use crate::services::backend_service;
use crate::tenant::TenantRepositoryHandle;

/// Everything needed to migrate one named data source in isolation.
#[derive(Debug, Clone)]
pub struct MigrationTarget {
    pub name: String,
    /// `(namespace, directory)` pairs, in discovery order.
    pub migration_directories: Vec<(String, PathBuf)>,
    pub migration_classes: Vec<String>,
    pub organize_migrations: Option<MigrationOrganization>,
    pub custom_template: Option<PathBuf>,
    pub all_or_nothing: bool,
    pub check_database_platform: bool,
    pub storage: TableStorageOverrides,
    pub tenant_repository: Option<TenantRepositoryHandle>,
    /// Backend service key -> host service id, resolved on first use.
    pub service_overrides: Vec<(String, String)>,
    /// Backend service key -> host service id, resolved at context build.
    pub factory_overrides: Vec<(String, String)>,
}

impl MigrationTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            migration_directories: Vec::new(),
            migration_classes: Vec::new(),
            organize_migrations: None,
            custom_template: None,
            all_or_nothing: false,
            check_database_platform: true,
            storage: TableStorageOverrides::default(),
            tenant_repository: None,
            service_overrides: Vec::new(),
            factory_overrides: Vec::new(),
        }
    }

    /// Host service replacing the backend's metadata storage outright, if any.
    pub fn custom_metadata_storage(&self) -> Option<&str> {
        self.service_overrides
            .iter()
            .find(|(key, _)| key == backend_service::METADATA_STORAGE)
            .map(|(_, id)| id.as_str())
    }

    pub fn has_custom_metadata_storage(&self) -> bool {
        self.custom_metadata_storage().is_some()
    }

    pub fn is_multi_tenant(&self) -> bool {
        self.tenant_repository.is_some()
    }
}

/// Per-target overrides for the bookkeeping table. Unset fields keep the backend default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStorageOverrides {
    pub table_name: Option<String>,
    pub version_column_name: Option<String>,
    pub version_column_length: Option<u32>,
    pub executed_at_column_name: Option<String>,
    pub execution_time_column_name: Option<String>,
}

/// Settings for the table recording which migrations have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStorageConfig {
    pub table_name: String,
    pub version_column_name: String,
    pub version_column_length: u32,
    pub executed_at_column_name: String,
    pub execution_time_column_name: String,
}

impl Default for TableStorageConfig {
    fn default() -> Self {
        Self {
            table_name: "migration_versions".to_string(),
            version_column_name: "version".to_string(),
            version_column_length: 191,
            executed_at_column_name: "executed_at".to_string(),
            execution_time_column_name: "execution_time".to_string(),
        }
    }
}

impl TableStorageConfig {
    /// Backend defaults with only the explicitly set fields replaced.
    pub fn from_overrides(overrides: &TableStorageOverrides) -> Self {
        let mut config = Self::default();
        if let Some(table_name) = &overrides.table_name {
            config.table_name = table_name.clone();
        }
        if let Some(column) = &overrides.version_column_name {
            config.version_column_name = column.clone();
        }
        if let Some(length) = overrides.version_column_length {
            config.version_column_length = length;
        }
        if let Some(column) = &overrides.executed_at_column_name {
            config.executed_at_column_name = column.clone();
        }
        if let Some(column) = &overrides.execution_time_column_name {
            config.execution_time_column_name = column.clone();
        }
        config
    }
}

/// One place the backend should look for migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationSource {
    Directory { namespace: String, path: PathBuf },
    Class(String),
}
