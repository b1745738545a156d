//! Per-connection migration targets and the registry that hands them to a
//! migration backend. Used by host applications and the migration CLI.

pub mod config;
pub mod context;
pub mod error;
pub mod layout;
pub mod modules;
pub mod registry;
pub mod services;
pub mod target;
pub mod tenant;

pub use config::MigrationsConfig;
pub use context::{ExecutionContext, MetadataStorage, TransactionMode};
pub use error::RegistryError;
pub use layout::{GenerationTarget, MigrationOrganization, MigrationTemplate};
pub use modules::{resolve_directory, ModuleResolver, StaticModuleResolver};
pub use registry::{ConnectionProvider, MigrationRegistry, StaticConnectionProvider};
pub use services::{backend_service, HostService, ServiceCatalog, ServiceOverride, StaticServiceCatalog};
pub use target::{MigrationSource, MigrationTarget, TableStorageConfig, TableStorageOverrides};
pub use tenant::{check_tenant_capability, CapabilityCheck, TenantRepository, TenantRepositoryHandle};
