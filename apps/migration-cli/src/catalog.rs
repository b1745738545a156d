//! Host services the CLI stands in for.
//!
//! The CLI has no application container, so every id a config names gets a
//! stand-in: tenant repositories list schemas straight from the connection,
//! everything else is an opaque placeholder that only reports its id.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use migrations_registry::{HostService, MigrationsConfig, StaticServiceCatalog, TenantRepository};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tracing::debug;

const POSTGRES_SCHEMAS: &str = "SELECT schema_name AS tenant FROM information_schema.schemata \
     WHERE schema_name NOT LIKE 'pg_%' AND schema_name <> 'information_schema' \
     ORDER BY schema_name";
const SQLITE_DATABASES: &str = "SELECT name AS tenant FROM pragma_database_list ORDER BY seq";

/// Lists tenant schemas on the target's own connection.
#[derive(Debug)]
pub struct SchemaTenants;

#[async_trait]
impl TenantRepository for SchemaTenants {
    async fn tenant_ids(&self, conn: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
        if matches!(conn, DatabaseConnection::Disconnected) {
            return Err(DbErr::Custom("connection is offline".to_string()));
        }
        let backend = conn.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Postgres => POSTGRES_SCHEMAS,
            DatabaseBackend::Sqlite => SQLITE_DATABASES,
            other => {
                return Err(DbErr::Custom(format!("tenant listing unsupported on {other:?}")));
            }
        };
        let rows = conn.query_all(Statement::from_string(backend, sql)).await?;
        rows.iter().map(|row| row.try_get::<String>("", "tenant")).collect()
    }
}

impl HostService for SchemaTenants {
    fn as_tenant_repository(self: Arc<Self>) -> Option<Arc<dyn TenantRepository>> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stand-in for a host service the CLI cannot construct.
#[derive(Debug)]
pub struct PlaceholderService {
    pub id: String,
}

impl HostService for PlaceholderService {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One entry per service id named anywhere in `config`.
pub fn catalog_for(config: &MigrationsConfig) -> StaticServiceCatalog {
    let mut catalog = StaticServiceCatalog::new();
    for (name, target) in &config.entity_managers {
        if let Some(id) = &target.multitenant.repository {
            debug!("catalog=tenant_repository target={} service={}", name, id);
            catalog.insert(id.clone(), Arc::new(SchemaTenants));
        }
        for (_, id) in target.services.iter().chain(&target.factories) {
            if target.multitenant.repository.as_ref() == Some(id) {
                continue;
            }
            debug!("catalog=placeholder target={} service={}", name, id);
            catalog.insert(id.clone(), Arc::new(PlaceholderService { id: id.clone() }));
        }
    }
    catalog
}
