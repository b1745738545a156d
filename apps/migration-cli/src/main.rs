use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use migrations_registry::{
    ExecutionContext, MetadataStorage, MigrationRegistry, MigrationSource, MigrationTemplate,
    MigrationsConfig, RegistryError, StaticConnectionProvider, StaticModuleResolver,
};
use sea_orm::{Database, DatabaseConnection};
use time::OffsetDateTime;
use tracing::{info, warn};

mod catalog;

const MODULES_VAR: &str = "MIGRATIONS_MODULES";

#[derive(Subcommand)]
enum Command {
    /// List registered targets
    List,
    /// Show the assembled execution context for a target
    Show { name: String },
    /// List tenants sharing a target's connection
    Tenants { name: String },
}

#[derive(Parser)]
#[command(name = "migration-registry")]
#[command(about = "Inspect per-connection migration targets")]
struct Args {
    /// Configuration file (defaults to $MIGRATIONS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use disconnected handles instead of connecting to each database
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

/// `reporting-db` reads its URL from `REPORTING_DB_DATABASE_URL`.
fn connection_var(target: &str) -> String {
    let prefix: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{prefix}_DATABASE_URL")
}

async fn connect_all(
    names: &[String],
    offline: bool,
) -> Result<StaticConnectionProvider, RegistryError> {
    let mut provider = StaticConnectionProvider::new();
    for name in names {
        let connection = if offline {
            DatabaseConnection::Disconnected
        } else {
            let var = connection_var(name);
            let Ok(url) = std::env::var(&var) else {
                warn!("connection=missing target={} var={}", name, var);
                continue;
            };
            Database::connect(url.as_str())
                .await
                .map_err(|e| RegistryError::config(format!("failed to connect '{name}': {e}")))?
        };
        provider = provider.with(name.clone(), connection);
    }
    Ok(provider)
}

async fn load(args: &Args) -> Result<MigrationRegistry, RegistryError> {
    let config = match &args.config {
        Some(path) => MigrationsConfig::from_path(path)?,
        None => MigrationsConfig::from_env()?,
    };
    let names: Vec<String> = config.entity_managers.iter().map(|(name, _)| name.clone()).collect();

    let modules = match std::env::var(MODULES_VAR) {
        Ok(spec) => StaticModuleResolver::parse(&spec)?,
        Err(_) => StaticModuleResolver::new(),
    };
    let connections = connect_all(&names, args.offline).await?;
    let services = catalog::catalog_for(&config);

    MigrationRegistry::from_config(
        config,
        Arc::new(modules),
        Arc::new(services),
        Arc::new(connections),
    )
}

fn print_context(ctx: &ExecutionContext) -> Result<(), RegistryError> {
    println!("target: {}", ctx.name());
    println!("  transaction: {:?}", ctx.transaction_mode());
    println!("  check platform: {}", ctx.checks_database_platform());
    for source in ctx.migration_sources() {
        match source {
            MigrationSource::Directory { namespace, path } => {
                println!("  directory: {namespace} -> {}", path.display())
            }
            MigrationSource::Class(class) => println!("  class: {class}"),
        }
    }
    match ctx.storage() {
        MetadataStorage::Table(table) => println!(
            "  storage: table {} ({}[{}], {}, {})",
            table.table_name,
            table.version_column_name,
            table.version_column_length,
            table.executed_at_column_name,
            table.execution_time_column_name
        ),
        MetadataStorage::Custom { service_id } => println!("  storage: service {service_id}"),
    }
    for (key, service) in ctx.overrides() {
        println!("  override: {key} -> {}", service.service_id());
    }
    if let Some(next) = ctx.generation_target(OffsetDateTime::now_utc())? {
        let template = match next.template {
            MigrationTemplate::Builtin => "builtin".to_string(),
            MigrationTemplate::Custom(path) => path.display().to_string(),
        };
        println!(
            "  next: {}\\{} in {} (template {template})",
            next.namespace,
            next.version,
            next.directory.display()
        );
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), RegistryError> {
    let registry = load(&args).await?;
    info!("registry=ready targets={}", registry.len());

    match &args.command {
        Command::List => {
            for name in registry.names() {
                let tenancy = match registry.target(name) {
                    Some(target) if target.is_multi_tenant() => "multi-tenant",
                    _ => "single",
                };
                println!("{name} ({tenancy})");
            }
        }
        Command::Show { name } => {
            let ctx = registry.build_execution_context(name)?;
            print_context(&ctx)?;
        }
        Command::Tenants { name } => {
            let ctx = registry.build_execution_context(name)?;
            let tenants = ctx
                .tenant_ids()
                .await
                .map_err(|e| RegistryError::config(format!("failed to list tenants: {e}")))?;
            for tenant in tenants {
                println!("{tenant}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_env_filter("migrations_registry=info,migration_registry=info,sqlx=warn")
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Migration registry failed [{}]: {e}", e.code());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::connection_var;

    #[test]
    fn connection_var_is_upper_snake() {
        assert_eq!(connection_var("reporting"), "REPORTING_DATABASE_URL");
        assert_eq!(connection_var("reporting-db"), "REPORTING_DB_DATABASE_URL");
    }
}
