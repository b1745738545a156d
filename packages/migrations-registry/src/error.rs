use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Migration target '{name}' is already registered")]
    DuplicateTarget { name: String },
    #[error("Migration target '{name}' has not been registered")]
    UnknownTarget { name: String },
    #[error("The module \"{module}\" has not been registered, available modules: {}", .available.join(", "))]
    UnknownModule {
        module: String,
        available: Vec<String>,
    },
    #[error("Migration target '{name}' already has a tenant repository")]
    DuplicateTenantRepository { name: String },
    #[error("Service '{service}' configured as tenant repository for '{name}' cannot list tenants")]
    InvalidTenantRepositoryCapability { name: String, service: String },
    #[error("Execution context for '{name}' is already built; its configuration is frozen")]
    ContextAlreadyBuilt { name: String },
    #[error("Service '{service}' referenced by '{name}' is not available from the host")]
    UnknownService { name: String, service: String },
    #[error("No database connection available for '{name}'")]
    MissingConnection { name: String },
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl RegistryError {
    pub fn config(message: impl Into<String>) -> Self {
        RegistryError::Config {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for each variant.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::DuplicateTarget { .. } => "DUPLICATE_TARGET",
            RegistryError::UnknownTarget { .. } => "UNKNOWN_TARGET",
            RegistryError::UnknownModule { .. } => "UNKNOWN_MODULE",
            RegistryError::DuplicateTenantRepository { .. } => "DUPLICATE_TENANT_REPOSITORY",
            RegistryError::InvalidTenantRepositoryCapability { .. } => {
                "INVALID_TENANT_REPOSITORY_CAPABILITY"
            }
            RegistryError::ContextAlreadyBuilt { .. } => "CONTEXT_ALREADY_BUILT",
            RegistryError::UnknownService { .. } => "UNKNOWN_SERVICE",
            RegistryError::MissingConnection { .. } => "MISSING_CONNECTION",
            RegistryError::Config { .. } => "CONFIG_ERROR",
        }
    }
}
