//! Tracing setup for registry tests

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

/// Registry assembly at `info`, everything else (sqlx, sea-orm) at `warn`.
pub const DEFAULT_DIRECTIVE: &str = "warn,migrations_registry=info";

/// Checked in order; the first one set wins over [`DEFAULT_DIRECTIVE`].
pub const DIRECTIVE_VARS: [&str; 3] = ["REGISTRY_TEST_LOG", "TEST_LOG", "RUST_LOG"];

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Filter directive for registry tests, looked up through `var`.
pub fn filter_directive(var: impl Fn(&str) -> Option<String>) -> String {
    DIRECTIVE_VARS
        .iter()
        .find_map(|name| var(name).filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Installs the test subscriber once per process; later calls are no-ops.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let directive = filter_directive(|name| std::env::var(name).ok());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .with_target(false)
            .try_init()
            .ok();
    });
}
