//! Registry test support utilities
//!
//! Shared logging initialization and host-side fixtures (tenant repositories,
//! plain services, module roots) for the registry's integration tests.

pub mod fixtures;
pub mod test_logging;
