//! Registry access layer: one typed HTTP client per endpoint, plus the
//! fleet manager that owns them.

pub mod client;
pub mod manager;
pub mod types;

pub use client::{is_default_context, RegistryClient};
pub use manager::{FleetTest, RegistryInfo, RegistryManager, RegistryStatistics};
pub use types::{CompatibilityLevel, Mode, SchemaRecord, SchemaType};
