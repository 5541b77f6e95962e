//! Configuration loading and management for the payroll engine.
//!
//! This module loads the pay type registry, the jurisdiction registry and the
//! dated tax tables from YAML files into an immutable [`PayrollConfig`].
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load("./config/us_payroll").unwrap();
//! println!("Loaded configuration: {}", loader.metadata().name);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    EngineFile, EngineMetadata, EngineSettings, JurisdictionsFile, MedicareRates,
    OvertimeSettings, PayTypesFile, PayrollConfig, TaxTable, WageBaseRate,
};
