//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading payroll
//! configurations from YAML files.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use crate::calculation::JurisdictionRegistry;
use crate::error::{EngineError, EngineResult};
use crate::models::PayTypeDefinition;

use super::types::{
    EngineFile, EngineMetadata, JurisdictionsFile, PayTypesFile, PayrollConfig, TaxTable,
};

/// Loads and provides access to payroll configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory once;
/// the resulting [`PayrollConfig`] is immutable.
///
/// # Directory Structure
///
/// ```text
/// config/us_payroll/
/// ├── engine.yaml          # Metadata and engine settings
/// ├── pay_types.yaml       # Pay type registry
/// ├── jurisdictions.yaml   # Jurisdictions and their tax rules
/// └── tax_tables/
///     └── 2024-01-01.yaml  # Tax table effective from this date
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
/// use chrono::NaiveDate;
///
/// let loader = ConfigLoader::load("./config/us_payroll").unwrap();
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
/// let table = loader.tax_table_for(date).unwrap();
/// println!("Social Security wage base: {:?}", table.social_security.wage_base);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: PayrollConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if any required file is missing, contains invalid
    /// YAML, repeats a pay type or jurisdiction code, or if the
    /// `tax_tables` directory holds no tables.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use payroll_engine::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::load("./config/us_payroll")?;
    /// # Ok::<(), payroll_engine::error::EngineError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let engine = Self::load_yaml::<EngineFile>(&path.join("engine.yaml"))?;
        let pay_types = Self::load_yaml::<PayTypesFile>(&path.join("pay_types.yaml"))?;
        let jurisdictions =
            Self::load_yaml::<JurisdictionsFile>(&path.join("jurisdictions.yaml"))?;
        let tax_tables = Self::load_tax_tables(&path.join("tax_tables"))?;

        let registry = JurisdictionRegistry::new(jurisdictions.jurisdictions)?;
        let config = PayrollConfig::new(
            engine.engine,
            engine.settings,
            pay_types.pay_types,
            registry,
            tax_tables,
        )?;

        tracing::debug!(
            path = %path.display(),
            pay_types = config.pay_types().len(),
            jurisdictions = config.registry().len(),
            tax_tables = config.tax_tables().len(),
            "loaded payroll configuration"
        );

        Ok(Self { config })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every tax table in the directory, in file name order.
    fn load_tax_tables(dir: &Path) -> EngineResult<Vec<TaxTable>> {
        let dir_str = dir.display().to_string();

        let entries = fs::read_dir(dir).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no tax table files found)", dir_str),
            });
        }

        paths.iter().map(|path| Self::load_yaml::<TaxTable>(path)).collect()
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &PayrollConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> PayrollConfig {
        self.config
    }

    /// Returns the configuration metadata.
    pub fn metadata(&self) -> &EngineMetadata {
        self.config.metadata()
    }

    /// Gets a pay type by its code.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use payroll_engine::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::load("./config/us_payroll")?;
    /// let regular = loader.pay_type("REG")?;
    /// println!("Pay type: {}", regular.name);
    /// # Ok::<(), payroll_engine::error::EngineError>(())
    /// ```
    pub fn pay_type(&self, code: &str) -> EngineResult<&PayTypeDefinition> {
        self.config.pay_type(code)
    }

    /// Gets the tax table effective on `date`.
    pub fn tax_table_for(&self, date: NaiveDate) -> EngineResult<&TaxTable> {
        self.config.tax_table_for(date)
    }
}
