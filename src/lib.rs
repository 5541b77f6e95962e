//! Payroll Calculation Engine
//!
//! This crate computes a single employee's pay for a single pay period from
//! configuration-driven pay type, jurisdiction and tax table definitions. It
//! produces gross pay, deductions, employee withholding, employer taxes and
//! net pay, together with an audit trace that explains every step.
//!
//! Calculations are pure: identical input and configuration always yield an
//! identical result, including its calculation id.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::PayrollEngine;
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/us_payroll")?.into_config();
//! let engine = PayrollEngine::new(config);
//! # Ok::<(), payroll_engine::error::EngineError>(())
//! ```

#![warn(missing_docs)]

pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;

pub use engine::PayrollEngine;
