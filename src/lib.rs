//! Build orchestration for the Cangjie grammar artifacts.
//!
//! Structure:
//! - `config` - WASI SDK / toolchain version resolution
//! - `probe` - external toolchain discovery
//! - `stage` - single build stage execution
//! - `pipeline` - stage sequencing, fallback strategies
//! - `artifact` - placing the produced module at its destinations

pub mod artifact;
pub mod config;
pub mod pipeline;
pub mod probe;
pub mod stage;
