//! Solver options.
//!
//! `SolverOptions` carries the CG stopping criteria and output controls; it deserialises from the
//! `[solver]` table of a TOML file with every field optional.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What the solver reports while it runs.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Verbosity: u32 {
        const ERRORS              = 0b0000_0001;
        const WARNINGS            = 0b0000_0010;
        const STATUS_TEST_DETAILS = 0b0000_0100; // residual per reported iteration
        const ITERATION_DETAILS   = 0b0000_1000;
        const FINAL_SUMMARY       = 0b0001_0000;
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::ERRORS | Verbosity::WARNINGS | Verbosity::STATUS_TEST_DETAILS
    }
}

/// CG configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Relative residual reduction `‖r_k‖ / ‖r_0‖` that counts as converged.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub verbosity: Verbosity,
    /// Report every `output_frequency` iterations (0 disables per-iteration output).
    #[serde(default = "default_output_frequency")]
    pub output_frequency: usize,
}

fn default_max_iterations() -> usize {
    100
}
fn default_tolerance() -> f64 {
    1e-4
}
fn default_output_frequency() -> usize {
    1
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            verbosity: Verbosity::default(),
            output_frequency: default_output_frequency(),
        }
    }
}
