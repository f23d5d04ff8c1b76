//! End-to-end programs behind the command-line tool.

pub mod maxwell;
pub mod vdp;

pub use maxwell::{MaxwellOptions, MaxwellReport, MaxwellSystem, ProblemSource};
pub use vdp::{VdpOptions, VdpReport};
