//! Derivative check of the Van der Pol time-step constraint at a random point.

use crate::dynamic::{ALL_CHECKS, CheckOutcome, Step, ValidateFunction, VanDerPol, check_dynamic_constraint};
use crate::error::KError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Copy, Debug)]
pub struct VdpOptions {
    pub dt: f64,
    /// Seed of the point and directions; `None` draws from entropy.
    pub seed: Option<u64>,
    pub validator: ValidateFunction,
}

impl Default for VdpOptions {
    fn default() -> Self {
        Self {
            dt: VanDerPol::default().dt,
            seed: None,
            validator: ValidateFunction::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VdpReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl VdpReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn message(&self) -> &'static str {
        if self.passed() { "End Result: TEST PASSED" } else { "End Result: TEST FAILED" }
    }
}

/// `(uo, un, z)` drawn uniformly from `[-1, 1]`.
fn random_point<R: Rng>(rng: &mut R) -> ([f64; 2], [f64; 2], [f64; 1]) {
    let mut draw = || rng.gen_range(-1.0..=1.0);
    ([draw(), draw()], [draw(), draw()], [draw()])
}

/// Runs all ten checks at a random point.
pub fn run(opts: &VdpOptions) -> Result<VdpReport, KError> {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (uo, un, z) = random_point(&mut rng);
    let at = Step { uo: &uo, un: &un, z: &z };
    let outcomes = check_dynamic_constraint(&VanDerPol::new(opts.dt), &opts.validator, &at, &ALL_CHECKS, &mut rng)?;
    Ok(VdpReport { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_cover_negative_states() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut negative = false;
        for _ in 0..20 {
            let (uo, un, z) = random_point(&mut rng);
            for v in uo.iter().chain(&un).chain(&z) {
                assert!((-1.0..=1.0).contains(v));
                negative |= *v < 0.0;
            }
        }
        assert!(negative);
    }

    #[test]
    fn seeded_run_passes() {
        let report = run(&VdpOptions { seed: Some(42), ..VdpOptions::default() }).unwrap();
        assert!(report.passed(), "{:?}", report.outcomes.iter().filter(|o| !o.passed).map(|o| &o.name).collect::<Vec<_>>());
    }
}
