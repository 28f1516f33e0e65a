//! Simulated detection outcomes.
//!
//! Each hole's outcome is an independent weighted draw: a uniform `u` in
//! `[0, 1)` maps to Qualified below `q`, Defective below `q + d`, Blind
//! below `q + d + b`, and Uncertain for the remaining mass.
//!
//! Every unit draws from its own RNG seeded from `(seed, unit index)`, so
//! the outcomes of unit `i` do not depend on how many ticks, pauses, or
//! restarts happened before it.

use holescan_types::{DetectionUnit, HoleOutcome, HoleStatus, SimulationParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Weighted outcome sampler for one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSampler {
    qualified: f64,
    defective: f64,
    blind: f64,
    seed: u64,
}

impl OutcomeSampler {
    /// Build a sampler from validated parameters.
    pub const fn new(params: &SimulationParams) -> Self {
        Self {
            qualified: params.qualified_rate,
            defective: params.defective_rate,
            blind: params.blind_rate,
            seed: params.seed,
        }
    }

    /// Map a uniform sample in `[0, 1)` to an outcome.
    pub fn classify(&self, u: f64) -> HoleStatus {
        let qualified_bound = self.qualified;
        let defective_bound = qualified_bound + self.defective;
        let blind_bound = defective_bound + self.blind;

        if u < qualified_bound {
            HoleStatus::Qualified
        } else if u < defective_bound {
            HoleStatus::Defective
        } else if u < blind_bound {
            HoleStatus::Blind
        } else {
            HoleStatus::Uncertain
        }
    }

    /// Draw one outcome.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> HoleStatus {
        self.classify(rng.random::<f64>())
    }

    /// The RNG dedicated to one unit.
    pub fn unit_rng(&self, unit_index: usize) -> StdRng {
        StdRng::seed_from_u64(unit_seed(self.seed, unit_index))
    }

    /// Draw the outcomes for every hole of a unit, primary first.
    pub fn sample_unit(&self, unit: &DetectionUnit) -> Vec<HoleOutcome> {
        let mut rng = self.unit_rng(unit.index);
        unit.hole_ids()
            .map(|hole_id| HoleOutcome {
                hole_id: hole_id.clone(),
                status: self.draw(&mut rng),
            })
            .collect()
    }
}

/// Derive a unit's RNG seed from the batch seed and the unit index.
pub fn unit_seed(seed: u64, unit_index: usize) -> u64 {
    let index = u64::try_from(unit_index).unwrap_or(u64::MAX);
    splitmix64(seed ^ splitmix64(index))
}

/// `SplitMix64` finalizer.
const fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use holescan_types::HoleId;

    use super::*;

    fn sampler(q: f64, d: f64, b: f64) -> OutcomeSampler {
        OutcomeSampler::new(&SimulationParams {
            qualified_rate: q,
            defective_rate: d,
            blind_rate: b,
            seed: 3,
            ..SimulationParams::default()
        })
    }

    #[test]
    fn classify_boundaries() {
        let s = sampler(0.7, 0.2, 0.05);
        assert_eq!(s.classify(0.0), HoleStatus::Qualified);
        assert_eq!(s.classify(0.699), HoleStatus::Qualified);
        assert_eq!(s.classify(0.7), HoleStatus::Defective);
        assert_eq!(s.classify(0.91), HoleStatus::Blind);
        assert_eq!(s.classify(0.96), HoleStatus::Uncertain);
    }

    #[test]
    fn certain_qualification() {
        let s = sampler(1.0, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10_000 {
            assert_eq!(s.draw(&mut rng), HoleStatus::Qualified);
        }
    }

    #[test]
    fn unit_outcomes_are_reproducible() {
        let s = sampler(0.5, 0.3, 0.1);
        let unit = DetectionUnit::pair(17, HoleId::new("AC001R001"), HoleId::new("AC005R001"));
        let first = s.sample_unit(&unit);
        let second = s.sample_unit(&unit);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn unit_seeds_differ_by_index_and_seed() {
        assert_ne!(unit_seed(0, 0), unit_seed(0, 1));
        assert_ne!(unit_seed(0, 5), unit_seed(1, 5));
    }
}
