use bon::bon;
use itertools::Itertools as _;
use ordered_float::OrderedFloat;

use crate::{geometry::FloatType, loss::PathMetrics};

/// Transmitter side of a link and the rules for combining received paths.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinkBudget {
    pub tx_power_dbm: FloatType,
    pub beamforming_gain_db: FloatType,
    /// Only this many lowest loss paths are received.
    pub strongest_paths: usize,
    /// Decay of late paths in the omnidirectional sum, per nanosecond of delay.
    pub tardiness_per_ns: FloatType,
}

#[bon]
impl LinkBudget {
    #[builder]
    pub fn new(
        #[builder(default = 4.0)] tx_power_dbm: FloatType,
        #[builder(default = 6.0)] beamforming_gain_db: FloatType,
        #[builder(default = 5)] strongest_paths: usize,
        #[builder(default = 0.0023)] tardiness_per_ns: FloatType,
    ) -> Self {
        assert!(strongest_paths > 0);
        assert!(tardiness_per_ns >= 0.0);

        LinkBudget {
            tx_power_dbm,
            beamforming_gain_db,
            strongest_paths,
            tardiness_per_ns,
        }
    }
}

impl Default for LinkBudget {
    fn default() -> Self {
        LinkBudget::builder().build()
    }
}

/// Power arriving at a receiver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReceivedSignal {
    /// Omnidirectional antenna, all received paths combined.
    pub omni_dbm: FloatType,
    /// Beam steered at the strongest path.
    pub beamformed_dbm: FloatType,
}

impl ReceivedSignal {
    pub fn power_dbm(&self, beamforming: bool) -> FloatType {
        if beamforming {
            self.beamformed_dbm
        } else {
            self.omni_dbm
        }
    }
}

impl LinkBudget {
    /// The lowest loss paths, strongest first. Paths with non-finite loss are dropped.
    pub fn strongest(&self, metrics: &[PathMetrics]) -> Vec<PathMetrics> {
        metrics
            .iter()
            .filter(|m| m.loss_db.is_finite())
            .copied()
            .sorted_by_key(|m| OrderedFloat(m.loss_db))
            .take(self.strongest_paths)
            .collect()
    }

    /// Received power over the given paths, None if no path arrives.
    pub fn evaluate(&self, metrics: &[PathMetrics]) -> Option<ReceivedSignal> {
        let strongest = self.strongest(metrics);
        let best = strongest.first()?;

        let omni_dbm = self.omni_power_dbm(
            strongest
                .iter()
                .map(|m| (self.tx_power_dbm - m.loss_db, m.delay_s)),
        )?;

        Some(ReceivedSignal {
            omni_dbm,
            beamformed_dbm: self.tx_power_dbm + self.beamforming_gain_db - best.loss_db,
        })
    }

    /// Sums received paths given as (power in dBm, delay in seconds), discounting each
    /// path by how late it arrives after the first one.
    pub fn omni_power_dbm(
        &self,
        paths: impl IntoIterator<Item = (FloatType, FloatType)>,
    ) -> Option<FloatType> {
        let paths = paths.into_iter().collect_vec();
        let first = paths
            .iter()
            .map(|(_, delay)| OrderedFloat(*delay))
            .min()?
            .into_inner();

        let total_mw: FloatType = paths
            .iter()
            .map(|(dbm, delay)| {
                let tardiness = (-self.tardiness_per_ns * (delay - first) * 1e9).exp();
                dbm_to_mw(*dbm) * tardiness
            })
            .sum();

        Some(10.0 * total_mw.log10())
    }
}

pub fn dbm_to_mw(dbm: FloatType) -> FloatType {
    (10.0 as FloatType).powf(dbm / 10.0)
}

/// Perceived signal quality in percent, 50 % at -70 dBm.
pub fn receive_strength_percent(dbm: FloatType) -> FloatType {
    100.0 / (1.0 + (-0.2 * (dbm + 70.0)).exp())
}
