mod diffraction;

use bon::bon;
use itertools::Itertools as _;

use crate::{
    geometry::{FloatType, WorldPoint},
    tracer::Record,
};

pub use diffraction::{diffracted_loss_db, fresnel_kirchhoff_v, knife_edge_db};

/// Speed of light in vacuum, m/s
pub const LIGHT_SPEED: FloatType = 299_792_458.0;
/// Index of refraction of air
pub const AIR_IOR: FloatType = 1.00029;

/// Radio and material properties shared by all paths of a link.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinkParameters {
    pub frequency_hz: FloatType,
    /// Relative permittivity of obstacles, used for the reflection coefficient.
    pub permittivity: FloatType,
    /// Attenuation inside obstacles at 1 GHz, scaled linearly with frequency.
    pub attenuation_db_per_meter_ghz: FloatType,
    /// Index of refraction inside obstacles, used for the delay.
    pub material_ior: FloatType,
}

#[bon]
impl LinkParameters {
    #[builder]
    pub fn new(
        #[builder(default = 2.4e9)] frequency_hz: FloatType,
        #[builder(default = 5.31)] permittivity: FloatType,
        #[builder(default = 10.0)] attenuation_db_per_meter_ghz: FloatType,
        #[builder(default = 1.5)] material_ior: FloatType,
    ) -> Self {
        assert!(frequency_hz > 0.0);
        assert!(permittivity > 0.0);
        assert!(attenuation_db_per_meter_ghz >= 0.0);
        assert!(material_ior >= 1.0);

        LinkParameters {
            frequency_hz,
            permittivity,
            attenuation_db_per_meter_ghz,
            material_ior,
        }
    }
}

impl Default for LinkParameters {
    fn default() -> Self {
        LinkParameters::builder().build()
    }
}

impl LinkParameters {
    pub fn wavelength(&self) -> FloatType {
        LIGHT_SPEED / self.frequency_hz
    }

    /// Loss over `length` meters inside an obstacle.
    pub fn material_attenuation_db(&self, length: FloatType) -> FloatType {
        self.attenuation_db_per_meter_ghz * length * self.frequency_hz / 1e9
    }

    fn index_of_refraction(&self, medium: Medium) -> FloatType {
        match medium {
            Medium::Air => AIR_IOR,
            Medium::Material => self.material_ior,
        }
    }
}

/// Free space path loss in dB.
pub fn fspl_db(distance: FloatType, frequency_hz: FloatType) -> FloatType {
    20.0 * distance.log10() + 20.0 * frequency_hz.log10() - 147.55
}

/// Loss and propagation delay of a single path.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PathMetrics {
    pub loss_db: FloatType,
    pub delay_s: FloatType,
}

/// Effective loss of all paths between two points combined.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ChannelLoss {
    Reachable { loss_db: FloatType },
    Unreachable,
}

impl ChannelLoss {
    pub fn loss_db(&self) -> Option<FloatType> {
        match self {
            ChannelLoss::Reachable { loss_db } => Some(*loss_db),
            ChannelLoss::Unreachable => None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ChannelLoss::Reachable { .. })
    }
}

impl std::fmt::Display for ChannelLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLoss::Reachable { loss_db } => write!(f, "{loss_db:.2} dB"),
            ChannelLoss::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Medium {
    Air,
    Material,
}

/// Lengths and media of the path segments.
/// Every interior vertex except `non_crossing` toggles between air and material.
fn segments(
    path: &[WorldPoint],
    non_crossing: Option<usize>,
) -> impl Iterator<Item = (FloatType, Medium)> + '_ {
    path.iter()
        .tuple_windows()
        .enumerate()
        .scan(0usize, move |crossings, (i, (a, b))| {
            if i > 0 && Some(i) != non_crossing {
                *crossings += 1;
            }
            let medium = if *crossings % 2 == 0 {
                Medium::Air
            } else {
                Medium::Material
            };
            Some(((b - a).norm(), medium))
        })
}

/// Spreading loss over the whole length plus attenuation inside every obstacle.
fn penetrating_metrics(
    path: &[WorldPoint],
    non_crossing: Option<usize>,
    link: &LinkParameters,
) -> PathMetrics {
    let mut length = 0.0;
    let mut attenuation = 0.0;
    let mut delay = 0.0;

    for (segment, medium) in segments(path, non_crossing) {
        length += segment;
        delay += segment * link.index_of_refraction(medium) / LIGHT_SPEED;
        if medium == Medium::Material {
            attenuation += link.material_attenuation_db(segment);
        }
    }

    PathMetrics {
        loss_db: fspl_db(length, link.frequency_hz) + attenuation,
        delay_s: delay,
    }
}

/// TE Fresnel reflection coefficient at `reflection` for a wave from `tx` to `rx`.
/// Magnitude is at most 1, beyond the critical angle it is exactly 1.
pub fn fresnel_te(
    tx: &WorldPoint,
    rx: &WorldPoint,
    reflection: &WorldPoint,
    permittivity: FloatType,
) -> FloatType {
    let incidence = (tx - reflection).angle(&(rx - reflection)) / 2.0;

    let n1 = AIR_IOR;
    let n2 = permittivity;

    if (n1 / n2).abs().sqrt() * incidence.sin() >= 1.0 {
        return 1.0;
    }

    let c1 = LIGHT_SPEED / n1.sqrt();
    let c2 = LIGHT_SPEED / n2.sqrt();
    let transmission = (c2 * incidence.sin() / c1).asin();

    let a = n1.sqrt() * incidence.cos();
    let b = n2.sqrt() * transmission.cos();
    (a - b) / (a + b)
}

/// Loss and delay of one path.
pub fn path_metrics(record: &Record, link: &LinkParameters) -> PathMetrics {
    match record {
        Record::Direct { path } => penetrating_metrics(path, None, link),
        Record::SingleReflected {
            path,
            reflection_index,
        } => {
            let index = *reflection_index;
            let mut metrics = penetrating_metrics(path, Some(index), link);
            let gamma = fresnel_te(
                record.transmitter(),
                record.receiver(),
                &path[index],
                link.permittivity,
            );
            metrics.loss_db -= 20.0 * gamma.abs().log10();
            metrics
        }
        Record::Diffracted { path } => PathMetrics {
            loss_db: diffracted_loss_db(
                record.transmitter(),
                record.receiver(),
                &path[1..path.len() - 1],
                link,
            ),
            delay_s: record.length() * AIR_IOR / LIGHT_SPEED,
        },
    }
}

/// Combines path losses by summing their powers.
pub fn total_loss<'a>(metrics: impl IntoIterator<Item = &'a PathMetrics>) -> ChannelLoss {
    let mut power: FloatType = 0.0;
    for m in metrics {
        if m.loss_db.is_finite() {
            power += (10.0 as FloatType).powf(-m.loss_db / 10.0);
        } else if m.loss_db != FloatType::INFINITY {
            log::warn!("Skipping path with loss {}", m.loss_db);
        }
    }

    if power > 0.0 {
        ChannelLoss::Reachable {
            loss_db: -10.0 * power.log10(),
        }
    } else {
        ChannelLoss::Unreachable
    }
}

/// Effective loss of a set of traced paths.
pub fn channel_loss(records: &[Record], link: &LinkParameters) -> ChannelLoss {
    let metrics = records
        .iter()
        .map(|record| path_metrics(record, link))
        .collect_vec();
    total_loss(&metrics)
}
