mod machinery;
mod receivers;

use std::num::NonZeroUsize;

use bon::bon;

use crate::{
    geometry::WorldPoint,
    loss::{ChannelLoss, LinkParameters},
};

pub use machinery::{ScanProgress, scan, scan_blocking};
pub use receivers::{ReceiverGrid, random_receivers};

/// How many worker threads a scan uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per available core
    #[default]
    Auto,
    Manual(NonZeroUsize),
}

impl WorkerCount {
    pub fn resolve(&self) -> usize {
        match self {
            WorkerCount::Auto => core_affinity::get_core_ids()
                .map(|cores| cores.len())
                .filter(|count| *count > 0)
                .unwrap_or_else(num_cpus::get),
            WorkerCount::Manual(count) => count.get(),
        }
    }
}

/// One transmitter against many receiver candidates.
#[derive(Clone, Debug)]
pub struct ScanJob {
    pub transmitter: WorldPoint,
    pub receivers: Vec<WorldPoint>,
    pub link: LinkParameters,
    pub workers: WorkerCount,
    /// Both endpoints must see the open sky, otherwise the receiver is unreachable.
    pub require_outdoor: bool,
}

#[bon]
impl ScanJob {
    #[builder]
    pub fn new(
        transmitter: WorldPoint,
        receivers: Vec<WorldPoint>,
        #[builder(default)] link: LinkParameters,
        #[builder(default)] workers: WorkerCount,
        #[builder(default = true)] require_outdoor: bool,
    ) -> Self {
        ScanJob {
            transmitter,
            receivers,
            link,
            workers,
            require_outdoor,
        }
    }
}

/// Result for a single receiver candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScanRow {
    pub receiver: WorldPoint,
    pub loss: ChannelLoss,
}
