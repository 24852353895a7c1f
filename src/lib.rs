pub mod geometry;
pub mod link;
pub mod loss;
pub mod scanner;
pub mod scene;
pub mod tracer;
mod util;

pub use link::{LinkBudget, ReceivedSignal};
pub use loss::{ChannelLoss, LinkParameters, PathMetrics, channel_loss, path_metrics, total_loss};
pub use scanner::{ReceiverGrid, ScanJob, ScanProgress, ScanRow, WorkerCount, scan, scan_blocking};
pub use scene::TriangleBvh;
pub use tracer::{Record, TraceSettings, Tracer, TracerId};
