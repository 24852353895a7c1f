use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context as _, anyhow};

use crate::{
    geometry::WorldPoint,
    loss::{self, ChannelLoss},
    scanner::{ScanJob, ScanRow},
    scene::StackCache,
    tracer::Tracer,
    util::Summary,
};

/// Evaluates every receiver of the job on a pool of worker threads.
///
/// Rows are appended to `results` as they finish, so their order is completion order.
/// `finished_callback` is called from the worker threads after each row is stored.
pub fn scan<F: Fn(&ScanRow) + Send + Sync + 'static>(
    tracer: Arc<Tracer>,
    job: ScanJob,
    results: Arc<Mutex<Vec<ScanRow>>>,
    finished_callback: F,
) -> anyhow::Result<ScanProgress> {
    let worker_count = job.workers.resolve();
    let transmitter_outdoor = !job.require_outdoor || tracer.is_outdoor(&job.transmitter);
    if !transmitter_outdoor {
        log::warn!(
            "Transmitter at {} is covered, every receiver will be unreachable",
            job.transmitter
        );
    }

    log::info!(
        "Scanning {} receivers with {} on {worker_count} workers",
        job.receivers.len(),
        tracer.id()
    );

    let state = Arc::new(ScanState {
        tracer,
        job,
        transmitter_outdoor,

        results,

        next_receiver_index: AtomicUsize::new(0),
        finished_count: AtomicUsize::new(0),
    });
    let finished_callback = Arc::new(finished_callback);

    let mut cores = core_affinity::get_core_ids().unwrap_or_default();
    if cores.is_empty() {
        log::debug!("CPU list not available, worker threads won't be pinned");
    }
    cores.truncate(worker_count);

    let threads = spawn_workers(&state, worker_count, |worker_id| {
        let state = Arc::clone(&state);
        let finished_callback = Arc::clone(&finished_callback);
        let core = cores.get(worker_id).copied();

        thread::Builder::new()
            .name(format!("worker{worker_id}"))
            .spawn(move || {
                if let Some(core) = core {
                    core_affinity::set_for_current(core);
                }
                state.work(&mut StackCache::default(), &*finished_callback);
            })
    })?;

    Ok(ScanProgress {
        scan_state: state,
        threads,
    })
}

/// Spawns `count` workers with `spawn_one`.
/// If any spawn fails, the remaining receivers are withdrawn and the workers that
/// already started are joined before the error is returned.
fn spawn_workers(
    state: &ScanState,
    count: usize,
    mut spawn_one: impl FnMut(usize) -> std::io::Result<JoinHandle<()>>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut threads = Vec::with_capacity(count);
    for worker_id in 0..count {
        match spawn_one(worker_id) {
            Ok(handle) => threads.push(handle),
            Err(err) => {
                state
                    .next_receiver_index
                    .fetch_max(state.job.receivers.len(), Ordering::AcqRel);
                for handle in threads {
                    if handle.join().is_err() {
                        log::error!("Scan worker panicked while shutting down");
                    }
                }
                return Err(err).context(format!("Spawning scan worker {worker_id}"));
            }
        }
    }
    Ok(threads)
}

/// Runs a scan to completion and returns its rows, in completion order.
pub fn scan_blocking(tracer: Arc<Tracer>, job: ScanJob) -> anyhow::Result<Vec<ScanRow>> {
    let results = Arc::new(Mutex::new(Vec::with_capacity(job.receivers.len())));
    let mut progress = scan(tracer, job, Arc::clone(&results), |_| {})?;
    progress.wait()?;

    let rows = std::mem::take(&mut *results.lock().map_err(|_| anyhow!("Poisoned lock!"))?);
    Ok(rows)
}

pub struct ScanProgress {
    scan_state: Arc<ScanState>,
    threads: Vec<JoinHandle<()>>,
}

impl ScanProgress {
    /// Return number of finished and total receivers.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.scan_state.job.receivers.len();
        let finished = self
            .scan_state
            .finished_count
            .load(Ordering::Acquire)
            .min(total);
        (finished, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (finished, total) = self.progress();
        if total == 0 {
            100.0
        } else {
            100.0 * (finished as f32) / (total as f32)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Wait for the workers to finish.
    pub fn wait(&mut self) -> anyhow::Result<()> {
        for handle in self.threads.drain(..) {
            handle
                .join()
                .map_err(|_| anyhow!("Scan worker thread panicked"))?;
        }
        Ok(())
    }
}

struct ScanState {
    tracer: Arc<Tracer>,
    job: ScanJob,
    transmitter_outdoor: bool,

    results: Arc<Mutex<Vec<ScanRow>>>,

    next_receiver_index: AtomicUsize,
    finished_count: AtomicUsize,
}

impl ScanState {
    fn work(&self, stack: &mut StackCache, finished_callback: &impl Fn(&ScanRow)) {
        while let Some(receiver) = self.get_next_receiver() {
            let row = ScanRow {
                receiver: *receiver,
                loss: self.evaluate(receiver, stack),
            };
            self.results.lock().expect("Poisoned lock!").push(row);
            finished_callback(&row);

            let finished = self.finished_count.fetch_add(1, Ordering::AcqRel) + 1;
            if finished == self.job.receivers.len() {
                self.log_completion();
            }
        }
    }

    fn log_completion(&self) {
        let total = self.job.receivers.len();
        let summary = self.completion_summary();
        log::info!(
            "Scan finished, {total} receivers evaluated, {} reachable",
            summary.count
        );
        log::info!("Loss of reachable receivers (dB): {summary}");
    }

    /// Losses of the reachable receivers of this scan.
    /// Every row is stored before it is counted, so once the scan is finished
    /// its rows are the last ones in the results.
    fn completion_summary(&self) -> Summary {
        self.results
            .lock()
            .expect("Poisoned lock!")
            .iter()
            .rev()
            .take(self.job.receivers.len())
            .filter_map(|row| row.loss.loss_db())
            .collect()
    }

    fn get_next_receiver(&self) -> Option<&WorldPoint> {
        let id = self.next_receiver_index.fetch_add(1, Ordering::AcqRel);
        self.job.receivers.get(id)
    }

    fn evaluate(&self, receiver: &WorldPoint, stack: &mut StackCache) -> ChannelLoss {
        if !self.transmitter_outdoor
            || (self.job.require_outdoor && !self.tracer.is_outdoor_with_stack(receiver, stack))
        {
            return ChannelLoss::Unreachable;
        }

        let records = self
            .tracer
            .trace_with_stack(&self.job.transmitter, receiver, stack);
        loss::channel_loss(&records, &self.job.link)
    }
}
