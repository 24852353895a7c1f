use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context as _, anyhow};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use itertools::Itertools as _;
use ordered_float::OrderedFloat;
use rand::{SeedableRng, rngs::SmallRng};

use radiopath::{
    ChannelLoss, LinkBudget, LinkParameters, ReceiverGrid, ScanJob, TraceSettings, Tracer,
    TracerId, WorkerCount,
    geometry::{FloatType, WorldPoint, WorldVector},
    link::receive_strength_percent,
    path_metrics,
    scanner::{random_receivers, scan},
    scene::{Object as _, TriangleBvh},
};

#[derive(Parser)]
#[command(
    name = "radiopath-cli",
    about = "Radio path loss over a triangle mesh scene",
    long_about = None
)]
struct Cli {
    /// Wavefront OBJ file with the scene
    #[arg(value_name = "FILE")]
    scene: PathBuf,

    /// Transmitter position as x,y,z
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    tx: WorldPoint,

    /// Carrier frequency in Hz
    #[arg(short, long, default_value_t = 2.4e9)]
    frequency: FloatType,

    /// Relative permittivity of the scene surfaces
    #[arg(long, default_value_t = 5.31)]
    permittivity: FloatType,

    /// Scene uses +Z as up instead of +Y
    #[arg(long)]
    z_up: bool,

    /// Skip the diffraction search
    #[arg(long)]
    no_diffraction: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loss from the transmitter to many receivers, printed as CSV
    Coverage {
        /// Distance between grid receivers
        #[arg(long, default_value_t = 5.0)]
        spacing: FloatType,

        /// Receiver height above the lowest point of the scene
        #[arg(long, default_value_t = 1.5)]
        height: FloatType,

        /// Use this many random receivers instead of a grid
        #[arg(short = 'n', long)]
        random: Option<usize>,

        /// Seed for the random receivers
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Worker threads, one per core if missing
        #[arg(short, long)]
        workers: Option<NonZeroUsize>,

        /// Trace receivers that have something above them
        #[arg(long)]
        indoor: bool,

        /// Transmit power in dBm
        #[arg(long, default_value_t = 4.0)]
        tx_power: FloatType,
    },
    /// Every path between the transmitter and a single receiver
    Link {
        /// Receiver position as x,y,z
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        rx: WorldPoint,

        /// Transmit power in dBm
        #[arg(long, default_value_t = 4.0)]
        tx_power: FloatType,

        /// Report the power of a beam steered at the strongest path
        #[arg(long)]
        beamforming: bool,
    },
}

fn parse_point(s: &str) -> Result<WorldPoint, String> {
    let coords: Vec<FloatType> = s
        .split(',')
        .map(|c| c.trim().parse::<FloatType>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("{s:?} is not a point: {e}"))?;
    match coords[..] {
        [x, y, z] => Ok(WorldPoint::new(x, y, z)),
        _ => Err(format!("Expected three coordinates, got {}", coords.len())),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let bvh = TriangleBvh::with_obj(&cli.scene)
        .with_context(|| format!("Loading scene {}", cli.scene.display()))?;
    bvh.log_statistics();

    let up = if cli.z_up {
        WorldVector::z()
    } else {
        WorldVector::y()
    };
    let settings = TraceSettings::builder()
        .up(up)
        .diffraction(!cli.no_diffraction)
        .build();
    let link = LinkParameters::builder()
        .frequency_hz(cli.frequency)
        .permittivity(cli.permittivity)
        .build();
    let tracer = Tracer::new(TracerId(0), bvh, settings);

    match cli.command {
        Commands::Coverage {
            spacing,
            height,
            random,
            seed,
            workers,
            indoor,
            tx_power,
        } => {
            let bounds = tracer.bvh().get_bounding_box();
            let up = tracer.settings().up;
            let receivers = match random {
                Some(count) => {
                    random_receivers(&bounds, &up, height, count, &mut SmallRng::seed_from_u64(seed))
                }
                None => ReceiverGrid::builder()
                    .spacing(spacing)
                    .height(height)
                    .build()
                    .points(&bounds, &up),
            };

            let job = ScanJob::builder()
                .transmitter(cli.tx)
                .receivers(receivers)
                .link(link)
                .workers(workers.map_or(WorkerCount::Auto, WorkerCount::Manual))
                .require_outdoor(!indoor)
                .build();
            coverage(tracer, job, tx_power)
        }
        Commands::Link {
            rx,
            tx_power,
            beamforming,
        } => {
            let budget = LinkBudget::builder().tx_power_dbm(tx_power).build();
            single_link(&tracer, &cli.tx, &rx, &link, &budget, beamforming);
            Ok(())
        }
    }
}

fn coverage(tracer: Tracer, job: ScanJob, tx_power: FloatType) -> anyhow::Result<()> {
    let results = Arc::new(Mutex::new(Vec::with_capacity(job.receivers.len())));
    let bar = ProgressBar::new(job.receivers.len() as u64);

    let mut scan_progress = scan(Arc::new(tracer), job, Arc::clone(&results), {
        let bar = bar.clone();
        move |_| bar.inc(1)
    })?;
    scan_progress.wait()?;
    bar.finish_and_clear();

    let rows = results.lock().map_err(|_| anyhow!("Poisoned lock!"))?;
    println!("x,y,z,loss_db,received_dbm,strength_percent");
    for row in rows.iter().sorted_by_key(|row| {
        let p = row.receiver;
        (OrderedFloat(p.x), OrderedFloat(p.y), OrderedFloat(p.z))
    }) {
        let p = row.receiver;
        match row.loss {
            ChannelLoss::Reachable { loss_db } => {
                let dbm = tx_power - loss_db;
                println!(
                    "{},{},{},{loss_db:.2},{dbm:.2},{:.1}",
                    p.x,
                    p.y,
                    p.z,
                    receive_strength_percent(dbm)
                );
            }
            ChannelLoss::Unreachable => println!("{},{},{},,,", p.x, p.y, p.z),
        }
    }

    Ok(())
}

fn single_link(
    tracer: &Tracer,
    tx: &WorldPoint,
    rx: &WorldPoint,
    link: &LinkParameters,
    budget: &LinkBudget,
    beamforming: bool,
) {
    let records = tracer.trace(tx, rx);
    if records.is_empty() {
        println!("No paths found");
        return;
    }

    let metrics = records.iter().map(|r| path_metrics(r, link)).collect_vec();
    for (record, m) in records.iter().zip(&metrics) {
        println!(
            "{:<10} {:>3} vertices {:>9.2} m {:>9.2} dB {:>9.2} ns",
            record.kind(),
            record.path().len(),
            record.length(),
            m.loss_db,
            m.delay_s * 1e9
        );
    }

    println!("Total loss: {}", radiopath::total_loss(&metrics));
    match budget.evaluate(&metrics) {
        Some(signal) => {
            let dbm = signal.power_dbm(beamforming);
            println!(
                "Received: {dbm:.2} dBm ({:.1} %)",
                receive_strength_percent(dbm)
            );
        }
        None => println!("Received: nothing"),
    }
}
