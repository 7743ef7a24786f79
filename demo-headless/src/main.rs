use clap::Parser;
use radtrans_core::{
    accumulate, copy_bands, synchronize, CoordSystem, GridLayout, PartitionPlan, PlasmaCell,
    RunConfig, SegmentSampler, SyncReport, Transport, WindGrid, WorkerGroup,
};
use std::error::Error;
use std::ops::Range;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Radiative transfer estimator demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "radtrans-demo")]
#[command(about = "Synchronize a partitioned grid and accumulate sampled photon segments")]
#[command(long_about = None)]
struct Args {
    /// JSON run configuration; flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// Number of workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Cells per axis (shells for a spherical grid)
    #[arg(long)]
    cells: Option<usize>,

    /// Segments sampled per owned cell
    #[arg(short, long)]
    photons: Option<usize>,

    /// Sampler seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Use spherical shells instead of a cylindrical mesh
    #[arg(long)]
    spherical: bool,
}

/// What one worker hands back after its run
struct WorkerResult {
    rank: usize,
    owned: Range<usize>,
    grid: WindGrid,
    report: SyncReport,
}

type WorkerOutcome = Result<WorkerResult, Box<dyn Error + Send + Sync>>;

fn build_config(args: &Args) -> Result<RunConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(photons) = args.photons {
        config.photons_per_cell = photons;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.spherical {
        config.layout = GridLayout {
            coord_system: CoordSystem::Spherical,
            ..config.layout
        };
    }
    if let Some(cells) = args.cells {
        config.layout.n_x = cells;
        config.layout.n_z = cells;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let bands = config.band_set()?;

    println!("=== Radiative Transfer Estimator Demo ===\n");

    let mut serial = WindGrid::single(config.layout.clone())?;
    serial.define_all()?;
    let plan = PartitionPlan::balanced(serial.cell_count(), config.workers)?;
    plan.validate()?;
    println!(
        "Grid: {:?} with {} cells over {} workers (at most {} per worker)",
        config.layout.coord_system,
        serial.cell_count(),
        plan.workers(),
        plan.max_cells_per_rank()
    );
    println!("Bands: {}", bands.len());

    let group = WorkerGroup::new(config.workers)?;
    let results = group.run(|mut transport| -> WorkerOutcome {
        let rank = transport.rank();
        let owned = plan.partition(rank)?.range();

        let mut grid = WindGrid::single(config.layout.clone())?;
        grid.define_range(owned.clone())?;
        let report = synchronize(
            &mut transport,
            &mut grid.cells,
            owned.clone(),
            plan.max_cells_per_rank(),
        )?;
        copy_bands(&bands, &mut grid.plasma);

        let mut sampler = SegmentSampler::new(
            config.seed.wrapping_add(rank as u64),
            config.freq_min,
            config.freq_max,
        );
        for n in owned.clone() {
            let coord_system = grid.coord_system(&grid.cells[n]);
            for _ in 0..config.photons_per_cell {
                let segment = sampler.sample(&grid.cells[n]);
                accumulate(&mut grid.plasma[n], &segment, coord_system);
            }
        }

        Ok(WorkerResult {
            rank,
            owned,
            grid,
            report,
        })
    });

    println!("\n=== Synchronization ===");
    let mut owned_plasma: Vec<PlasmaCell> = Vec::with_capacity(serial.cell_count());
    let mut all_consistent = true;
    for result in results {
        let result = result.map_err(|e| e.to_string())?;
        let consistent = result.grid.cells == serial.cells;
        if !consistent {
            warn!("Worker {} diverged from the serial grid", result.rank);
            all_consistent = false;
        }
        println!(
            "Worker {}: cells {:?}, sent {}, received {}, buffer {} bytes, grid {}",
            result.rank,
            result.owned,
            result.report.cells_sent,
            result.report.cells_received,
            result.report.buffer_capacity,
            if consistent { "matches" } else { "DIVERGED" }
        );
        owned_plasma.extend(result.grid.plasma[result.owned].iter().cloned());
    }

    print_summary(&owned_plasma);

    if all_consistent {
        info!("All workers hold identical grids");
        Ok(())
    } else {
        Err("worker grids diverged".into())
    }
}

fn print_summary(plasma: &[PlasmaCell]) {
    let j: f64 = plasma.iter().map(|c| c.j).sum();
    let j_direct: f64 = plasma.iter().map(|c| c.j_direct).sum();
    let ip: f64 = plasma.iter().map(|c| c.ip).sum();
    let xi: f64 = plasma.iter().map(|c| c.xi).sum();
    let segments: u64 = plasma.iter().map(|c| c.segment_count).sum();
    let photons: u64 = plasma.iter().map(|c| c.provenance.total).sum();
    let ionizing: u64 = plasma.iter().map(|c| c.ionizing_photons).sum();

    println!("\n=== Estimators ===");
    println!("Segments:          {segments}");
    println!("Distinct photons:  {photons} ({ionizing} ionizing)");
    println!(
        "Sum of j:          {j:.4e} (direct fraction {:.3})",
        j_direct / j.max(f64::MIN_POSITIVE)
    );
    println!("Sum of ip:         {ip:.4e}");
    println!("Sum of xi:         {xi:.4e}");

    if let Some(cell) = plasma.iter().max_by(|a, b| a.j.total_cmp(&b.j)) {
        println!("\nBrightest cell {}:", cell.index);
        if let Some(freq) = cell.mean_frequency() {
            println!("  mean frequency {freq:.3e} Hz");
        }
        for (i, band) in cell.active_bands().iter().enumerate() {
            if let Some(mean) = band.mean_frequency() {
                println!(
                    "  band {:2} [{:.2e}, {:.2e}]: {:4} segments, mean {:.3e} Hz",
                    i, cell.bands.f1[i], cell.bands.f2[i], band.count, mean
                );
            }
        }
    }
}
