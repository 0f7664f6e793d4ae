mod cli;
mod progress;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    match args.command {
        Command::Fit(args)      => fit_raw_volume(args),
        Command::Simulate(args) => simulate_volume(args),
        Command::Config { out } => write_default_config(out.as_deref()),
    }
}

fn fit_raw_volume(args: FitArgs) -> Result<(), Box<dyn Error>> {
    let mut progress = Progress::new();
    let config = match &args.config {
        Some(path) => read_config_file(path, args.repair_bounds)?,
        None       => Config::default(),
    };
    let (nx, ny, nz) = args.shape;

    progress.start("Reading volume");
    let time = io::read_time_axis(&args.time, args.acquisition_times)?;
    let data = io::raw::read_volume(&args.volume, (nx, ny, nz, time.len()))?;
    let volume = Volume::new(data, time)?;
    progress.done();

    let mut series = Timeseries::import(volume, config)?;
    if !args.mask.is_empty() {
        let masks = args.mask.iter()
            .map(|path| io::raw::read_mask(path, args.shape))
            .collect::<washfit::Result<Vec<_>>>()?;
        series.replace_masks(&masks)?;
    }

    let voxels = match (args.voxel, args.slice) {
        (Some(xyz), _) => vec![Voxel::from(xyz)],
        (_, Some(z))   => series.maps().voxels_in_slice(z),
        _              => series.maps().all_voxels(),
    };
    let entry = match (args.voxel, args.slice) {
        (Some(_), _) => Entry::One,
        (_, Some(_)) => Entry::Slice,
        _            => Entry::All,
    };
    fit_and_export(&mut series, &voxels, entry, &args.output, &args.threads)
}

fn simulate_volume(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut progress = Progress::new();
    let mut simulation = match &args.config {
        Some(path) => read_simulation_file(path)?,
        None       => Simulation::default(),
    };
    if let Some(seed) = args.seed { simulation.seed = seed }

    progress.start("Simulating volume");
    let sim = simulate(&simulation)?;
    progress.done();

    let out = &args.output.out;
    create_dir_all(out)?;
    let [ny, nx, nz] = sim.volume.shape();
    let zyxt = sim.volume.data().view().permuted_axes([3, 2, 0, 1]);
    io::raw::write(zyxt.iter().map(|&v| v as f32), &out.join("volume.raw"))?;
    io::raw::write_map(&sim.mask.mapv(f64::from), &out.join("mask.raw"))?;
    let time = sim.volume.time().iter().map(|t| t.to_string()).join("\n");
    fs::write(out.join("time.txt"), time + "\n")?;
    let mut truth = File::create(out.join("parameters.csv"))?;
    writeln!(truth, "Slice, Peak, R1, R2, Delay1, Delay2, Base, Noise")?;
    for (z, (p, amplitude)) in sim.params.iter().zip(&sim.amplitudes).enumerate() {
        writeln!(truth, "{z},{}", p.iter().chain([amplitude]).join(","))?;
    }
    println!("Wrote {nx} x {ny} x {nz} voxels with {} time points to {}", sim.volume.n_times(), out.display());

    let Some(fit_config) = args.fit else { return Ok(()) };
    let config = match fit_config {
        Some(path) => read_config_file(&path, false)?,
        None       => Config::default(),
    };
    let mut series = Timeseries::import_with_mask(sim.volume, config, &sim.mask, sim.noise)?;
    let voxels = series.maps().all_voxels();
    fit_and_export(&mut series, &voxels, Entry::All, &args.output, &args.threads)
}

fn fit_and_export(
    series : &mut Timeseries,
    voxels : &[Voxel],
    entry  : Entry,
    output : &OutputArgs,
    threads: &ThreadArgs,
) -> Result<(), Box<dyn Error>> {
    let mut progress = Progress::new();
    // Before starting the potentially long computation, make sure that we can
    // write the results
    create_dir_all(&output.out)?;

    if threads.parallel {
        match rayon::ThreadPoolBuilder::new().num_threads(threads.threads).build_global() {
            Err(e) => println!("{e}"),
            Ok(_)  => println!("Using up to {} threads.", threads.threads),
        }
    }

    let n_slices = voxels.iter().map(|v| v.z).dedup().count();
    let bar = SliceProgress::new(n_slices);
    let cancel = CancelToken::new();
    let report = series.fit(voxels, entry, |m| bar.status(m), &cancel, threads.parallel)?;
    bar.finish(&report);
    progress.done_with_message(&format!("Fitted {} voxels", group_digits(report.fitted)));

    let unconverged = series.maps().get(MapName::Badfit).iter().filter(|&&b| b != 0.0).count();
    if unconverged > 0 {
        println!("{} voxel(s) did not converge cleanly", group_digits(unconverged));
    }
    if let Some(last) = &report.last {
        let names = series.variant().param_names();
        let params = names.iter().zip(&last.params).map(|(n, a)| format!("{n} = {a:.3}")).join(", ");
        println!("Last voxel ({}, {}, {}): {params}, chis = {:.4e}", last.voxel.x, last.voxel.y, last.voxel.z, last.chis);
    }

    progress.start("Writing results");
    let written = io::raw::write_maps(series.maps(), &output.out, "map")?;
    let mut by_voxel = BufWriter::new(File::create(output.out.join("by_voxel.csv"))?);
    io::csv::write_by_voxel(series.maps(), &output.study_uid, &mut by_voxel)?;
    by_voxel.flush()?;
    for &label in &output.label {
        let mut by_slice = BufWriter::new(File::create(output.out.join(format!("by_slice_label_{label}.csv")))?);
        io::csv::write_by_slice(series.maps(), label, &output.study_uid, &mut by_slice)?;
        by_slice.flush()?;
    }
    progress.done();
    println!("Wrote {} maps and CSV tables to {}", written.len(), output.out.display());
    Ok(())
}

fn write_default_config(out: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match out {
        Some(path) => {
            fs::write(path, DEFAULT_CONFIG_TOML)?;
            println!("Wrote default configuration to {}", path.display());
        },
        None => print!("{DEFAULT_CONFIG_TOML}"),
    }
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::error::Error;
use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use clap::Parser;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;
use washfit::{
    CancelToken, Config, Entry, MapName, Timeseries, Voxel, Volume,
    config::{
        fit::{read_config_file, DEFAULT_CONFIG_TOML},
        simulation::{read_simulation_file, Simulation},
    },
    io,
    simulate::simulate,
    utils::{group_digits, timing::Progress},
};
use cli::{Cli, Command, FitArgs, OutputArgs, SimulateArgs, ThreadArgs};
use progress::SliceProgress;
