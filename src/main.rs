//! `moortune` command line.
//!
//! Subcommands:
//!   tune      two-phase line-length tuning (rough uplift sizing, fine frequency match)
//!   anchors   catenary estimate and anchor layout for a platform at a depth
//!   generate  patch one template file
//!   run       run the simulator on input files and archive their output
//!   channels  list the channels of a binary output file
//!   metocean  parse NDBC buoy records

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use moortune::config::TunerConfig;
use moortune::io::outb::OutbFile;
use moortune::io::runner::{FastRunner, TimeoutPolicy};
use moortune::io::template::{MismatchPolicy, Patch, PatchValue, Template};
use moortune::mechanics::catenary::{self, MooringGeometry};
use moortune::mechanics::dominant_frequency;
use moortune::platform::Platform;
use moortune::sessions::MooringSession;
use moortune::systems::sdk::{Hook, Iteration};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "moortune", version, about = "Mooring-line tuning for FAST/OpenFAST floating platforms")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tune the unstretched line length for a platform at a new water depth
    Tune(TuneArgs),
    /// Print the initial line length and anchor positions
    Anchors {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        depth: f64,
    },
    /// Write a copy of a template with parameters replaced
    Generate {
        template: PathBuf,
        output: PathBuf,
        /// `Name=value` or `Name(i)=value`; repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
        sets: Vec<String>,
        /// Log and skip parameters the template does not contain
        #[arg(long)]
        skip_missing: bool,
    },
    /// Run the simulator on each input file in order
    Run {
        #[arg(long)]
        fast_exe: PathBuf,
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Extra attempts after a timeout
        #[arg(long, default_value = "0")]
        retries: u32,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// List the channels of a `.outb` file
    Channels {
        file: PathBuf,
        /// Also print the dominant frequency of this channel
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Parse NDBC buoy records and print them as tab-separated values
    #[cfg(feature = "metocean")]
    Metocean {
        #[arg(value_enum)]
        kind: RecordKind,
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct TuneArgs {
    /// TOML tuning configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    depth: Option<f64>,
    #[arg(long)]
    fast_exe: Option<PathBuf>,
    #[arg(long)]
    template_dir: Option<PathBuf>,
    #[arg(long)]
    baseline: Option<PathBuf>,
    /// MoorDyn file written for the tuned length
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[cfg(feature = "metocean")]
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RecordKind {
    Met,
    Wind,
    Current,
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moortune=info".into()),
        )
        .init();

    match Args::parse().command {
        Command::Tune(args) => tune(args),
        Command::Anchors { platform, depth } => anchors(&platform, depth),
        Command::Generate { template, output, sets, skip_missing } => {
            generate(template, output, &sets, skip_missing)
        }
        Command::Run { fast_exe, timeout_secs, retries, inputs } => {
            let policy = if retries == 0 {
                TimeoutPolicy::Fail
            } else {
                TimeoutPolicy::Retry { attempts: retries + 1 }
            };
            let runner = FastRunner::new(fast_exe)
                .with_timeout(timeout_secs.map(Duration::from_secs))
                .with_timeout_policy(policy);
            for out in runner.run_all(&inputs)? {
                println!("{}", out.display());
            }
            Ok(())
        }
        Command::Channels { file, frequency } => channels(file, frequency.as_deref()),
        #[cfg(feature = "metocean")]
        Command::Metocean { kind, file } => metocean(kind, file),
    }
}

/// Prints one line per tested length.
struct Progress;

impl Hook for Progress {
    fn on_observe(&mut self, it: &Iteration) {
        eprintln!("{:>5} #{:<3} length {:>10.3} m  metric {:+.6}", it.phase, it.iteration, it.line_length, it.metric);
    }
}

fn tune(args: TuneArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => TunerConfig::from_file(path)?,
        None => {
            let (Some(platform), Some(depth), Some(exe)) = (&args.platform, args.depth, &args.fast_exe) else {
                bail!("without --config, --platform, --depth and --fast-exe are required");
            };
            TunerConfig::new(platform.clone(), depth, exe.clone())
        }
    };
    if args.config.is_some() {
        if let Some(platform) = args.platform {
            cfg.platform = platform;
        }
        if let Some(depth) = args.depth {
            cfg.water_depth = depth;
        }
        if let Some(exe) = args.fast_exe {
            cfg.simulator.executable = exe;
        }
    }
    if let Some(dir) = args.template_dir {
        cfg.template_dir = dir;
    }
    if let Some(baseline) = args.baseline {
        cfg.baseline = Some(baseline);
    }
    if let Some(output) = args.output {
        cfg.output = output;
    }
    if let Some(secs) = args.timeout_secs {
        cfg.simulator.timeout_secs = Some(secs);
    }

    let mut runner = cfg.runner();
    let session = MooringSession::new(cfg)?;
    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(Progress)];
    let report = session.run(&mut runner, &mut hooks)?;
    info!(
        platform = report.platform,
        rough = report.rough.line_length,
        fine = report.fine.line_length,
        output = %report.output.display(),
        "tuning finished"
    );
    println!("initial length   {:.3} m", report.initial_length);
    println!("rough length     {:.3} m ({} runs)", report.rough.line_length, report.rough.iterations);
    println!("tuned length     {:.3} m ({} runs)", report.fine.line_length, report.fine.iterations);
    println!("moordyn file     {}", report.output.display());
    Ok(())
}

fn anchors(platform: &str, depth: f64) -> Result<()> {
    let platform = Platform::lookup(platform)?;
    let geometry = MooringGeometry::compute(platform, depth)?;
    println!("platform          {}", platform.name);
    println!("water depth       {depth} m");
    println!("proof load        {:.0} N", catenary::proof_load(platform.line.diameter_mm));
    match catenary::initial_line_length(&platform.line, depth) {
        Ok(l0) => println!("initial length    {l0:.3} m"),
        Err(e) => println!("initial length    n/a ({e})"),
    }
    println!("horizontal offset {:.3} m", geometry.horizontal_offset);
    for (i, (x, y)) in geometry.anchors.iter().enumerate() {
        println!("anchor {}          ({x:.3}, {y:.3}, {:.3})", i + 1, geometry.anchor_z());
    }
    Ok(())
}

/// `Name=value` → scalar, `Name(i)=value` → indexed (merged per name).
fn parse_sets(sets: &[String]) -> Result<Patch> {
    let mut patch = Patch::new();
    let mut indexed: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for set in sets {
        let Some((key, value)) = set.split_once('=') else {
            bail!("`{set}` is not KEY=VALUE");
        };
        let key = key.trim();
        match key.split_once('(') {
            Some((name, rest)) => {
                let index = rest.strip_suffix(')').with_context(|| format!("`{key}` has no closing parenthesis"))?;
                match indexed.iter_mut().find(|(n, _)| n == name) {
                    Some((_, values)) => values.push((index.to_string(), value.to_string())),
                    None => indexed.push((name.to_string(), vec![(index.to_string(), value.to_string())])),
                }
            }
            None => patch.insert(key, PatchValue::Scalar(value.to_string())),
        }
    }
    for (name, values) in indexed {
        patch = patch.indexed(name, values);
    }
    Ok(patch)
}

fn generate(template: PathBuf, output: PathBuf, sets: &[String], skip_missing: bool) -> Result<()> {
    let patch = parse_sets(sets)?;
    let policy = if skip_missing { MismatchPolicy::Skip } else { MismatchPolicy::Fail };
    let mut t = Template::load(&template)?.with_policy(policy);
    t.apply(&patch)?;
    t.write(&output)?;
    info!(template = %template.display(), output = %output.display(), format = %t.format(), "template written");
    Ok(())
}

fn channels(file: PathBuf, frequency: Option<&str>) -> Result<()> {
    let outb = OutbFile::read(&file)?;
    println!("{} ({} samples)", outb.description.trim(), outb.n_samples());
    for (name, unit) in outb.channels.iter().zip(&outb.units) {
        println!("  {name:<16} {}", unit.trim());
    }
    if let Some(channel) = frequency {
        let series = outb.select(&file, &[channel])?;
        let f = dominant_frequency(series.time(), &series.column(0))?;
        println!("dominant frequency of {channel}: {f:.6} Hz");
    }
    Ok(())
}

#[cfg(feature = "metocean")]
fn metocean(kind: RecordKind, file: PathBuf) -> Result<()> {
    use moortune::metocean::{read_current, read_met, read_wind};

    let cell = |v: Option<f64>| v.map_or_else(|| "NA".to_string(), |v| v.to_string());
    match kind {
        RecordKind::Met => {
            println!("time\twind_dir\twind_speed\twave_height\tpeak_period\twave_dir");
            for r in read_met(&file)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.time,
                    cell(r.wind_dir),
                    cell(r.wind_speed),
                    cell(r.wave_height),
                    cell(r.peak_period),
                    cell(r.wave_dir)
                );
            }
        }
        RecordKind::Wind => {
            println!("time\twind_dir\twind_speed");
            for r in read_wind(&file)? {
                println!("{}\t{}\t{}", r.time, cell(r.wind_dir), cell(r.wind_speed));
            }
        }
        RecordKind::Current => {
            println!("time\tdepth\tdirection\tspeed");
            for r in read_current(&file)? {
                println!("{}\t{}\t{}\t{}", r.time, cell(r.depth), cell(r.direction), cell(r.speed));
            }
        }
    }
    Ok(())
}
