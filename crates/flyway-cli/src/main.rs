use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use flyway_core::generate::{self, BatchOpts, ScenarioOpts};
use flyway_core::output::{prepare_output_dir, write_atomic};
use flyway_core::{AllocationFile, ScenarioId};
use flyway_driver::{Layout, RunConfig, RunOpts};
use log::info;
use ns3_frontend::Launcher;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generate, simulate, and analyze flyway data center traffic logs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate synthetic flow logs and allocation logs
    Generate(GenerateArgs),
    /// Run the simulator over every flow log and allocation log pair
    Run(RunArgs),
    /// Convert allocation logs into adjacency tensors
    Parse(ParseArgs),
    /// Report the best allocation of each scenario
    Best(BestArgs),
    /// Draw an allocation as an SVG diagram
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Output directory
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Number of ToR switches
    #[arg(short = 't', long)]
    num_tors: usize,

    /// Flows per time step
    #[arg(long, default_value_t = 15)]
    flows_per_step: usize,

    /// Number of time steps
    #[arg(long, default_value_t = 1)]
    time_steps: u64,

    /// Number of scenarios (flow logs)
    #[arg(long, default_value_t = 1)]
    scenarios: usize,

    /// Allocation logs per scenario
    #[arg(long, default_value_t = 4)]
    variants: usize,

    /// Wireless flows per allocation
    #[arg(long, default_value_t = 4)]
    wireless: usize,

    /// Random seed; drawn at random if absent
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write into an existing output directory without asking
    #[arg(short, long)]
    yes: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory of flow logs and allocation logs
    #[arg(short, long)]
    flow_dir: PathBuf,

    /// Results directory
    #[arg(short, long)]
    results_dir: PathBuf,

    /// JSON run settings; flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The ns-3 source tree
    #[arg(long)]
    ns3_dir: Option<PathBuf>,

    /// Topology file, relative to the ns-3 tree unless absolute
    #[arg(long)]
    topology: Option<PathBuf>,

    /// The ns-3 program to run
    #[arg(long)]
    program: Option<String>,

    /// Antenna gain
    #[arg(long)]
    gain: Option<f64>,

    /// Per-run time limit in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum number of simulator runs in flight
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Run the program directly instead of through waf
    #[arg(long)]
    direct: bool,

    /// Write into an existing results directory without asking
    #[arg(short, long)]
    yes: bool,
}

impl RunArgs {
    fn config(&self) -> anyhow::Result<RunConfig> {
        let flags = RunConfig {
            ns3_dir: self.ns3_dir.clone(),
            topology: self.topology.clone(),
            program: self.program.clone(),
            gain: self.gain,
            timeout_secs: self.timeout_secs,
            jobs: self.jobs,
            launcher: self.direct.then_some(Launcher::Direct),
        };
        let file = match &self.config {
            Some(path) => flyway_driver::read_run_config(path)?,
            None => RunConfig::default(),
        };
        Ok(flags.or(file))
    }
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Directory of allocation logs
    #[arg(short, long)]
    flow_dir: PathBuf,

    /// Number of ToR switches
    #[arg(short = 't', long)]
    num_tors: usize,

    /// Write xs.json, ys.json, and ids.json to this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write into an existing output directory without asking
    #[arg(short, long)]
    yes: bool,
}

#[derive(Args, Debug)]
struct BestArgs {
    /// Results directory
    #[arg(short, long)]
    results_dir: PathBuf,

    /// Only report this scenario
    #[arg(short, long)]
    scenario: Option<ScenarioId>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Allocation log to draw
    #[arg(short, long)]
    alloc: PathBuf,

    /// Number of ToR switches
    #[arg(short = 't', long)]
    num_tors: usize,

    /// Output SVG file
    #[arg(short, long)]
    output: PathBuf,

    /// ToRs per grid row
    #[arg(long, default_value_t = 4)]
    racks_per_row: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Run(args) => run(args),
        Command::Parse(args) => parse(args),
        Command::Best(args) => best(args),
        Command::Render(args) => render(args),
    }
}

fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let opts = BatchOpts::builder()
        .scenario(
            ScenarioOpts::builder()
                .num_tors(args.num_tors)
                .flows_per_step(args.flows_per_step)
                .time_steps(args.time_steps)
                .build(),
        )
        .nr_scenarios(args.scenarios)
        .variants_per_scenario(args.variants)
        .nr_wireless(args.wireless)
        .build();
    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Using seed {seed}");
    let allow_overwrite = confirm_overwrite(&args.output_dir, args.yes)?;
    let mut rng = StdRng::seed_from_u64(seed);
    generate::generate_batch(&args.output_dir, &opts, allow_overwrite, &mut rng)?;
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let sim = config.simulator()?;
    let opts = RunOpts::builder()
        .allow_overwrite(confirm_overwrite(&args.results_dir, args.yes)?)
        .jobs(config.jobs.unwrap_or(1))
        .build();
    // Simulations run in their own process groups and miss the terminal's interrupt.
    ctrlc::set_handler(|| {
        ns3_frontend::kill_running();
        std::process::exit(130);
    })
    .with_context(|| "failed to set interrupt handler")?;
    let summary = flyway_driver::run_all(&sim, &args.flow_dir, &args.results_dir, &opts)?;
    for failure in &summary.failed {
        let mut msg = failure.error.to_string();
        let mut source = failure.error.source();
        while let Some(e) = source {
            msg.push_str(&format!(": {e}"));
            source = e.source();
        }
        println!("{}_{} failed: {msg}", failure.scenario, failure.variant);
    }
    println!(
        "{} succeeded, {} failed, {} scenarios skipped",
        summary.succeeded.len(),
        summary.failed.len(),
        summary.skipped.len()
    );
    Ok(())
}

fn parse(args: ParseArgs) -> anyhow::Result<()> {
    let batch = flyway_driver::parse_all(&args.flow_dir, args.num_tors)?;
    println!(
        "xs: {:?}, ys: {:?}, {} allocations",
        batch.xs.shape(),
        batch.ys.shape(),
        batch.len()
    );
    if let Some(dir) = &args.output_dir {
        prepare_output_dir(dir, confirm_overwrite(dir, args.yes)?)?;
        write_atomic(&dir.join("xs.json"), serde_json::to_vec(&batch.xs)?)?;
        write_atomic(&dir.join("ys.json"), serde_json::to_vec(&batch.ys)?)?;
        write_atomic(&dir.join("ids.json"), serde_json::to_vec(&batch.ids)?)?;
        info!("Wrote tensors to {}", dir.display());
    }
    Ok(())
}

fn best(args: BestArgs) -> anyhow::Result<()> {
    let mut bests = flyway_driver::summarize(&args.results_dir)?;
    if let Some(scenario) = args.scenario {
        bests.retain(|best| best.scenario == scenario);
        anyhow::ensure!(
            !bests.is_empty(),
            "no results for scenario {scenario} in {}",
            args.results_dir.display()
        );
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&bests)?);
        return Ok(());
    }
    for best in &bests {
        println!(
            "scenario {}: variant {} ({} average throughput over {} variants)",
            best.scenario, best.variant, best.throughput, best.nr_variants
        );
    }
    Ok(())
}

fn render(args: RenderArgs) -> anyhow::Result<()> {
    let alloc = AllocationFile::read(&args.alloc)?;
    let layout = Layout::builder().racks_per_row(args.racks_per_row).build();
    flyway_driver::render_allocation_diagram(&alloc, args.num_tors, &layout, &args.output)?;
    Ok(())
}

/// Whether `dir` may be written into. Asks on the terminal if it already exists.
fn confirm_overwrite(dir: &Path, yes: bool) -> anyhow::Result<bool> {
    if yes || !dir.exists() {
        return Ok(yes);
    }
    print!("{} already exists. Overwrite? [y/n] ", dir.display());
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    if !matches!(answer.trim(), "y" | "Y" | "yes") {
        anyhow::bail!("not overwriting {}", dir.display());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_defaults() {
        let cli = Cli::try_parse_from(["flyway", "generate", "-o", "logs", "-t", "12"]).unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.num_tors, 12);
        assert_eq!(args.flows_per_step, 15);
        assert_eq!(args.variants, 4);
        assert_eq!(args.wireless, 4);
        assert_eq!(args.seed, None);
        assert!(!args.yes);
    }

    #[test]
    fn run_flags_override_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{ "ns3_dir": "/opt/ns-3.9", "topology": "topo.dat", "gain": 18, "jobs": 2 }"#,
        )?;
        let cli = Cli::try_parse_from([
            "flyway",
            "run",
            "-f",
            "logs",
            "-r",
            "results",
            "--config",
            path.to_str().unwrap(),
            "--gain",
            "30",
            "--direct",
        ])?;
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.config()?;
        assert_eq!(config.gain, Some(30.0));
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.launcher, Some(Launcher::Direct));
        assert_eq!(config.ns3_dir, Some(PathBuf::from("/opt/ns-3.9")));
        Ok(())
    }

    #[test]
    fn best_takes_a_scenario() {
        let cli = Cli::try_parse_from(["flyway", "best", "-r", "results", "-s", "3"]).unwrap();
        let Command::Best(args) = cli.command else {
            panic!("expected best");
        };
        assert_eq!(args.scenario, Some(ScenarioId::new(3)));
    }

    #[test]
    fn missing_dir_needs_no_confirmation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(!confirm_overwrite(&dir.path().join("new"), false)?);
        assert!(confirm_overwrite(dir.path(), true)?);
        Ok(())
    }
}
