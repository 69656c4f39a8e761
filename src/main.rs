use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cisco_topology::analysis::{
    analyze_load, format_load_summary, format_network_summary, format_validation_summary,
    validate, write_json_report, TopologyReport,
};
use cisco_topology::ingest::ingest;
use cisco_topology::model::Inventory;
use cisco_topology::render::render_dot;
use cisco_topology::settings::{load_settings, Settings};
use cisco_topology::simulation::{FaultSpec, Simulator};
use cisco_topology::topology::{build_topology, Topology};

/// Topology analyzer for Cisco device configuration dumps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of device folders or `<hostname>_config.dump` files, or a zip archive
    config_path: PathBuf,

    /// Output directory for reports and the topology diagram
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Optional YAML settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Run the neighbour discovery / routing simulation
    #[arg(long)]
    simulate: bool,

    /// Simulated duration in seconds (overrides the settings file)
    #[arg(long, requires = "simulate")]
    duration: Option<u64>,

    /// Fault injected halfway through the simulation:
    /// DEVICE:interface_down:IFACE or DEVICE:device_failure
    #[arg(long = "fault", requires = "simulate")]
    faults: Vec<FaultSpec>,

    /// Log filter, e.g. `debug` or `cisco_topology=trace`
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = &args.log_level {
        logger.parse_filters(level);
    }
    logger.init();

    info!("Starting Cisco topology analysis");
    info!("Configuration path: {:?}", args.config_path);
    info!("Output directory: {:?}", args.output_dir);

    let mut settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    if let Some(secs) = args.duration {
        settings.simulation.duration = Duration::from_secs(secs);
    }

    let inventory = ingest(&args.config_path)
        .wrap_err_with(|| format!("Failed to ingest '{}'", args.config_path.display()))?;
    for warning in &inventory.warnings {
        warn!("{}", warning);
    }
    info!("Parsed {} devices", inventory.len());

    let topology = build_topology(&inventory, &settings.topology);
    let validation = validate(&inventory, &topology, &settings);
    let load = analyze_load(&topology, &settings.traffic);

    fs::create_dir_all(&args.output_dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory '{}'",
            args.output_dir.display()
        )
    })?;
    let out = |name: &str| args.output_dir.join(name);

    write_json_report(&inventory, &out("parsed_config.json"))?;
    write_json_report(
        &TopologyReport::new(&args.config_path, &topology),
        &out("topology.json"),
    )?;
    write_json_report(&validation, &out("validation_results.json"))?;
    write_json_report(&load, &out("load_analysis.json"))?;
    write_dot(&topology, &out("network_topology.dot"))?;

    println!("{}\n", format_network_summary(&topology.network_info()));
    println!("{}\n", format_validation_summary(&validation));
    println!("{}", format_load_summary(&load));

    if args.simulate {
        simulate(&inventory, &topology, &settings, &args.faults, &args.output_dir)?;
    }

    info!("Analysis completed successfully");
    Ok(())
}

fn write_dot(topology: &Topology, path: &Path) -> Result<()> {
    fs::write(path, render_dot(topology))
        .wrap_err_with(|| format!("Failed to write topology diagram to {}", path.display()))?;
    info!("Topology diagram written to {}", path.display());
    Ok(())
}

fn simulate(
    inventory: &Inventory,
    topology: &Topology,
    settings: &Settings,
    faults: &[FaultSpec],
    output_dir: &Path,
) -> Result<()> {
    let mut simulator = Simulator::load(inventory, topology, &settings.simulation);
    let total = settings.simulation.total_ticks();
    info!(
        "Simulating {:?} ({} ticks of {:?})",
        settings.simulation.duration, total, settings.simulation.tick
    );

    let first_half = if faults.is_empty() { total } else { total / 2 };
    simulator.run_for_ticks(first_half);
    for spec in faults {
        simulator
            .inject_fault(&spec.device, &spec.fault)
            .wrap_err_with(|| format!("Failed to inject fault on {}", spec.device))?;
    }
    simulator.run_for_ticks(total - first_half);
    simulator.stop();

    let stats = simulator.statistics();
    write_json_report(&stats, &output_dir.join("simulation_stats.json"))?;

    println!();
    println!("Simulation: {} devices over {:?}", stats.total_devices, stats.elapsed);
    for (name, device) in &stats.device_statistics {
        println!(
            "  {:<16} {:<8} sent {:>6} recv {:>6} dropped {:>5} neighbors {:>3} routes {:>3}",
            name,
            format!("{:?}", device.state),
            device.stats.packets_sent,
            device.stats.packets_received,
            device.stats.packets_dropped,
            device.neighbors,
            device.routing_entries
        );
    }
    Ok(())
}
