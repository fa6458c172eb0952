use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tline::{
    error::TLineError,
    input::{self, Request},
    materials::MaterialDatabase,
    post_processor,
    registry::FamilyRegistry,
    solver::{self, PortResultFile},
};

#[derive(Parser, Debug)]
#[command(name = "tline", version, about = "Transmission line cross-section problem builder")]
struct Cli {
    /// Json file with extra or overriding materials
    #[arg(long, global = true)]
    materials: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered families and their parameters
    Families {
        /// Only list families carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Build the problem described by an input file
    Build {
        input: String,
        /// Write the problem and its modes as json
        #[arg(long)]
        json: Option<String>,
        /// Write the placements as csv
        #[arg(long)]
        csv: Option<String>,
    },
    /// Build one problem per value of a length parameter
    Sweep {
        input: String,
        #[arg(long)]
        parameter: String,
        /// First value, in millimetres
        #[arg(long)]
        from: f64,
        /// Last value, in millimetres
        #[arg(long)]
        to: f64,
        #[arg(long, default_value_t = 10)]
        steps: usize,
        #[arg(long, default_value = "sweep.csv")]
        output: String,
    },
    /// Read modal impedances from an external solver result
    Modes {
        input: String,
        port_results: String,
        /// Write the mode results as json
        #[arg(long)]
        json: Option<String>,
    },
}

fn load_materials(materials_file: Option<&str>) -> Result<MaterialDatabase, TLineError> {
    let mut materials = MaterialDatabase::with_defaults();
    if let Some(file) = materials_file {
        materials.load_file(file)?;
    }
    Ok(materials)
}

fn build(
    registry: &FamilyRegistry,
    materials: &MaterialDatabase,
    input: &str,
    json: Option<&str>,
    csv: Option<&str>,
) -> Result<(), TLineError> {
    let Request {
        family,
        tree,
        settings,
    } = input::load_request(input, registry)?;
    let descriptor = registry.find(&family)?;

    let section = solver::build(descriptor, &tree, materials, &settings)?;

    if json.is_none() && csv.is_none() {
        print!("{}", post_processor::placements_csv(&section.geometry));
    }
    if let Some(output) = json {
        post_processor::write_json(&post_processor::cross_section_json(&family, &section), output)?;
    }
    if let Some(output) = csv {
        post_processor::csv_output(&section.geometry, output)?;
    }

    Ok(())
}

fn sweep(
    registry: &FamilyRegistry,
    materials: &MaterialDatabase,
    input: &str,
    parameter: &str,
    range: (f64, f64),
    steps: usize,
    output: &str,
) -> Result<(), TLineError> {
    let Request {
        family,
        mut tree,
        settings,
    } = input::load_request(input, registry)?;
    let descriptor = registry.find(&family)?;

    match descriptor.parameters.iter().find(|p| p.key() == parameter) {
        Some(spec) if spec.is_length => {}
        Some(_) => {
            return Err(TLineError::Input(format!(
                "Sweep parameter '{parameter}' is not a length"
            )))
        }
        None => {
            return Err(TLineError::Input(format!(
                "Family '{family}' has no parameter '{parameter}'"
            )))
        }
    }
    if steps < 2 {
        return Err(TLineError::Input(
            "A sweep needs at least two steps".to_owned(),
        ));
    }

    let (from, to) = range;
    let mut table = post_processor::SweepTable::new(parameter);

    info!("sweeping {parameter} from {from} to {to} mm in {steps} steps");
    let bar = ProgressBar::new(steps as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        bar.set_style(style);
    }

    for i in 0..steps {
        let value = from + (to - from) * i as f64 / (steps - 1) as f64;
        tree.set_length(parameter, value);

        // each point is an independent request
        let section = solver::build(descriptor, &tree, materials, &settings)?;
        table.push(value, &section.geometry);
        bar.inc(1);
    }
    bar.finish_with_message("done");

    table.write(output)
}

fn modes(
    registry: &FamilyRegistry,
    materials: &MaterialDatabase,
    input: &str,
    port_results: &str,
    json: Option<&str>,
) -> Result<(), TLineError> {
    let Request {
        family,
        tree,
        settings,
    } = input::load_request(input, registry)?;
    let result_file = PortResultFile::load(port_results)?;

    let report = solver::run(registry, &family, &tree, materials, &settings, &result_file)?;

    print!("{}", post_processor::modes_report(&report.family, &report.modes));
    if let Some(output) = json {
        post_processor::write_json(
            &post_processor::modes_json(&report.family, &report.modes),
            output,
        )?;
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), TLineError> {
    let registry = FamilyRegistry::with_builtin_families()?;
    let materials = load_materials(cli.materials.as_deref())?;

    match cli.command {
        Command::Families { tag } => {
            let report = post_processor::families_report(&registry, tag.as_deref());
            if report.is_empty() {
                warn!("no family matches the requested tag");
            }
            print!("{report}");
            Ok(())
        }
        Command::Build { input, json, csv } => build(
            &registry,
            &materials,
            &input,
            json.as_deref(),
            csv.as_deref(),
        ),
        Command::Sweep {
            input,
            parameter,
            from,
            to,
            steps,
            output,
        } => sweep(
            &registry,
            &materials,
            &input,
            &parameter,
            (from, to),
            steps,
            &output,
        ),
        Command::Modes {
            input,
            port_results,
            json,
        } => modes(
            &registry,
            &materials,
            &input,
            &port_results,
            json.as_deref(),
        ),
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}
