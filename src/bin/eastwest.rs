// Command-line access to splitting and aggregation, for offline runs against exported
// submissions.

#[macro_use]
extern crate log;

use std::io::Write;

use anyhow::{bail, Result};
use geo::Coord;
use structopt::StructOpt;

use eastwest::{
    split_with_config, Boundary, Config, GeoJsonLayer, MemoryStore, Session, SplitError,
    SubmissionDocument, SubmissionStore,
};

#[derive(StructOpt)]
#[structopt(name = "eastwest", about = "Split a region with strokes and map the consensus")]
enum Command {
    /// Split the boundary with one stroke and print the resulting submission document
    Split {
        /// GeoJSON file with the boundary polygon(s)
        #[structopt(long)]
        boundary: String,
        /// JSON file with the stroke, as a list of [longitude, latitude] pairs
        #[structopt(long)]
        stroke: String,
        /// Also store the result for this observer, replacing their previous submission
        #[structopt(long)]
        observer: Option<String>,
        /// The submissions file to update when --observer is given
        #[structopt(long)]
        submissions: Option<String>,
        /// JSON file overriding the default settings
        #[structopt(long)]
        config: Option<String>,
    },
    /// Aggregate every stored submission over the sampling grid and write a GeoJSON layer
    Aggregate {
        /// GeoJSON file with the boundary polygon(s)
        #[structopt(long)]
        boundary: String,
        /// JSON file mapping observer IDs to submission documents
        #[structopt(long)]
        submissions: String,
        /// JSON file overriding the default settings
        #[structopt(long)]
        config: Option<String>,
        /// Where to write the GeoJSON. Defaults to STDOUT.
        #[structopt(long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Command::from_args() {
        Command::Split {
            boundary,
            stroke,
            observer,
            submissions,
            config,
        } => split(boundary, stroke, observer, submissions, load_config(config)?),
        Command::Aggregate {
            boundary,
            submissions,
            config,
            output,
        } => aggregate(boundary, submissions, load_config(config)?, output),
    }
}

fn load_config(path: Option<String>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => Ok(Config::default()),
    }
}

fn split(
    boundary_path: String,
    stroke_path: String,
    observer: Option<String>,
    submissions_path: Option<String>,
    config: Config,
) -> Result<()> {
    let boundary = Boundary::load(&boundary_path)?;
    let raw: Vec<[f64; 2]> = serde_json::from_str(&fs_err::read_to_string(&stroke_path)?)?;
    let stroke: Vec<Coord> = raw.into_iter().map(|[x, y]| Coord { x, y }).collect();

    let result = match split_with_config(&boundary.polygon, &stroke, &config) {
        Ok(result) => result,
        Err(SplitError::NoValidSplit { reason }) => {
            bail!("{stroke_path} doesn't split the boundary ({reason}); try another stroke")
        }
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&SubmissionDocument::encode(&result, 0))?
    );

    match (observer, submissions_path) {
        (Some(observer), Some(path)) => {
            let mut store = if std::path::Path::new(&path).exists() {
                MemoryStore::load(&path)?
            } else {
                MemoryStore::new()
            };
            store.put(&observer, &result)?;
            fs_err::write(&path, store.to_json()?)?;
            info!("Saved {observer}'s submission to {path}");
        }
        (None, None) => {}
        _ => bail!("--observer and --submissions go together"),
    }
    Ok(())
}

fn aggregate(
    boundary_path: String,
    submissions_path: String,
    config: Config,
    output: Option<String>,
) -> Result<()> {
    let boundary = Boundary::load(&boundary_path)?;
    let store = MemoryStore::load(&submissions_path)?;
    let target: Box<dyn Write> = match output {
        Some(path) => Box::new(std::io::BufWriter::new(fs_err::File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    let layer = GeoJsonLayer::new(target).with_districts(boundary.clone());

    let mut session = Session::new(boundary, config, store, layer)?;
    session.refresh()?;
    session.wait()?;

    let stats = session.stats();
    info!(
        "{} submissions, {} skipped as malformed, {} cell tests skipped",
        stats.submissions, stats.skipped_submissions, stats.skipped_cells
    );
    for band in &session.labels().legend {
        info!(
            "{:>5.1}% east: {} cells",
            100.0 * band.ratio.east_share(),
            band.cells
        );
    }
    Ok(())
}
