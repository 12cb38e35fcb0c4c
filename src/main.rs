use clap::{ArgAction, Parser, Subcommand};
use sheetprep::cache::ArtifactCache;
use sheetprep::imaging::{ArtifactConfig, RustBackend, to_monochrome};
use sheetprep::prepare::{CancelFlag, Preparer};
use sheetprep::{config, output, panels, scan};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetprep")]
#[command(version)]
#[command(about = "Prepare scanned comic pages: monochrome renditions and panel trees")]
#[command(long_about = "\
Prepare scanned comic pages: monochrome renditions and panel trees

Every scan below the project root is converted to monochrome, downsized,
and segmented into panels. Results are cached by content, so a page is
only prepared again when its bytes change.

Project structure:

  comic/
  ├── config.toml          # Settings (optional, see gen-config)
  ├── .ccache/             # Prepared artifacts, keyed by content hash
  ├── ch1/
  │   ├── 001.png          # Sheet \"ch1/001\"
  │   └── 002.tif
  └── cover.jpg            # Sheet \"cover\"

Run 'sheetprep gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prepare every scan in the project
    Prepare {
        /// Recompute artifacts even when cached
        #[arg(long)]
        force: bool,
    },
    /// Segment one image and print its panel tree (cache untouched)
    Panels {
        /// Image to segment
        file: PathBuf,
    },
    /// Drop cache entries and directories no scan refers to
    Gc,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Prepare { force } => {
            let config = config::load_config(&cli.root)?;
            init_thread_pool(&config.processing);
            let cache_root = config.cache_root(&cli.root);
            let cache = ArtifactCache::load(&cache_root)?;
            let sheets = config.apply_thresholds(scan::discover(&cli.root, &[cache_root])?);
            debug!(sheets = sheets.len(), "discovered");

            let cancel = CancelFlag::new();
            let handler_flag = cancel.clone();
            if let Err(e) = ctrlc::set_handler(move || handler_flag.cancel()) {
                warn!("could not install Ctrl-C handler: {e}");
            }

            let backend = RustBackend::new();
            let preparer = Preparer::new(&backend, &cache, ArtifactConfig::from_prep_config(&config));
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_prep_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let stats = preparer.prepare_all(&sheets, force, &cancel, Some(tx))?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_prep_summary(&stats);

            if stats.failed > 0 {
                return Err(format!("{} sheets failed", stats.failed).into());
            }
        }
        Command::Panels { file } => {
            let config = config::load_config(&cli.root)?;
            let tree = segment_file(&file, &ArtifactConfig::from_prep_config(&config))?;
            output::print_panel_tree(&tree);
        }
        Command::Gc => {
            let config = config::load_config(&cli.root)?;
            let cache = ArtifactCache::open(&config.cache_root(&cli.root))?;
            let stats = cache.collect_garbage()?;
            cache.save()?;
            output::print_gc_stats(&stats);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `-v` count → `sheetprep=` filter level. `RUST_LOG` is not consulted.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("sheetprep=warn"),
        1 => EnvFilter::new("sheetprep=info"),
        _ => EnvFilter::new("sheetprep=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Monochrome conversion and segmentation in memory.
fn segment_file(
    file: &Path,
    config: &ArtifactConfig,
) -> Result<panels::PanelNode, Box<dyn std::error::Error>> {
    let img = image::ImageReader::open(file)?
        .with_guessed_format()?
        .decode()?;
    let mono = to_monochrome(&img, config.threshold);
    Ok(panels::detect_panels(&mono, &config.segment)?)
}
