use clap::{Parser, Subcommand};
use figlight::probe::ImageCrateProbe;
use figlight::{config, output, site};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "figlight")]
#[command(about = "Figure lightbox, sidebar and scroll reveal for static book sites")]
#[command(long_about = "\
Figure lightbox, sidebar and scroll reveal for static book sites

Enhances the HTML pages of a book ahead of time. Every figure gets an
index, a toolbar with an expand button and an orientation class from its
image's natural size. Each page gets the figure viewer overlay, sidebar
wiring, reveal classes and reading progress state.

Source structure:

  book/
  ├── figlight.toml                # Config (optional)
  ├── index.html                   # Pages are enhanced
  ├── chapters/
  │   ├── ch02.html
  │   └── img/steer.png            # Images are probed, then copied
  └── assets/book.css              # Everything else is copied as is

Hidden files and directories are skipped. The output directory receives
the enhanced pages, the copied assets and figures.json, an index of every
figure on every page.

Run 'figlight gen-config' to generate a documented figlight.toml.")]
#[command(version)]
struct Cli {
    /// Log each page and asset as it is processed
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the figure index of individual pages
    Scan {
        /// HTML pages to scan
        #[arg(required = true)]
        pages: Vec<PathBuf>,

        /// Directory holding figlight.toml
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },
    /// Enhance every page of a book into the output directory
    Build {
        /// Book source directory
        #[arg(long, default_value = "book")]
        source: PathBuf,

        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
    },
    /// Enhance every page in memory and report, without writing
    Check {
        /// Book source directory
        #[arg(long, default_value = "book")]
        source: PathBuf,
    },
    /// Print a stock figlight.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan { pages, config_dir } => {
            let config = config::load_config(&config_dir)?;
            let reports = pages
                .iter()
                .map(|page| site::scan_page(page, &config, &ImageCrateProbe))
                .collect::<Result<Vec<_>, _>>()?;
            output::print_scan_output(&reports);
        }
        Command::Build {
            source,
            output: dest,
        } => {
            let config = load_source_config(&source)?;
            println!("==> Building {} → {}", source.display(), dest.display());
            let report = site::build(&source, &dest, &config, &ImageCrateProbe)?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", dest.display());
        }
        Command::Check { source } => {
            let config = load_source_config(&source)?;
            println!("==> Checking {}", source.display());
            let reports = site::check(&source, &config, &ImageCrateProbe)?;
            output::print_scan_output(&reports);
            println!("==> Pages are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--verbose` raises the default level; `RUST_LOG` still wins when set.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the book's config and size the thread pool from it.
fn load_source_config(source: &Path) -> Result<config::Config, config::ConfigError> {
    let config = config::load_config(source)?;
    init_thread_pool(&config.processing);
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. User can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
