use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Use the library module
use sparse_flash::flash;

#[derive(Parser)]
#[command(name = "sparse-flash")]
#[command(about = "Flash Android sparse images onto block devices and image files")]
struct Cli {
    /// Enable debug output (header and chunk details)
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a sparse image onto a destination device or file
    Flash {
        /// Sparse image to flash (.simg, optionally .gz or .xz compressed)
        image: PathBuf,
        /// Destination device path (e.g., /dev/mmcblk0p3) or output image file
        device: String,
        /// Destination capacity in bytes, accepts K/M/G suffixes
        /// (default: device size for block devices, 2G for files)
        #[arg(long, value_parser = flash::parse_size)]
        capacity: Option<u64>,
    },
    /// List the header and chunks of a sparse image
    Inspect {
        /// Sparse image to inspect
        image: PathBuf,
    },
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Flash {
            image,
            device,
            capacity,
        } => {
            println!("Sparse flash command:");
            println!("  Image: {}", image.display());
            println!("  Device: {}", device);
            match capacity {
                Some(bytes) => println!("  Capacity: {} bytes", bytes),
                None => println!("  Capacity: auto"),
            }
            println!("  Debug: {}", cli.debug);
            println!();

            let options = flash::FlashOptions {
                input: image,
                device,
                capacity,
            };

            match flash::flash_sparse_image(options).await {
                Ok(summary) => {
                    println!("{}", summary.report());
                    println!("Result: FLASH_COMPLETED");
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    println!("Result: FLASH_FAILED");
                    std::process::exit(1);
                }
            }
        }
        Commands::Inspect { image } => match flash::inspect_sparse_image(image).await {
            Ok(layout) => {
                print!("{}", layout);
                std::process::exit(if layout.is_consistent() { 0 } else { 1 });
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}
