#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::LevelFilter;
use std::path::PathBuf;

use fsimage::image::{cat, extract, info, list, pack, verify, PackOptions};

#[derive(Debug, Parser)]
#[command(name = "fsimage", version, about = "Pack and inspect read-only filesystem images")]
struct Cli {
    /// Debug logging (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pack a directory into an image.
    Pack {
        /// Input directory.
        #[arg(long)]
        input: PathBuf,
        /// Output image file.
        #[arg(long)]
        output: PathBuf,
        /// Mount prefix inside the image (e.g. "app").
        #[arg(long, default_value = "")]
        prefix: String,
        /// Working directory recorded in the image. Defaults to the mount root.
        #[arg(long)]
        working_dir: Option<String>,
        /// Exclude substring (repeatable), matched against image paths.
        #[arg(long)]
        exclude: Vec<String>,
        /// Use zstd compression for payloads (requires feature "zstd").
        #[arg(long, default_value_t = false)]
        compress: bool,
        /// Zstd level (1..=22). Only used with --compress.
        #[arg(long, default_value_t = 6)]
        zstd_level: i32,
    },

    /// List entries in an image.
    List {
        #[arg(long)]
        image: PathBuf,
        /// Print sizes and hashes too.
        #[arg(long, default_value_t = false)]
        long: bool,
    },

    /// Print one file. Relative paths resolve against the working directory.
    Cat {
        #[arg(long)]
        image: PathBuf,
        path: String,
    },

    /// Extract an image to an output directory.
    Extract {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Only extract entries that contain this substring (repeatable).
        #[arg(long)]
        filter: Vec<String>,
    },

    /// Verify image integrity (tables, checksum, every payload).
    Verify {
        #[arg(long)]
        image: PathBuf,
    },

    /// Show working directory, file count and compression.
    Info {
        #[arg(long)]
        image: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let res = match cli.cmd {
        Command::Pack {
            input,
            output,
            prefix,
            working_dir,
            exclude,
            compress,
            zstd_level,
        } => {
            let opts = PackOptions {
                prefix,
                working_dir,
                excludes: exclude,
                compress,
                zstd_level: zstd_level.clamp(1, 22),
            };
            pack(&input, &output, &opts)
        }
        Command::List { image, long } => list(&image, long),
        Command::Cat { image, path } => cat(&image, &path, &mut std::io::stdout().lock()),
        Command::Extract {
            image,
            output,
            filter,
        } => extract(&image, &output, &filter).map(|n| log::info!("extracted {n} files")),
        Command::Verify { image } => verify(&image),
        Command::Info { image } => info(&image),
    };

    if let Err(e) = res {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
