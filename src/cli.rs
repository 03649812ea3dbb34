//! Command-line interface for media-pipeline

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "media-pipeline")]
#[command(about = "Resize, compress and store uploaded images; optionally mirror them", long_about = None)]
pub struct Cli {
    /// YAML configuration file (defaults to ./media-pipeline.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the upload root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Bound compression fan-out to the number of available CPUs
    #[arg(long, global = true)]
    pub cpu_bound: bool,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress and store the images of one upload
    Ingest {
        /// Upload context: profile, premium, payment or product
        #[arg(short, long)]
        kind: String,

        /// Owner identity (email address)
        #[arg(short, long)]
        owner: String,

        /// Listing identifier for product uploads; one is drawn when omitted
        #[arg(long)]
        product_id: Option<u32>,

        /// Display name for payment uploads
        #[arg(long)]
        name: Option<String>,

        /// Identity card image for premium uploads
        #[arg(long)]
        ktp: Option<PathBuf>,

        /// Selfie image for premium uploads
        #[arg(long)]
        selfie: Option<PathBuf>,

        /// Write to staging files and commit only if every image succeeds
        #[arg(long)]
        staged: bool,

        /// Mirror the stored profile or payment image and print its URL
        #[arg(long)]
        publish: bool,

        /// Images, in gallery order for product uploads
        inputs: Vec<PathBuf>,
    },

    /// Mirror a stored file to the image host
    Publish {
        /// Stored JPEG
        path: PathBuf,
    },

    /// Delete every stored photo of a product listing
    RemoveGallery {
        #[arg(short, long)]
        owner: String,

        #[arg(long)]
        product_id: u32,
    },

    /// Print a fresh product identifier
    NewProductId,
}
