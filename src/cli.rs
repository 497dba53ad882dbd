use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a folder of images, or an explicit list of image files
    Index {
        /// A folder to scan recursively, or individual image files
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Search the index
    Search {
        /// Free-text query, or the name of a tagged face
        query: String,

        /// Maximum number of semantic-tier results
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Report exact and near-duplicate images
    Duplicates {
        /// Print the report as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Report images that are almost entirely one color
    LowInfo {
        /// Print the report as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Manage tagged face identities
    Face {
        #[clap(subcommand)]
        action: FaceArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum FaceArgs {
    /// Tag the first face found in an image with a name
    Tag {
        /// Identity name; stored lowercase and usable as a search query
        name: String,

        /// Image containing the face
        image: PathBuf,
    },

    /// List tagged identities
    List {},
}
