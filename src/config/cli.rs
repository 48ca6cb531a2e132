use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "water-quality")]
#[command(about = "Helpers for the water quality Open Data Cube stack and its data sources")]
pub struct CliConfig {
    /// Settings file; defaults are used when it does not exist
    #[arg(long, global = true, env = "WATER_QUALITY_CONFIG", default_value = "water-quality.toml")]
    pub config: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Validate the .env file used by the stack
    CheckEnv {
        #[arg(long, default_value = ".env")]
        env_file: String,
    },
    /// Render the db, jupyter and explorer services as a compose file
    Render {
        #[arg(long, default_value = ".env")]
        env_file: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the order the services start in
    Plan {
        #[arg(long, default_value = ".env")]
        env_file: String,
    },
    /// Block until the database accepts connections
    WaitDb {
        #[arg(long, default_value = ".env")]
        env_file: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        /// Overrides POSTGRES_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Summarise the Python package manifest
    Manifest {
        #[arg(long, default_value = "pyproject.toml")]
        path: String,
        /// Check requires-python against this interpreter version
        #[arg(long)]
        python: Option<String>,
    },
    /// List GeoTIFF or JSON files under a directory or bucket prefix
    Find {
        directory: String,
        #[arg(long, value_enum, default_value = "geotiff")]
        kind: FileKind,
        /// Regular expression matched against file names
        #[arg(long, default_value = ".*")]
        pattern: String,
    },
    /// Report whether a file or directory exists
    Exists { path: String },
    /// Convert an s3:// or gs:// URI to its public HTTPS URL
    PublicUrl {
        uri: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Print the GDAL virtual file system path for a location
    VsiPath { path: String },
    /// Print the Last-Modified timestamp of a URL or URI
    LastModified {
        uri: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Download a URL to a local path or bucket
    Download {
        url: String,
        output: String,
        /// Buffer size in MB
        #[arg(long)]
        chunk_mb: Option<u64>,
        /// Write the output without credentials, e.g. to a local emulator
        #[arg(long)]
        anon: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileKind {
    Geotiff,
    Json,
}
