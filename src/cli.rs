//! CLI module - Command-line interface definitions and handlers

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::backends::download::YtDlp;
use crate::cache::commands;
use crate::cache::RetentionCache;
use crate::config::{
    CacheConfig, ToolConfig, DEFAULT_CACHE_DIR, DEFAULT_RETENTION_HOURS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::core::render::{OutputFormat, RenderConfig};

/// audiocache - a source-URL keyed retention cache for downloaded audio.
#[derive(Parser, Debug)]
#[command(name = "audiocache")]
#[command(
    author,
    version,
    about,
    long_about = r#"audiocache keeps downloaded audio on disk, keyed by the URL it came from,
so repeat transcription requests skip the download.

Entries expire after the retention window. Expired entries are removed lazily
when looked up and by a periodic sweep that piggybacks on lookups and
registrations; there is no background thread.

Each command prints a ResultSet in the selected format (default: jsonl).

Examples:
    audiocache register "https://youtu.be/abc" ./audio.mp3 --duration 213
    audiocache lookup "https://youtu.be/abc"
    audiocache stats --format md
    audiocache serve --bind 0.0.0.0:15000
"#
)]
pub struct Cli {
    /// Directory holding cached artifacts and index.json.
    #[arg(
        long,
        global = true,
        env = "AUDIOCACHE_DIR",
        default_value = DEFAULT_CACHE_DIR,
        value_name = "DIR"
    )]
    pub cache_dir: PathBuf,

    /// Hours after which a cached artifact expires.
    #[arg(
        long,
        global = true,
        env = "AUDIOCACHE_RETENTION_HOURS",
        default_value_t = DEFAULT_RETENTION_HOURS,
        value_name = "HOURS"
    )]
    pub retention_hours: u64,

    /// Minimum seconds between periodic sweeps.
    #[arg(
        long,
        global = true,
        env = "AUDIOCACHE_SWEEP_INTERVAL_SECS",
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECS,
        value_name = "SECS"
    )]
    pub sweep_interval_secs: u64,

    /// Output format (jsonl/json/md).
    #[arg(long, global = true, default_value = "jsonl", value_name = "FORMAT")]
    pub format: String,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub tools: ToolArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// External tool locations
#[derive(Args, Debug)]
pub struct ToolArgs {
    /// Downloader executable.
    #[arg(long, global = true, env = "AUDIOCACHE_DOWNLOADER", default_value = "yt-dlp")]
    pub downloader: String,

    /// whisper.cpp checkout (expects build/bin/whisper-cli).
    #[arg(long, global = true, env = "AUDIOCACHE_WHISPER_CPP_DIR", default_value = "./whisper.cpp")]
    pub whisper_cpp_dir: PathBuf,

    /// whisper.cpp ggml model directory.
    #[arg(
        long,
        global = true,
        env = "AUDIOCACHE_WHISPER_CPP_MODELS",
        default_value = "./whisper.cpp/models"
    )]
    pub whisper_cpp_models: PathBuf,

    /// Never select the whisper.cpp backend.
    #[arg(long, global = true)]
    pub no_whisper_cpp: bool,

    /// whisper CLI executable used as the fallback transcriber.
    #[arg(long, global = true, env = "AUDIOCACHE_WHISPER", default_value = "whisper")]
    pub whisper: String,
}

impl From<&ToolArgs> for ToolConfig {
    fn from(args: &ToolArgs) -> Self {
        Self {
            downloader: args.downloader.clone(),
            use_whisper_cpp: !args.no_whisper_cpp,
            whisper_cpp_dir: args.whisper_cpp_dir.clone(),
            whisper_cpp_models: args.whisper_cpp_models.clone(),
            whisper: args.whisper.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cache key derived from a URL.
    Key {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Look up a cached artifact (prints nothing when absent).
    #[command(long_about = "Look up the artifact cached for URL.\n\n\
Expired entries, and entries whose file has disappeared, are evicted and\n\
reported as absent. Absence is not an error: nothing is printed and the exit\n\
status is 0.")]
    Lookup {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Copy a local file into the cache under a URL.
    #[command(long_about = "Copy FILE into the cache under URL's key. FILE itself is left in place.\n\n\
If the copy fails, the original path is printed with a NOT_CACHED error and\n\
the cache is left unchanged.")]
    Register {
        #[arg(value_name = "URL")]
        url: String,

        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Media duration in seconds.
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
    },

    /// Show cache statistics (never evicts).
    Stats,

    /// List every indexed entry, expired ones included.
    List,

    /// Evict every entry older than the retention window now.
    Sweep,

    /// Delete every cached artifact and the index.
    Clear,

    /// Download audio for a URL, serving from the cache when possible.
    Fetch {
        #[arg(value_name = "URL")]
        url: String,

        /// Directory to place the working copy in.
        #[arg(long, default_value = "./downloads", value_name = "DIR")]
        out: PathBuf,
    },

    /// Check external tools and the selected transcriber.
    Doctor,

    /// Serve the HTTP API.
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on.
        #[arg(long, env = "AUDIOCACHE_BIND", default_value = crate::config::DEFAULT_BIND)]
        bind: String,

        /// Parent directory for per-request scratch space.
        #[arg(long, default_value = "./work", value_name = "DIR")]
        work_dir: PathBuf,

        /// Naver DataLab client id; keyword trends use sample data without it.
        #[arg(long, env = "NAVER_CLIENT_ID", hide_env_values = true, value_name = "ID")]
        datalab_client_id: Option<String>,

        /// Naver DataLab client secret.
        #[arg(long, env = "NAVER_CLIENT_SECRET", hide_env_values = true, value_name = "SECRET")]
        datalab_client_secret: Option<String>,
    },
}

impl Cli {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(
            &self.cache_dir,
            Duration::from_secs(self.retention_hours.saturating_mul(3600)),
            Duration::from_secs(self.sweep_interval_secs),
        )
    }
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);
    let tools = ToolConfig::from(&cli.tools);
    let cache_config = cli.cache_config();
    let open_cache = || RetentionCache::open(cache_config.clone());

    match cli.command {
        Commands::Key { url } => commands::run_key(&url, render_config),

        Commands::Lookup { url } => commands::run_lookup(&open_cache(), &url, render_config),

        Commands::Register {
            url,
            file,
            duration,
        } => commands::run_register(&open_cache(), &url, &file, duration, render_config),

        Commands::Stats => commands::run_stats(&open_cache(), render_config),

        Commands::List => commands::run_list(&open_cache(), render_config),

        Commands::Sweep => commands::run_sweep(&open_cache(), render_config),

        Commands::Clear => commands::run_clear(&open_cache(), render_config),

        Commands::Fetch { url, out } => {
            let source = YtDlp::new(tools.downloader.clone());
            crate::backends::download::run_fetch(&open_cache(), &source, &url, &out, render_config)
        }

        Commands::Doctor => crate::backends::doctor::run_doctor(&tools, render_config),

        #[cfg(feature = "server")]
        Commands::Serve {
            bind,
            work_dir,
            datalab_client_id,
            datalab_client_secret,
        } => {
            let credentials = crate::backends::trends::Credentials::from_parts(
                datalab_client_id,
                datalab_client_secret,
            );
            crate::server::run_serve(open_cache(), &tools, credentials, &bind, work_dir)
        }
    }
}
