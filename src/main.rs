use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nhk_podcast_feed::config::Config;
use nhk_podcast_feed::feed::{build_client, fetch_feed, transform, HttpProber};
use nhk_podcast_feed::output::write_output;

#[derive(Parser, Debug)]
#[command(
    name = "nhk-podcast-feed",
    version,
    about = "Turn the NHK Easier RSS feed into a podcast feed"
)]
struct Args {
    /// URL of the source feed
    #[arg(long, value_name = "URL")]
    source_url: Option<String>,

    /// Write the feed to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Site origin for resolving relative links
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Assumed audio bitrate in bits per second
    #[arg(long, value_name = "BPS")]
    bitrate: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Config file (default: ~/.config/nhk-podcast-feed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// Layers command-line flags over the loaded config.
    fn apply(self, mut config: Config) -> (Config, Option<PathBuf>) {
        if let Some(url) = self.source_url {
            config.source_url = url;
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(bitrate) = self.bitrate {
            config.bitrate_bps = bitrate;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        (config, self.output_file)
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display())),
        None => match Config::default_path() {
            Some(path) => Config::load(&path)
                .with_context(|| format!("Failed to load config from '{}'", path.display())),
            None => Ok(Config::default()),
        },
    }
}

/// Final status line; stdout output gets none so the feed stands alone.
fn completion_line(output_file: Option<&Path>) -> Option<String> {
    output_file.map(|path| format!("Transformed feed written to {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with a feed written to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let (config, output_file) = args.apply(config);
    config.validate().context("Invalid configuration")?;

    let options = config.transform_options()?;
    let timeout: Duration = config.timeout();
    let client = build_client(timeout).context("Failed to build HTTP client")?;

    eprintln!("Fetching source feed from {}", config.source_url);
    let source = fetch_feed(&client, &config.source_url, timeout)
        .await
        .with_context(|| format!("Failed to fetch feed from {}", config.source_url))?;

    eprintln!("Transforming feed...");
    let prober = HttpProber::new(client, timeout);
    let output = transform(&source, &options, &prober)
        .await
        .context("Failed to transform feed")?;

    tracing::info!(
        kept = output.items_kept,
        dropped = output.items_dropped,
        probes = output.probes,
        "Transformation complete"
    );
    eprintln!("Feed contains {} items with audio", output.items_kept);

    write_output(&output.xml, output_file.as_deref())?;
    if let Some(line) = completion_line(output_file.as_deref()) {
        eprintln!("{line}");
    }

    Ok(())
}
