//! Command-line client for an rTorrent daemon.
//!
//! ```bash
//! torrentctl --endpoint unix:///run/rtorrent/rpc.socket list
//! torrentctl --json show 0123456789ABCDEF0123456789ABCDEF01234567
//! torrentctl limit down 512
//! torrentctl add-url --start --dir /data "magnet:?xt=urn:btih:..."
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vibetorrent::prelude::*;
use vibetorrent::{MAX_FILE_PRIORITY, MAX_TORRENT_PRIORITY, SOCKET_ENV};

#[derive(Debug, Parser)]
#[command(name = "torrentctl")]
#[command(version)]
#[command(about = "Inspect and control an rTorrent daemon over SCGI")]
struct Cli {
    /// Daemon address: unix:///path, tcp://host:port or host:port
    #[arg(short, long, global = true, env = SOCKET_ENV)]
    endpoint: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, PartialEq)]
struct Target {
    /// Info-hash of the torrent
    hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Direction {
    Down,
    Up,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Commands {
    /// List all torrents
    List,
    /// Show one torrent
    Show(Target),
    /// List a torrent's files
    Files(Target),
    /// List a torrent's peers
    Peers(Target),
    /// List a torrent's trackers
    Trackers(Target),
    /// Daemon versions, rates and limits
    Info,

    /// Start a torrent
    Start(Target),
    /// Stop a torrent
    Stop(Target),
    /// Pause a torrent
    Pause(Target),
    /// Resume a paused torrent
    Resume(Target),
    /// Re-verify the downloaded data
    Recheck(Target),
    /// Remove a torrent from the session (data stays on disk)
    Delete(Target),
    /// Announce to the trackers now
    Reannounce(Target),
    /// Close a torrent
    Close(Target),

    /// Set a torrent's priority
    Priority {
        hash: String,
        #[arg(value_parser = clap::value_parser!(i64).range(0..=MAX_TORRENT_PRIORITY))]
        priority: i64,
    },
    /// Set one file's priority
    FilePriority {
        hash: String,
        index: usize,
        #[arg(value_parser = clap::value_parser!(i64).range(0..=MAX_FILE_PRIORITY))]
        priority: i64,
    },
    /// Set a torrent's label
    Label { hash: String, label: String },
    /// Set a global rate limit in KiB/s (0 removes the cap)
    Limit {
        #[arg(value_enum)]
        direction: Direction,
        kib: u64,
    },

    /// Add a torrent from a URL or magnet link
    AddUrl {
        url: String,
        /// Start downloading immediately
        #[arg(long)]
        start: bool,
        /// Save directory, overriding the daemon default
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Add a torrent from a .torrent file
    AddFile {
        path: PathBuf,
        /// Start downloading immediately
        #[arg(long)]
        start: bool,
        /// Save directory, overriding the daemon default
        #[arg(long, default_value = "")]
        dir: String,
    },
}

impl Commands {
    /// The lifecycle action and target hash, for the mutation subcommands.
    fn mutation(&self) -> Option<(Mutation, &str)> {
        let (mutation, target) = match self {
            Self::Start(t) => (Mutation::Start, t),
            Self::Stop(t) => (Mutation::Stop, t),
            Self::Pause(t) => (Mutation::Pause, t),
            Self::Resume(t) => (Mutation::Resume, t),
            Self::Recheck(t) => (Mutation::Recheck, t),
            Self::Delete(t) => (Mutation::Delete, t),
            Self::Reannounce(t) => (Mutation::Reannounce, t),
            Self::Close(t) => (Mutation::Close, t),
            _ => return None,
        };
        Some((mutation, target.hash.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn rate(bytes_per_sec: i64) -> String {
    format!("{:.1} KiB/s", bytes_per_sec as f64 / 1024.0)
}

fn print_torrent(t: &Torrent) {
    println!("{}  {}", t.hash, t.name);
    println!("  state     {} ({:.1}%)", t.state, t.progress);
    println!("  size      {} / {} bytes", t.completed, t.size);
    println!("  rates     down {}  up {}", rate(t.download_rate), rate(t.upload_rate));
    println!("  label     {}", t.label);
    println!("  path      {}", t.save_path);
    println!("  pieces    {} x {} bytes", t.piece_count, t.piece_size);
    println!("  priority  {}", t.priority);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if !config.is_configured() {
        return Err(VibetorrentError::NotConfigured.into());
    }
    let client = RtorrentClient::new(&config);
    let json = cli.json;

    match cli.command {
        Commands::List => emit(json, &client.list_torrents().await?, |list| {
            for t in list {
                println!("{:<11} {:>5.1}%  {:<40}  {}", t.state, t.progress, t.hash, t.name);
            }
        })?,
        Commands::Show(t) => emit(json, &client.torrent(&t.hash).await?, print_torrent)?,
        Commands::Files(t) => emit(json, &client.files(&t.hash).await?, |files| {
            for f in files {
                println!("{:>4}  p{}  {:>5.1}%  {}", f.index, f.priority, f.progress(), f.name);
            }
        })?,
        Commands::Peers(t) => emit(json, &client.peers(&t.hash).await?, |peers| {
            for p in peers {
                println!("{:<40} {:>3}%  {}  {}", p.address, p.completed_percent, rate(p.download_rate), p.client);
            }
        })?,
        Commands::Trackers(t) => emit(json, &client.trackers(&t.hash).await?, |trackers| {
            for t in trackers {
                let on = if t.enabled { "on " } else { "off" };
                println!("{on} {:>5}/{:<5} {}", t.seeders, t.leechers, t.url);
            }
        })?,
        Commands::Info => emit(json, &client.system_info().await?, |info| {
            println!("rTorrent {} (libtorrent {})", info.client_version, info.library_version);
            println!("down {} (limit {})", rate(info.download_rate), rate(info.download_limit));
            println!("up   {} (limit {})", rate(info.upload_rate), rate(info.upload_limit));
        })?,
        Commands::Priority { hash, priority } => client.set_priority(&hash, priority).await?,
        Commands::FilePriority { hash, index, priority } => {
            client.set_file_priority(&hash, index, priority).await?
        }
        Commands::Label { hash, label } => client.set_label(&hash, &label).await?,
        Commands::Limit { direction: Direction::Down, kib } => client.set_download_limit(kib).await?,
        Commands::Limit { direction: Direction::Up, kib } => client.set_upload_limit(kib).await?,
        Commands::AddUrl { url, start, dir } => client.add_by_url(&url, start, &dir).await?,
        Commands::AddFile { path, start, dir } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            client.add_by_data(&data, start, &dir).await?
        }
        command => {
            if let Some((mutation, hash)) = command.mutation() {
                client
                    .mutate(mutation, hash)
                    .await
                    .with_context(|| format!("{mutation} {hash}"))?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("torrentctl").chain(line.split_whitespace()))
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_with_flags() {
        let cli = parse("--json --endpoint unix:///tmp/rt.sock list").unwrap();
        assert!(cli.json);
        assert_eq!(cli.endpoint.as_deref(), Some("unix:///tmp/rt.sock"));
        assert_eq!(cli.command, Commands::List);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse("show ABC --json").unwrap();
        assert!(cli.json);
        assert_eq!(cli.command, Commands::Show(Target { hash: "ABC".into() }));
    }

    #[test]
    fn test_parse_mutation() {
        let cli = parse("recheck ABCDEF").unwrap();
        assert_eq!(cli.command.mutation(), Some((Mutation::Recheck, "ABCDEF")));
        assert_eq!(parse("list").unwrap().command.mutation(), None);
    }

    #[test]
    fn test_parse_add_url_flags() {
        let cli = parse("add-url --start magnet:?xt=urn:btih:abc --dir /data").unwrap();
        assert_eq!(
            cli.command,
            Commands::AddUrl { url: "magnet:?xt=urn:btih:abc".into(), start: true, dir: "/data".into() }
        );
        let cli = parse("add-url http://x/a.torrent").unwrap();
        assert_eq!(
            cli.command,
            Commands::AddUrl { url: "http://x/a.torrent".into(), start: false, dir: String::new() }
        );
    }

    #[test]
    fn test_parse_numbers_and_ranges() {
        assert_eq!(
            parse("file-priority ABC 4 2").unwrap().command,
            Commands::FilePriority { hash: "ABC".into(), index: 4, priority: 2 }
        );
        assert_eq!(
            parse("limit up 250").unwrap().command,
            Commands::Limit { direction: Direction::Up, kib: 250 }
        );
        assert!(parse("limit sideways 5").is_err());
        assert!(parse("priority ABC high").is_err());
        assert!(parse("priority ABC 4").is_err());
        assert!(parse("file-priority ABC 0 3").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("show").is_err());
        assert!(parse("explode ABC").is_err());
    }
}
