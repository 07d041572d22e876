//! Command-line entry point (§6 "Operator surface"). Mirrors the
//! teacher's `interfaces/cli` split: a `clap` derive subcommand tree
//! dispatching into thin wrappers around the daemon's own crates —
//! `scrybe-daemon` for lifecycle, `scrybe-store`/`scrybe-ingest` for the
//! inspection commands that don't need a running daemon at all.

use std::fs;
use std::fs::OpenOptions;
use std::io::{BufRead, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scrybe_config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "scrybe", about = "local always-on screen-memory capture, evidence, and query engine")]
struct Cli {
    /// Path to the TOML config file (defaults per-field when absent).
    #[arg(long, global = true, default_value = "scrybe.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the daemon as a detached background process.
    Start {
        #[arg(long)]
        force: bool,
    },
    /// Stop a running daemon.
    Stop,
    /// Stop then start the daemon.
    Restart,
    /// Report whether the daemon is running.
    Status,
    /// Run the daemon in the foreground (used internally by `start`, and
    /// directly useful under a process supervisor).
    Run,
    /// Ask the running daemon a question over its loopback query socket.
    Query {
        text: Vec<String>,
    },
    /// Ledger chain inspection (C1).
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Retention & reap-safety gate (C9) maintenance.
    Retention {
        #[command(subcommand)]
        command: RetentionCommands,
    },
}

#[derive(Debug, Subcommand)]
enum LedgerCommands {
    /// Verify the hash chain across a sequence range.
    Verify {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long)]
        to: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum RetentionCommands {
    /// Re-audit existing `retention.eligible` markers against their
    /// frames' current plugin-completion records.
    Revalidate,
    /// Print the retention event stream, optionally following new lines.
    Tail {
        #[arg(long)]
        follow: bool,
    },
}

/// Where the daemon's pidfile/lockfile/log live, mirroring the
/// teacher's `DaemonPaths`. Scoped under the store's own data dir so a
/// single `--config` selects an entire isolated instance.
struct DaemonPaths {
    runtime_dir: PathBuf,
    pid_file: PathBuf,
    log_file: PathBuf,
}

fn daemon_paths(config: &AppConfig) -> DaemonPaths {
    let runtime_dir = Path::new(&config.store.data_dir)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("runtime");
    DaemonPaths {
        pid_file: runtime_dir.join("daemon.pid"),
        log_file: runtime_dir.join("daemon.log"),
        runtime_dir,
    }
}

fn read_pid(pid_file: &Path) -> Option<u32> {
    fs::read_to_string(pid_file).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn is_pid_running(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_pid_running(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn terminate_pid(pid: u32) -> Result<()> {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate_pid(_pid: u32) -> Result<()> {
    bail!("stopping a daemon by pid is only supported on unix")
}

fn is_socket_live(socket_path: &Path) -> bool {
    #[cfg(unix)]
    {
        std::os::unix::net::UnixStream::connect(socket_path).is_ok()
    }
    #[cfg(not(unix))]
    {
        let _ = socket_path;
        false
    }
}

fn daemon_start(config_path: &str, config: &AppConfig, force: bool) -> Result<()> {
    let paths = daemon_paths(config);
    fs::create_dir_all(&paths.runtime_dir).context("creating daemon runtime dir")?;
    let socket_path = PathBuf::from(&config.daemon.socket_path);

    if is_socket_live(&socket_path) && !force {
        bail!("daemon already running on socket {}; use `scrybe restart`", socket_path.display());
    }

    if let Some(pid) = read_pid(&paths.pid_file) {
        if is_pid_running(pid) {
            if !force {
                bail!("daemon already running with pid {pid}; use `scrybe restart` or `scrybe start --force`");
            }
            terminate_pid(pid)?;
        }
        let _ = fs::remove_file(&paths.pid_file);
    }

    let exe = std::env::current_exe().context("resolving current executable")?;
    let out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)
        .context("opening daemon log file")?;
    let err = out.try_clone().context("cloning daemon log file handle")?;

    let mut child = Command::new(exe)
        .arg("--config")
        .arg(config_path)
        .arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err))
        .spawn()
        .context("spawning daemon process")?;

    fs::write(&paths.pid_file, child.id().to_string()).context("writing pid file")?;

    for _ in 0..40 {
        if is_socket_live(&socket_path) {
            println!("daemon started");
            println!("- pid: {}", child.id());
            println!("- socket: {}", socket_path.display());
            println!("- log: {}", paths.log_file.display());
            return Ok(());
        }
        if let Some(status) = child.try_wait().context("polling daemon process")? {
            let _ = fs::remove_file(&paths.pid_file);
            bail!("daemon exited during startup with status {status}; check {}", paths.log_file.display());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let _ = fs::remove_file(&paths.pid_file);
    bail!("daemon did not become ready on socket {}; check {}", socket_path.display(), paths.log_file.display())
}

fn daemon_stop(config: &AppConfig) -> Result<()> {
    let paths = daemon_paths(config);
    let Some(pid) = read_pid(&paths.pid_file) else {
        println!("daemon is not running");
        return Ok(());
    };
    if !is_pid_running(pid) {
        println!("daemon is not running (stale pid file)");
        let _ = fs::remove_file(&paths.pid_file);
        return Ok(());
    }

    terminate_pid(pid)?;
    for _ in 0..40 {
        if !is_pid_running(pid) {
            println!("daemon stopped");
            let _ = fs::remove_file(&paths.pid_file);
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    bail!("daemon with pid {pid} did not exit after SIGTERM")
}

fn daemon_status(config: &AppConfig) -> Result<()> {
    let paths = daemon_paths(config);
    let socket_path = PathBuf::from(&config.daemon.socket_path);
    match read_pid(&paths.pid_file) {
        Some(pid) if is_pid_running(pid) => {
            println!("running (pid {pid}, socket {})", socket_path.display());
            if !is_socket_live(&socket_path) {
                println!("warning: process is alive but the query socket is not accepting connections");
            }
        }
        Some(_) => println!("not running (stale pid file)"),
        None => println!("not running"),
    }
    Ok(())
}

/// Sends one newline-delimited JSON request and prints the one-line
/// response, matching the wire protocol `scrybe_daemon::query_socket`
/// implements on the daemon side.
#[cfg(unix)]
fn run_query(config: &AppConfig, query_text: &str) -> Result<()> {
    use std::os::unix::net::UnixStream;

    let socket_path = PathBuf::from(&config.daemon.socket_path);
    let mut stream = UnixStream::connect(&socket_path)
        .with_context(|| format!("connecting to query socket {}; is the daemon running?", socket_path.display()))?;

    let request = serde_json::json!({ "query_text": query_text });
    let mut line = serde_json::to_vec(&request)?;
    line.push(b'\n');
    stream.write_all(&line).context("writing query request")?;
    stream.flush().ok();

    let mut reader = std::io::BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).context("reading query response")?;
    if response_line.trim().is_empty() {
        bail!("daemon closed the query socket without responding");
    }

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(not(unix))]
fn run_query(_config: &AppConfig, _query_text: &str) -> Result<()> {
    bail!("the query socket is only supported on unix")
}

async fn ledger_verify(config: &AppConfig, from: u64, to: Option<u64>) -> Result<()> {
    let store = scrybe_store::EvidenceStore::open(&config.store, &scrybe_store::NoCipher).await?;
    let len = store.ledger.len().await;
    let to = to.unwrap_or(len);
    let result = store.verify_chain(from..to).await?;
    match result {
        scrybe_store::ChainVerifyResult::Ok => {
            println!("ledger chain ok across [{from}, {to})");
        }
        scrybe_store::ChainVerifyResult::Break { at_seq } => {
            println!("ledger chain broken at seq {at_seq}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn retention_revalidate(config: &AppConfig) -> Result<()> {
    let store = scrybe_store::EvidenceStore::open(&config.store, &scrybe_store::NoCipher).await?;
    let report = scrybe_ingest::revalidate(&store, uuid::Uuid::nil(), 0..i64::MAX).await?;
    println!("markers scanned: {}", report.markers_scanned);
    println!("markers quarantined: {}", report.markers_quarantined);
    Ok(())
}

async fn retention_tail(config: &AppConfig, follow: bool) -> Result<()> {
    let path = Path::new(&config.store.data_dir)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("retention_events.jsonl");

    let mut printed = 0usize;
    loop {
        let contents = fs::read_to_string(&path).unwrap_or_default();
        let lines: Vec<&str> = contents.lines().collect();
        for line in lines.iter().skip(printed) {
            println!("{line}");
        }
        printed = lines.len();
        if !follow {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config).context("loading configuration")?;

    match cli.command {
        Commands::Start { force } => daemon_start(&cli.config, &config, force),
        Commands::Stop => daemon_stop(&config),
        Commands::Restart => {
            let _ = daemon_stop(&config);
            daemon_start(&cli.config, &config, true)
        }
        Commands::Status => daemon_status(&config),
        Commands::Run => {
            let data_root = Path::new(&config.store.data_dir)
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            scrybe_daemon::run_daemon(config, data_root).await.map_err(|e| anyhow::anyhow!(e.to_string()))
        }
        Commands::Query { text } => {
            let query_text = text.join(" ");
            if query_text.trim().is_empty() {
                bail!("usage: scrybe query <text...>");
            }
            run_query(&config, &query_text)
        }
        Commands::Ledger { command } => match command {
            LedgerCommands::Verify { from, to } => ledger_verify(&config, from, to).await,
        },
        Commands::Retention { command } => match command {
            RetentionCommands::Revalidate => retention_revalidate(&config).await,
            RetentionCommands::Tail { follow } => retention_tail(&config, follow).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_paths_are_siblings_of_the_store_data_dir() {
        let mut config = AppConfig::default();
        config.store.data_dir = "/tmp/scrybe-test/data".to_string();
        let paths = daemon_paths(&config);
        assert_eq!(paths.runtime_dir, PathBuf::from("/tmp/scrybe-test/runtime"));
        assert_eq!(paths.pid_file, PathBuf::from("/tmp/scrybe-test/runtime/daemon.pid"));
    }

    #[test]
    fn read_pid_returns_none_for_missing_file() {
        assert_eq!(read_pid(Path::new("/nonexistent/scrybe/daemon.pid")), None);
    }

    #[test]
    fn read_pid_parses_a_written_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("daemon.pid");
        fs::write(&pid_file, "4242").unwrap();
        assert_eq!(read_pid(&pid_file), Some(4242));
    }
}
