//! pushpull CLI binary: run one task through push and polling side by side, or host the mock
//! backend.
//!
//! Subcommands: `pi` (default), `document`, `serve`.

mod log_format;
mod logging;

use clap::{Parser, Subcommand};
use cli::{render_report, run_task, summary_json, RunError, RunOptions};
use pushpull::{parse_keywords, EngineConfig, TaskSpec};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DIGITS: u32 = 200;

#[derive(Parser, Debug)]
#[command(name = "pushpull")]
#[command(about = "pushpull: compare WebSocket push and HTTP polling for the same task")]
struct Args {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// API base URL (default http://127.0.0.1:8000/api or PUSHPULL_API_BASE)
    #[arg(long, global = true, value_name = "URL")]
    api_base: Option<String>,

    /// Push channel base URL; derived from the API origin when unset
    #[arg(long, global = true, value_name = "URL")]
    ws_base: Option<String>,

    /// Clients per mode (default 5 or PUSHPULL_CLIENT_COUNT)
    #[arg(short = 'n', long, global = true, value_name = "N")]
    clients: Option<usize>,

    /// Polling interval in milliseconds (default 150 or PUSHPULL_POLL_INTERVAL_MS)
    #[arg(long, global = true, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Redraw cadence in milliseconds (default 100 or PUSHPULL_REDRAW_MS)
    #[arg(long, global = true, value_name = "MS")]
    redraw_ms: Option<u64>,

    /// Give up when the run has not finished after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Print the final report as JSON (no live progress lines)
    #[arg(long, global = true)]
    json: bool,

    /// When using --json, pretty-print (multi-line)
    #[arg(long, global = true)]
    pretty: bool,

    /// When using --json, write output to this file instead of stdout
    #[arg(long, global = true, value_name = "PATH")]
    file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Digits-of-pi task (cumulative snapshot polling)
    Pi(PiArgs),
    /// Keyword search over a document (cursor polling)
    Document(DocumentArgs),
    /// Run the mock task backend (http://127.0.0.1:8000/api, ws://127.0.0.1:8000/ws/tasks)
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct PiArgs {
    /// Number of decimals to compute
    #[arg(long, default_value_t = DEFAULT_DIGITS)]
    digits: u32,
}

#[derive(clap::Args, Debug, Clone)]
struct DocumentArgs {
    /// Path of the document on the backend
    #[arg(long, value_name = "PATH")]
    path: Option<String>,
    /// Document URL; its file name resolves under /data/books when --path is not given
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Comma-separated keywords
    #[arg(long, short = 'k', value_name = "LIST")]
    keywords: String,
}

#[derive(clap::Args, Debug, Clone)]
struct ServeArgs {
    /// Listen address (default 127.0.0.1:8000)
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

fn engine_config(args: &Args) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(ref base) = args.api_base {
        config.api_base = base.clone();
    }
    if let Some(ref base) = args.ws_base {
        config.ws_base = Some(base.clone());
    }
    if let Some(n) = args.clients {
        config.client_count = n.max(1);
    }
    if let Some(ms) = args.poll_ms {
        config.poll_interval = Duration::from_millis(ms.max(1));
    }
    if let Some(ms) = args.redraw_ms {
        config.redraw_interval = Duration::from_millis(ms.max(1));
    }
    config
}

fn task_spec(cmd: &Command) -> Option<TaskSpec> {
    match cmd {
        Command::Pi(a) => Some(TaskSpec::ComputePi { digits: a.digits }),
        Command::Document(a) => Some(TaskSpec::DocumentAnalysis {
            document_path: a.path.clone(),
            document_url: a.url.clone(),
            keywords: parse_keywords(&a.keywords),
        }),
        Command::Serve(_) => None,
    }
}

/// Writes JSON to stdout or to the given file. When pretty is true, multi-line; else one line.
fn write_json_output(
    value: &serde_json::Value,
    file: Option<&std::path::Path>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match file {
        Some(path) => std::fs::write(path, format!("{}\n", s))?,
        None => println!("{}", s),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("pushpull", None::<&std::path::Path>).ok();
    let _log_guard = logging::init()?;

    let args = Args::parse();
    let cmd = args.cmd.clone().unwrap_or(Command::Pi(PiArgs {
        digits: DEFAULT_DIGITS,
    }));

    if let Command::Serve(sa) = &cmd {
        if let Err(e) = serve::run_serve(sa.addr.as_deref(), serve::backend_config_from_env()).await {
            eprintln!("serve error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let Some(task) = task_spec(&cmd) else {
        return Ok(());
    };
    let opts = RunOptions {
        task,
        config: engine_config(&args),
        quiet: args.json,
        timeout: args.timeout_secs.map(Duration::from_secs),
    };

    let result = run_task(opts).await;
    let state = match &result {
        Ok(state) => Some(state),
        Err(RunError::TimedOut(_, state)) | Err(RunError::Failed(_, state)) => Some(state.as_ref()),
        Err(RunError::Engine(_)) => None,
    };
    if let Some(state) = state {
        if args.json {
            write_json_output(&summary_json(state), args.file.as_deref(), args.pretty)?;
        } else {
            println!("{}", render_report(state));
        }
    }
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_env_config() {
        let args = Args::parse_from([
            "pushpull",
            "--clients",
            "0",
            "--poll-ms",
            "40",
            "--api-base",
            "http://localhost:9000/api",
            "pi",
            "--digits",
            "50",
        ]);
        let config = engine_config(&args);
        assert_eq!(config.client_count, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(40));
        assert_eq!(config.api_base, "http://localhost:9000/api");
        assert_eq!(
            task_spec(args.cmd.as_ref().unwrap()),
            Some(TaskSpec::ComputePi { digits: 50 })
        );
    }

    #[test]
    fn document_keywords_are_split_and_trimmed() {
        let args = Args::parse_from([
            "pushpull",
            "document",
            "--url",
            "https://example.org/moby.txt",
            "-k",
            "whale, sea,,",
        ]);
        match task_spec(args.cmd.as_ref().unwrap()) {
            Some(TaskSpec::DocumentAnalysis {
                document_path,
                document_url,
                keywords,
            }) => {
                assert_eq!(document_path, None);
                assert_eq!(document_url.as_deref(), Some("https://example.org/moby.txt"));
                assert_eq!(keywords, vec!["whale".to_string(), "sea".to_string()]);
            }
            other => panic!("expected document task, got {:?}", other),
        }
    }

    #[test]
    fn serve_is_not_a_task() {
        let args = Args::parse_from(["pushpull", "serve", "--addr", "127.0.0.1:0"]);
        assert_eq!(task_spec(args.cmd.as_ref().unwrap()), None);
    }
}
