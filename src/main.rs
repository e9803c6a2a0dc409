use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use user_store::{Dispatcher, Store, ToolResponse, catalog, spawn_store};

/// Server configuration parsed from environment variables.
///
/// # Environment Variables
///
/// | Variable                    | Required | Default | Description                        |
/// |-----------------------------|----------|---------|------------------------------------|
/// | `USER_STORE_DATA`           | Yes      | --      | Path to the JSON collection file   |
/// | `USER_STORE_QUEUE_CAPACITY` | No       | `64`    | Store worker channel bound         |
/// | `USER_STORE_METRICS_LISTEN` | No       | --      | Socket address for `GET /metrics`  |
#[derive(Debug, Clone, PartialEq)]
struct Config {
    /// Path to the JSON collection file.
    data_path: PathBuf,
    /// Bound on the store worker's command channel.
    queue_capacity: NonZeroUsize,
    /// Optional metrics endpoint address. `None` disables the endpoint.
    metrics_listen: Option<SocketAddr>,
}

/// Default worker channel bound when `USER_STORE_QUEUE_CAPACITY` is not set.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

impl Config {
    /// Parse server configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `Err(String)` if:
    /// - `USER_STORE_DATA` is not set
    /// - `USER_STORE_QUEUE_CAPACITY` is set but not a valid nonzero `usize`
    /// - `USER_STORE_METRICS_LISTEN` is set but not a valid `SocketAddr`
    fn from_env() -> Result<Config, String> {
        let data_path = std::env::var("USER_STORE_DATA")
            .map(PathBuf::from)
            .map_err(|_| "USER_STORE_DATA environment variable is required".to_string())?;

        let queue_capacity = match std::env::var("USER_STORE_QUEUE_CAPACITY") {
            Ok(val) => {
                let raw: usize = val.parse().map_err(|e| {
                    format!("USER_STORE_QUEUE_CAPACITY is not a valid usize: {e}")
                })?;
                NonZeroUsize::new(raw)
                    .ok_or_else(|| "USER_STORE_QUEUE_CAPACITY must be nonzero".to_string())?
            }
            Err(_) => NonZeroUsize::new(DEFAULT_QUEUE_CAPACITY)
                .expect("default queue capacity is nonzero"),
        };

        let metrics_listen = match std::env::var("USER_STORE_METRICS_LISTEN") {
            Ok(val) => Some(val.parse::<SocketAddr>().map_err(|e| {
                format!("USER_STORE_METRICS_LISTEN is not a valid socket address: {e}")
            })?),
            Err(_) => None,
        };

        Ok(Config {
            data_path,
            queue_capacity,
            metrics_listen,
        })
    }
}

/// Initialize the global `tracing` subscriber with an `EnvFilter`.
///
/// Reads `RUST_LOG` for level filtering, defaulting to `"info"`. Logs are
/// written to stderr: stdout is the response channel of the request loop and
/// must carry nothing else. `try_init()` so repeated calls (tests in one
/// process) are a silent no-op.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Waits for a shutdown signal: SIGINT on all platforms, plus SIGTERM on Unix.
///
/// Returns once the first signal is received.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
    }
}

/// One framed request from the transport: an operation name plus an argument
/// bundle. `args` defaults to null when omitted, which every operation with
/// required fields rejects as missing.
#[derive(Debug, serde::Deserialize)]
struct Request {
    /// Operation name.
    op: String,
    /// Argument bundle for the operation.
    #[serde(default)]
    args: serde_json::Value,
}

/// Produce the response for one raw request line.
///
/// Framing errors (unparsable line) and the reserved `listOperations` catalog
/// request are handled here; everything else goes to the dispatcher. No input
/// terminates the loop -- every failure is an error payload for this one line.
async fn respond(dispatcher: &Dispatcher, line: &str) -> ToolResponse {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return ToolResponse::error(format!("malformed request: {e}")),
    };

    if request.op == "listOperations" {
        return match serde_json::to_string(&catalog()) {
            Ok(body) => ToolResponse::text(body),
            Err(e) => ToolResponse::error(format!("failed to serialize catalog: {e}")),
        };
    }

    dispatcher.dispatch(&request.op, &request.args).await
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing (stderr).
    init_tracing();

    // 2. Read configuration from environment variables.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    // 3. Log configuration values.
    tracing::info!(data_path = %config.data_path.display(), "Data path");
    tracing::info!(queue_capacity = %config.queue_capacity, "Queue capacity");

    // 4. Open the Store. Log the recovered record count.
    let store = match Store::open(&config.data_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open store");
            std::process::exit(1);
        }
    };
    match store.load() {
        Ok(users) => tracing::info!(users = users.len(), "Recovered collection"),
        Err(e) => tracing::warn!(error = %e, "Could not count recovered records"),
    }

    // 5. Spawn the store worker and build the dispatcher over its handle.
    let (handle, join_handle) = spawn_store(store, config.queue_capacity.get());
    let dispatcher = Dispatcher::new(handle);

    // 6. Optionally install the metrics recorder and serve the endpoint.
    if let Some(addr) = config.metrics_listen {
        match user_store::metrics::install_recorder() {
            Ok(metrics_handle) => {
                user_store::metrics::serve_metrics(metrics_handle, addr);
            }
            Err(e) => tracing::warn!(error = %e, "Metrics recorder not installed"),
        }
    }

    // 7. Serve the line-oriented request loop until EOF or a signal.
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            // EOF: the transport went away.
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read request line");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = respond(&dispatcher, line).await;
        let body = match serde_json::to_string(&response) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                continue;
            }
        };

        if let Err(e) = stdout.write_all(body.as_bytes()).await {
            tracing::error!(error = %e, "Failed to write response");
            break;
        }
        if let Err(e) = stdout.write_all(b"\n").await {
            tracing::error!(error = %e, "Failed to write response");
            break;
        }
        if let Err(e) = stdout.flush().await {
            tracing::error!(error = %e, "Failed to flush response");
            break;
        }
    }

    // 8. Shutdown sequence: log, drop the dispatcher (and with it the only
    // store handle), await the worker task.
    tracing::info!("Shutting down");
    drop(dispatcher);
    join_handle
        .await
        .expect("store worker should exit without panicking");
}
