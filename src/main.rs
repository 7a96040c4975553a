//! garden-export
//!
//! Exports sensing-garden records to CSV.
//!
//! # Usage
//!
//! ```bash
//! # Export classifications for one device in July
//! garden-export dump.jsonl --table classifications --device-id garden-01 \
//!     --start-time 2023-07-01T00:00:00Z --end-time 2023-07-31T23:59:59Z
//!
//! # Write to stdout
//! garden-export dump.json -t detections -o -
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

use garden_export::cli::{CliInterface, OutputTarget};
use garden_export::error::{ExportError, Result};
use garden_export::export::{ExportOutcome, ExportPipeline, ExportRequest, ProgressTracker};
use garden_export::store::MemoryStore;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    run_export(&cli).await
}

/// Validate the request, load the dump and run the pipeline
async fn run_export(cli: &CliInterface) -> Result<()> {
    let request = ExportRequest::from_params(&cli.export_params(), &cli.config().export)?;
    info!(
        "Exporting as {} ({})",
        request.content_type(),
        request.content_disposition()
    );

    let input = cli
        .args()
        .input
        .as_deref()
        .ok_or_else(|| ExportError::Generic("INPUT file is required".to_string()))?;
    let text = tokio::fs::read_to_string(input).await?;
    let store = MemoryStore::from_json_text(request.shape, &text)?;

    let pipeline = ExportPipeline::new(Arc::new(store), cli.config());
    let tracker = ProgressTracker::new(Some(request.limit), cli.args().progress);

    // Ctrl+C stops fetching; rows already written stay on disk
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let result = match cli.output_target(&request) {
        OutputTarget::Stdout => {
            pipeline
                .run(&request, tokio::io::stdout(), cancel_token, &tracker)
                .await
        }
        OutputTarget::File(path) => {
            let file = tokio::fs::File::create(&path).await?;
            pipeline.run(&request, file, cancel_token, &tracker).await
        }
    };

    ctrl_c_handle.abort();
    let summary = result.inspect_err(|err| {
        if err.is_truncation() {
            warn!("The output is incomplete and should not be used as a full export");
        } else if tracker.processed() > 0 {
            warn!(
                "Export stopped after {} rows from {} pages",
                tracker.processed(),
                tracker.pages()
            );
        }
    })?;

    if summary.outcome.is_capped() {
        warn!("Export hit a cap ({}); more records may exist", summary.outcome);
    }

    if !cli.args().quiet {
        eprintln!("{}", summary);
    }

    if summary.outcome == ExportOutcome::Cancelled {
        return Err(ExportError::Generic("Export cancelled".to_string()));
    }
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so CSV on stdout stays clean.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
