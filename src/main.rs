//! graphdb CLI binary
//!
//! Thin adapter: load configuration, build the embedder and emitter, run the
//! walker, report counters.

use graphdb::cli::{CliErrorPayload, CliSuccessPayload, Commands, IngestArgs, OutputTarget};
use graphdb::config::IngestConfig;
use graphdb::emit::{Emitter, JsonlEmitter, SplitJsonlEmitter};
use graphdb::ingest::AnalyzerRegistry;
use graphdb::pipeline::{CancellationToken, FileProcessor, WalkStats, Walker};
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};

/// Token raised by SIGINT/SIGTERM.
static INTERRUPT: OnceLock<CancellationToken> = OnceLock::new();

fn main() -> ExitCode {
    let cli = graphdb::cli::parse_args();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Ingest(args) => execute_ingest(&args),
    };

    match result {
        Ok(stats) => {
            let payload = CliSuccessPayload::with_data(
                format!(
                    "Processed {} of {} files",
                    stats.pool.processed, stats.pool.submitted
                ),
                serde_json::to_value(stats).unwrap_or_default(),
            );
            if let Ok(text) = serde_json::to_string(&payload) {
                eprintln!("{}", text);
            }
            if stats.pool.emit_failures > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            let payload = CliErrorPayload::from_error(&e);
            match serde_json::to_string(&payload) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("Error: {}", e),
            }
            ExitCode::from(1)
        }
    }
}

/// Run `graphdb ingest`.
fn execute_ingest(args: &IngestArgs) -> graphdb::Result<WalkStats> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::load(path)?,
        None => IngestConfig::default(),
    };
    config.apply_env()?;
    args.apply(&mut config);
    config.validate()?;

    let embedder = config.embedding.build()?;
    let emitter: Arc<dyn Emitter> = match args.output_target() {
        OutputTarget::Stdout => Arc::new(JsonlEmitter::new(Box::new(std::io::stdout()))),
        OutputTarget::File(path) => Arc::new(JsonlEmitter::create(&path)?),
        OutputTarget::Split { nodes, edges } => {
            Arc::new(SplitJsonlEmitter::create(&nodes, &edges)?)
        }
    };

    let processor = FileProcessor::new(
        AnalyzerRegistry::with_defaults(),
        embedder,
        Arc::clone(&emitter),
    );
    let walker =
        Walker::new(config.pool_options(), processor).with_exclude_dirs(config.exclude_dirs.clone());
    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    let stats = match &args.file_list {
        Some(list) => walker.run_file_list(list, &cancel)?,
        None => walker.run_dir(&args.dir, &cancel)?,
    };
    emitter.close()?;

    log::info!(
        "Ingestion finished: {} processed, {} skipped, {} failed, {} emit failures",
        stats.pool.processed,
        stats.pool.skipped,
        stats.pool.failed,
        stats.pool.emit_failures
    );
    Ok(stats)
}

/// Route the first SIGINT/SIGTERM to `token`; queued files still drain.
/// A second signal terminates the process.
#[cfg(unix)]
fn cancel_on_interrupt(token: &CancellationToken) {
    if INTERRUPT.set(token.clone()).is_err() {
        return;
    }
    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_interrupt as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn cancel_on_interrupt(token: &CancellationToken) {
    let _ = INTERRUPT.set(token.clone());
}

#[cfg(unix)]
extern "C" fn on_interrupt(signal: libc::c_int) {
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_cancels_walk() {
        let token = CancellationToken::new();
        cancel_on_interrupt(&token);
        assert!(!token.is_cancelled());

        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(token.is_cancelled());
    }
}
