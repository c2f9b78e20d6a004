use anyhow::Context;
use clap::Parser;
use img_squeeze::cli::Args;
use img_squeeze::{logger, Pipeline};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(args.quiet, args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    // The credential is read here, once, and travels inside the configuration.
    let config = args.configuration().with_credential_from_env();
    config.validate().context("invalid configuration")?;

    let killed = Arc::new(AtomicBool::new(false));
    sigint(Arc::clone(&killed));

    let report = Pipeline::new(&config)
        .with_cancel_flag(Arc::clone(&killed))
        .with_progress(!args.quiet)
        .run(&args.input)
        .with_context(|| format!("cannot process {:?}", args.input))?;

    report.print_summary();

    if killed.load(Ordering::Acquire) {
        eprintln!("⚠️  Batch aborted; unstarted files were skipped");
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// First CTRL+C stops new files from starting, a second one exits at once.
fn sigint(killed: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if killed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            std::process::exit(1);
        }
    });
    if let Err(e) = result {
        tracing::warn!("Could not install CTRL+C handler: {}", e);
    }
}
