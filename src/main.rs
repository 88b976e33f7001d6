use anyhow::{bail, Context, Result};
use chrono::Utc;
use gphotos_backup::args::Args;
use gphotos_backup::listing;
use gphotos_backup::notify::{Notifier, Report, SendmailNotifier};
use gphotos_backup::runlog::{LogSink, RunLog};
use gphotos_backup::select::{self, SelectionContext};
use gphotos_backup::transfer::{self, RcloneExecutor, TransferDirective};
use log::{info, warn, LevelFilter};
use std::sync::{Mutex, PoisonError};

fn main() -> Result<()> {
    let args = Args::parse_args();
    init_logging(&args);
    do_main(&args)
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn write_line(log: &Mutex<RunLog>, line: &str) -> Result<()> {
    let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
    log.write(line).context("Failed to write the run log")
}

fn plan_transfers(args: &Args, log: &Mutex<RunLog>) -> Result<Vec<TransferDirective>> {
    let kind = match args.albums {
        Some(kind) => kind,
        None => {
            write_line(log, "Getting gPhotos data...")?;
            return Ok(vec![TransferDirective::for_year(
                &args.remote,
                args.year,
                &args.destination,
            )]);
        }
    };

    write_line(log, &format!("Listing {}:{}...", args.remote, kind))?;
    // The dump is removed when `listing` goes out of scope.
    let listing = listing::fetch_listing(&args.rclone, &args.remote, kind)?;
    let records = listing.records()?;
    write_line(log, &format!("  {} files listed", records.len()))?;

    let context = SelectionContext {
        remote: &args.remote,
        kind,
        destination: &args.destination,
    };
    let selected = select::select_albums(&records, &args.interval, &context)?;
    write_line(
        log,
        &format!(
            "  {} albums modified between {} and {}",
            selected.len(),
            args.interval.from,
            args.interval.to
        ),
    )?;
    Ok(selected.into_values().collect())
}

fn backup(args: &Args, log: &Mutex<RunLog>) -> Result<()> {
    let directives = plan_transfers(args, log)?;
    let executor = RcloneExecutor::new(&args.rclone);
    let summary = transfer::run_transfers(&executor, &directives, args.jobs, log)?;
    write_line(
        log,
        &format!(
            "Done: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed.len()
        ),
    )?;
    if !summary.failed.is_empty() {
        warn!("Failed transfers: {}", summary.failed.join(", "));
    }
    Ok(())
}

fn send_log_via_email(args: &Args, log: &RunLog) -> Result<()> {
    let (sender, to) = match (&args.sm_from, &args.sm_to) {
        (Some(sender), Some(to)) => (sender, to),
        _ => bail!("--sm requires --sm-from and --sm-to"),
    };
    println!("# Send Log Via Email ({})", to);
    let report = Report::backup_status(
        sender,
        to,
        &args.remote,
        args.kind_label(),
        &args.destination.display().to_string(),
        &args.interval,
        log.path(),
    );
    SendmailNotifier::new(&args.sendmail)
        .send(&report)
        .context("Failed to send the log")
}

fn do_main(args: &Args) -> Result<()> {
    let log = RunLog::create(&args.log_dir, Utc::now().timestamp())
        .with_context(|| format!("Failed to create the run log in {}", args.log_dir.display()))?;
    info!("Writing run log to {}", log.path().display());
    let log = Mutex::new(log);

    let outcome = backup(args, &log);
    if let Err(err) = &outcome {
        write_line(&log, &format!("Backup aborted: {:#}", err))?;
    }

    let log = log.into_inner().unwrap_or_else(PoisonError::into_inner);
    let notified = if args.send_mail {
        send_log_via_email(args, &log)
    } else {
        Ok(())
    };
    if let Err(err) = &notified {
        warn!("{:#}", err);
    }

    if args.clean {
        println!("# Cleaning up files");
        log.remove().context("Failed to remove the run log")?;
    }

    outcome.and(notified)
}
