use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use gphotos_backup::notify::{Notifier, Report, SendmailNotifier};
use std::fs;
use std::path::{Path, PathBuf};

/// Send a message through the local sendmail command.
#[derive(Debug, Parser)]
#[clap(name = "gphotos-mail")]
#[clap(author, version, about)]
#[clap(group(ArgGroup::new("body").required(true).multiple(true).args(["html", "plain"])))]
struct Args {
    /// Sender's email address.
    sender: String,
    /// Recipient's email address.
    to: String,
    /// Subject line.
    subject: String,
    /// File holding the HTML message.
    #[clap(long, value_name = "FILE")]
    html: Option<PathBuf>,
    /// File holding the plain text message.
    #[clap(long, value_name = "FILE")]
    plain: Option<PathBuf>,
    /// Attach a file; can be given multiple times.
    #[clap(short = 'a', long = "attach", value_name = "FILE")]
    attachments: Vec<PathBuf>,
    /// The sendmail compatible command used to deliver the message.
    #[clap(long, env = "GPHOTOS_BACKUP_SENDMAIL", default_value = "sendmail")]
    sendmail: PathBuf,
}

fn read_message(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|path| {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    })
    .transpose()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let report = Report {
        html: read_message(args.html.as_deref())?,
        plain: read_message(args.plain.as_deref())?,
        sender: args.sender,
        to: args.to,
        subject: args.subject,
        attachments: args.attachments,
    };
    SendmailNotifier::new(&args.sendmail)
        .send(&report)
        .context("Failed to send the message")
}
