use crate::datetime;
use crate::select::DateInterval;
use crate::transfer::AlbumKind;
use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(name = "gphotos-backup")]
#[clap(author, version, about)]
pub struct Args {
    /// The rclone remote of the Google Photos library.
    pub remote: String,
    /// Destination: a directory or an rclone remote path.
    pub destination: PathBuf,
    /// The year to back up, as YYYY.
    #[clap(value_parser = parse_year)]
    pub year: i32,
    /// Back up the albums of this kind modified in the period, instead of
    /// the whole year.
    #[clap(long, value_enum, value_name = "KIND")]
    pub albums: Option<AlbumKind>,
    /// First day of the period (YYYY-MM-DD), January 1 of the year if unset.
    #[clap(long, value_parser = parse_date, requires = "albums")]
    pub from: Option<NaiveDate>,
    /// Last day of the period (YYYY-MM-DD), December 31 of the year if unset.
    #[clap(long, value_parser = parse_date, requires = "albums")]
    pub to: Option<NaiveDate>,
    /// Send the log via email.
    #[clap(long = "sm", requires_all = ["sm_from", "sm_to"])]
    pub send_mail: bool,
    /// Sender address of the log email.
    #[clap(long = "sm-from", value_name = "EMAIL")]
    pub sm_from: Option<String>,
    /// Recipient address of the log email.
    #[clap(long = "sm-to", value_name = "EMAIL")]
    pub sm_to: Option<String>,
    /// Delete the log and other temporary files after the run.
    #[clap(long)]
    pub clean: bool,
    /// Number of transfers to run at the same time.
    #[clap(short, long, default_value_t = 1, value_parser = parse_jobs)]
    pub jobs: usize,
    /// Only print warnings and errors besides the run log.
    #[clap(short, long)]
    pub quiet: bool,
    /// Directory to write the run log in.
    #[clap(long, value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,
    /// The rclone executable.
    #[clap(long, env = "GPHOTOS_BACKUP_RCLONE", default_value = "rclone")]
    pub rclone: PathBuf,
    /// The sendmail compatible command used to deliver the log.
    #[clap(long, env = "GPHOTOS_BACKUP_SENDMAIL", default_value = "sendmail")]
    pub sendmail: PathBuf,
    /// The period covered by the run, resolved from the options above.
    #[clap(skip)]
    pub interval: DateInterval,
}

fn parse_year(s: &str) -> Result<i32, String> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{:?} is not a four-digit year", s));
    }
    s.parse().map_err(|err| format!("{:?}: {}", s, err))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    datetime::parse_date(s.as_bytes()).ok_or_else(|| format!("{:?} is not a YYYY-MM-DD date", s))
}

fn parse_jobs(s: &str) -> Result<usize, String> {
    match s.parse() {
        Ok(0) => Err("at least one job is needed".to_string()),
        Ok(jobs) => Ok(jobs),
        Err(err) => Err(format!("{:?}: {}", s, err)),
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Self::try_parse_args(std::env::args_os()).unwrap_or_else(|err| err.exit())
    }

    pub fn try_parse_args<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut result = Self::try_parse_from(iter)?;
        result.interval = result.resolve_interval()?;
        Ok(result)
    }

    fn resolve_interval(&self) -> Result<DateInterval, clap::Error> {
        let year = DateInterval::whole_year(self.year).ok_or_else(|| {
            Self::command().error(
                ErrorKind::ValueValidation,
                format!("year {} is out of range", self.year),
            )
        })?;
        let from = self.from.unwrap_or(year.from);
        let to = self.to.unwrap_or(year.to);
        if from > to {
            return Err(Self::command().error(
                ErrorKind::ArgumentConflict,
                format!("--from {} is after --to {}", from, to),
            ));
        }
        Ok(DateInterval::new(from, to))
    }

    /// The tag naming what is backed up, as shown in the report.
    pub fn kind_label(&self) -> &'static str {
        self.albums.map_or("by-year", AlbumKind::as_str)
    }
}
