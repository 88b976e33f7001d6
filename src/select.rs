use crate::error::SelectionError;
use crate::transfer::{AlbumKind, TransferDirective};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;

/// A file from the remote listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub modified_at: DateTime<FixedOffset>,
}

/// Inclusive range of calendar dates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateInterval {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateInterval {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateInterval { from, to }
    }

    pub fn whole_year(year: i32) -> Option<Self> {
        Some(DateInterval {
            from: NaiveDate::from_ymd_opt(year, 1, 1)?,
            to: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    /// Whether the day of `dt`, in its own offset, is within the interval.
    pub fn contains(&self, dt: &DateTime<FixedOffset>) -> bool {
        let date = dt.date_naive();
        self.from <= date && date <= self.to
    }
}

/// Where selected albums are copied from and to.
#[derive(Clone, Copy, Debug)]
pub struct SelectionContext<'a> {
    pub remote: &'a str,
    pub kind: AlbumKind,
    pub destination: &'a Path,
}

pub type SelectionResult = BTreeMap<String, TransferDirective>;

/// Returns the directory part of the record's path.
///
/// The path must contain `/<name>` exactly once, at its very end. An empty
/// album is rejected too, even though `"/a.jpg"` splits into two parts,
/// since copying it would copy the whole album root.
pub fn album_name(record: &FileRecord) -> Result<&str, SelectionError> {
    let fragment = format!("/{}", record.name);
    let mut parts = record.path.split(fragment.as_str());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(album), Some(""), None) if !record.name.is_empty() && !album.is_empty() => Ok(album),
        _ => Err(SelectionError::AlbumNameExtraction {
            path: record.path.clone(),
            name: record.name.clone(),
        }),
    }
}

/// Picks the albums having at least one file modified within `interval`.
///
/// Every record is checked, so a malformed one fails the whole selection
/// even when it is outside the interval.
pub fn select_albums(
    records: &[FileRecord],
    interval: &DateInterval,
    context: &SelectionContext,
) -> Result<SelectionResult, SelectionError> {
    let mut selected = BTreeMap::new();
    for record in records {
        let album = album_name(record)?;
        if !interval.contains(&record.modified_at) {
            continue;
        }
        selected.entry(album.to_string()).or_insert_with(|| {
            TransferDirective::for_album(context.remote, context.kind, album, context.destination)
        });
    }
    Ok(selected)
}
