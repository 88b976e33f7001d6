use crate::datetime;
use crate::error::BackupError;
use crate::select::FileRecord;
use crate::transfer::AlbumKind;
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

/// An entry of `rclone lsjson` output. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct RemoteEntry {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ModTime")]
    mod_time: String,
}

impl RemoteEntry {
    fn into_record(self) -> Result<FileRecord, BackupError> {
        let modified_at = match datetime::parse_datetime(self.mod_time.as_bytes()) {
            Some(dt) => dt,
            None => {
                return Err(BackupError::InvalidListing {
                    path: self.path,
                    mod_time: self.mod_time,
                })
            }
        };
        Ok(FileRecord {
            path: self.path,
            name: self.name,
            modified_at,
        })
    }
}

/// Parses a JSON array of listing entries.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<FileRecord>, BackupError> {
    let entries: Vec<RemoteEntry> = serde_json::from_reader(reader)?;
    entries.into_iter().map(RemoteEntry::into_record).collect()
}

/// A dump of the remote listing, deleted when dropped.
pub struct Listing {
    dump: NamedTempFile,
}

impl Listing {
    #[cfg(test)]
    fn path(&self) -> &Path {
        self.dump.path()
    }

    pub fn records(&self) -> Result<Vec<FileRecord>, BackupError> {
        parse_records(BufReader::new(File::open(self.dump.path())?))
    }
}

/// Lists every file under `<remote>:<kind>` recursively.
pub fn fetch_listing(rclone: &Path, remote: &str, kind: AlbumKind) -> Result<Listing, BackupError> {
    let root = format!("{}:{}", remote, kind);
    let dump = tempfile::Builder::new()
        .prefix("gphotos-listing-")
        .suffix(".json")
        .tempfile()?;
    debug!("Dumping listing of {} into {}", root, dump.path().display());

    let fetch_error = |reason: String| BackupError::RemoteListingFetch {
        root: root.clone(),
        reason,
    };
    let status = Command::new(rclone)
        .args(["lsjson", "-R", "--files-only"])
        .arg(&root)
        .stdout(Stdio::from(dump.reopen()?))
        .status()
        .map_err(|err| fetch_error(format!("cannot run {}: {}", rclone.display(), err)))?;
    if !status.success() {
        return Err(fetch_error(format!("rclone {}", status)));
    }
    Ok(Listing { dump })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, TimeZone};

    const LISTING: &str = r#"[
        {"Path":"Trip2021/a.jpg","Name":"a.jpg","Size":2048,"MimeType":"image/jpeg","ModTime":"2021-06-15T10:00:00.000Z","IsDir":false,"ID":"AF1QipN"},
        {"Path":"Party/b.mp4","Name":"b.mp4","Size":-1,"MimeType":"video/mp4","ModTime":"2021-07-01T08:30:00+02:00","IsDir":false}
    ]"#;

    #[test]
    fn test_parse_records() {
        let records = parse_records(LISTING.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                FileRecord {
                    path: "Trip2021/a.jpg".to_string(),
                    name: "a.jpg".to_string(),
                    modified_at: FixedOffset::east_opt(0)
                        .unwrap()
                        .with_ymd_and_hms(2021, 6, 15, 10, 0, 0)
                        .unwrap(),
                },
                FileRecord {
                    path: "Party/b.mp4".to_string(),
                    name: "b.mp4".to_string(),
                    modified_at: FixedOffset::east_opt(2 * 3600)
                        .unwrap()
                        .with_ymd_and_hms(2021, 7, 1, 8, 30, 0)
                        .unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_records("[]".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_mod_time() {
        let listing = r#"[{"Path":"A/a.jpg","Name":"a.jpg","ModTime":"yesterday"}]"#;
        match parse_records(listing.as_bytes()) {
            Err(BackupError::InvalidListing { path, mod_time }) => {
                assert_eq!(path, "A/a.jpg");
                assert_eq!(mod_time, "yesterday");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_field() {
        let listing = r#"[{"Path":"A/a.jpg","ModTime":"2021-06-15T10:00:00Z"}]"#;
        assert!(matches!(
            parse_records(listing.as_bytes()),
            Err(BackupError::Json(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_fetch_failure() {
        let err = match fetch_listing(Path::new("false"), "gphotos", AlbumKind::Album) {
            Err(err) => err,
            Ok(_) => panic!("`false` should fail the fetch"),
        };
        match err {
            BackupError::RemoteListingFetch { root, .. } => assert_eq!(root, "gphotos:album"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dump_removed_on_drop() {
        // `echo` prints its arguments, which is not JSON but is a dump.
        let listing = fetch_listing(Path::new("echo"), "gphotos", AlbumKind::SharedAlbum).unwrap();
        let path = listing.path().to_path_buf();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "lsjson -R --files-only gphotos:shared-album\n"
        );
        assert!(matches!(listing.records(), Err(BackupError::Json(_))));
        drop(listing);
        assert!(!path.exists());
    }
}
