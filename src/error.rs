use std::io;

/// Errors raised while selecting albums from a remote listing.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("cannot extract album name from path {path:?} with file name {name:?}")]
    AlbumNameExtraction { path: String, name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("failed to fetch remote listing of {root}: {reason}")]
    RemoteListingFetch { root: String, reason: String },

    #[error("invalid ModTime {mod_time:?} for {path:?} in remote listing")]
    InvalidListing { path: String, mod_time: String },

    #[error("transfer of {label} failed: {command}")]
    TransferExecution { label: String, command: String },

    #[error("failed to send notification: {0}")]
    Notification(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("failed to start transfer workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("malformed remote listing: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
