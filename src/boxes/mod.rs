//! Boxes store zettel. The [`Manager`] combines several of them into one
//! logical store and keeps the index up to date.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Sender;
use serde::Serialize;

use crate::content::Zettel;
use crate::id::Zid;
use crate::meta::Meta;

pub mod compbox;
pub mod constbox;
pub mod dirbox;
pub mod manager;
pub mod membox;
pub mod registry;

pub use manager::{Manager, StartState};
pub use registry::ConnectData;

/// A storage backend for zettel.
///
/// Box operations are called concurrently; implementations guard their own
/// state.
pub trait ManagedBox: Send + Sync {
    fn location(&self) -> String;

    fn can_create_zettel(&self) -> bool;

    fn create_zettel(&self, zettel: Zettel) -> Result<Zid, BoxError>;

    fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError>;

    fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        self.get_zettel(zid).map(|zettel| zettel.meta)
    }

    fn has_zettel(&self, zid: Zid) -> bool;

    fn apply_zid(
        &self,
        handle: &mut dyn FnMut(Zid),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError>;

    fn apply_meta(
        &self,
        handle: &mut dyn FnMut(Meta),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError>;

    fn can_update_zettel(&self, zettel: &Zettel) -> bool;

    /// Replaces a zettel, creating it if the box does not hold it yet.
    fn update_zettel(&self, zettel: Zettel) -> Result<(), BoxError>;

    fn allow_rename_zettel(&self, zid: Zid) -> bool;

    fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> Result<(), BoxError>;

    fn can_delete_zettel(&self, zid: Zid) -> bool;

    fn delete_zettel(&self, zid: Zid) -> Result<(), BoxError>;

    fn read_stats(&self) -> ManagedBoxStats;

    fn start_stopper(&self) -> Option<&dyn StartStopper> {
        None
    }

    fn refresher(&self) -> Option<&dyn Refresher> {
        None
    }
}

pub trait StartStopper {
    fn start(&self) -> Result<(), BoxError>;
    fn stop(&self);
}

pub trait Refresher {
    fn refresh(&self) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UpdateReason {
    Ready,
    Reload,
    Zettel,
    Delete,
}

impl UpdateReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateReason::Ready => "ready",
            UpdateReason::Reload => "reload",
            UpdateReason::Zettel => "zettel",
            UpdateReason::Delete => "delete",
        }
    }
}

/// A change reported by a box. Box number 0 denotes the manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    pub box_number: usize,
    pub reason: UpdateReason,
    pub zid: Zid,
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    box_number: usize,
    sender: Option<Sender<UpdateInfo>>,
    /// Events sent but not yet handled by the receiver.
    pending: Arc<AtomicUsize>,
}

impl Notifier {
    pub fn new(box_number: usize, sender: Option<Sender<UpdateInfo>>) -> Self {
        Self {
            box_number,
            sender,
            pending: Arc::default(),
        }
    }

    pub fn with_pending(mut self, pending: Arc<AtomicUsize>) -> Self {
        self.pending = pending;
        self
    }

    pub fn box_number(&self) -> usize {
        self.box_number
    }

    pub fn notify(&self, reason: UpdateReason, zid: Zid) {
        if let Some(sender) = &self.sender {
            self.pending.fetch_add(1, Ordering::SeqCst);
            let sent = sender.send(UpdateInfo {
                box_number: self.box_number,
                reason,
                zid,
            });
            // The manager may already be gone during shutdown.
            if sent.is_err() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManagedBoxStats {
    pub read_only: bool,
    pub zettel: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub read_only: bool,
    pub num_managed_boxes: usize,
    pub zettel_total: usize,
    pub last_reload: Option<String>,
    pub indexes_since_reload: u64,
    pub dur_last_reload_ms: u64,
    pub zettel_indexed: usize,
    pub index_updates: u64,
    pub indexed_words: usize,
    pub indexed_urls: usize,
}

#[derive(Debug)]
pub enum BoxError {
    Stopped,
    Started,
    ReadOnly,
    Capacity,
    Conflict,
    ZettelNotFound(Zid),
    InvalidZid(String),
    InvalidScheme(String),
    NotAllowed {
        op: &'static str,
        user: String,
        zid: Zid,
    },
    InvalidConfig(String),
    Io(std::io::Error),
}

impl BoxError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BoxError::ZettelNotFound(_))
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, BoxError::ReadOnly)
    }
}

impl fmt::Display for BoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxError::Stopped => write!(f, "box is stopped"),
            BoxError::Started => write!(f, "box is already started"),
            BoxError::ReadOnly => write!(f, "read-only box"),
            BoxError::Capacity => write!(f, "box capacity exceeded"),
            BoxError::Conflict => write!(f, "no free zettel identifier available"),
            BoxError::ZettelNotFound(zid) => write!(f, "zettel {} not found", zid),
            BoxError::InvalidZid(zid) => write!(f, "invalid zettel identifier '{}'", zid),
            BoxError::InvalidScheme(scheme) => write!(f, "unknown box scheme '{}'", scheme),
            BoxError::NotAllowed { op, user, zid } => {
                if user.is_empty() {
                    write!(f, "operation '{}' on zettel {} not allowed", op, zid)
                } else {
                    write!(
                        f,
                        "operation '{}' on zettel {} not allowed for user '{}'",
                        op, zid, user
                    )
                }
            }
            BoxError::InvalidConfig(message) => write!(f, "invalid box configuration: {}", message),
            BoxError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for BoxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BoxError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BoxError {
    fn from(value: std::io::Error) -> Self {
        BoxError::Io(value)
    }
}

const NEW_ZID_ATTEMPTS: usize = 90;
const NEW_ZID_WAIT: Duration = Duration::from_millis(100);

/// Allocates a zid derived from the current time.
///
/// The first attempt is precise to the minute, later ones to the second.
/// `is_free` tells whether a candidate may be used.
pub fn new_zid(
    mut is_free: impl FnMut(Zid) -> Result<bool, BoxError>,
) -> Result<Zid, BoxError> {
    let mut with_seconds = false;
    for _ in 0..NEW_ZID_ATTEMPTS {
        let zid = Zid::now(with_seconds);
        if is_free(zid)? {
            return Ok(zid);
        }
        thread::sleep(NEW_ZID_WAIT);
        with_seconds = true;
    }
    Err(BoxError::Conflict)
}

#[cfg(test)]
mod tests {
    use super::{new_zid, BoxError};

    #[test]
    fn new_zid_retries_with_seconds() {
        let mut calls = Vec::new();
        let zid = new_zid(|zid| {
            calls.push(zid);
            Ok(calls.len() > 1)
        })
        .expect("second candidate should be accepted");
        assert_eq!(calls.len(), 2);
        assert_eq!(zid, calls[1]);
        assert_eq!(calls[0].as_u64() % 100, 0);
    }

    #[test]
    fn new_zid_propagates_errors() {
        let err = new_zid(|_| Err(BoxError::Stopped)).expect_err("error should propagate");
        assert!(matches!(err, BoxError::Stopped));
    }

    #[test]
    fn error_helpers_classify() {
        assert!(BoxError::ZettelNotFound(crate::id::Zid::HOME).is_not_found());
        assert!(BoxError::ReadOnly.is_read_only());
        assert!(!BoxError::Capacity.is_not_found());
    }
}
