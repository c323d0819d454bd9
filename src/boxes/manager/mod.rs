//! The box manager: one logical store over an ordered list of boxes, with a
//! background indexer fed by change notifications.

use std::any::Any;
use std::collections::BTreeMap;
use std::io;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use serde::Serialize;
use time::OffsetDateTime;

use super::compbox::CompBox;
use super::constbox::ConstBox;
use super::registry::{self, ConnectData};
use super::{BoxError, ManagedBox, Stats, UpdateInfo, UpdateReason};
use crate::config::Config;
use crate::content::Zettel;
use crate::id::{Zid, ZidSet};
use crate::meta::values;
use crate::meta::Meta;
use crate::parser::{ContentParser, MarkupParser};
use crate::query::Query;
use crate::store::MemStore;

mod anteroom;
mod collect;
mod enrich;
mod indexer;
mod notifier;

pub use anteroom::{Anteroom, AnteroomAction, DEFAULT_MAX_LOAD};

const RESTART_DELAY: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl StartState {
    pub fn as_str(self) -> &'static str {
        match self {
            StartState::Stopped => "stopped",
            StartState::Starting => "starting",
            StartState::Started => "started",
            StartState::Stopping => "stopping",
        }
    }
}

pub type Observer = Arc<dyn Fn(UpdateInfo) + Send + Sync>;

struct Lifecycle {
    state: StartState,
    done: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Startup {
    ready: Vec<bool>,
    deferred: Vec<UpdateInfo>,
}

#[derive(Default)]
struct IndexStats {
    last_reload: Option<OffsetDateTime>,
    since_reload: u64,
    dur_reload: Duration,
}

pub(crate) struct Shared {
    read_only_mode: bool,
    boxes: Vec<Box<dyn ManagedBox>>,
    store: MemStore,
    anteroom: Anteroom,
    parser: Box<dyn ContentParser>,
    infos_tx: Sender<UpdateInfo>,
    infos_rx: Receiver<UpdateInfo>,
    idx_ready_tx: Sender<()>,
    idx_ready_rx: Receiver<()>,
    pending: Arc<AtomicUsize>,
    /// True while the indexer drains the anteroom.
    indexing: AtomicBool,
    observers: RwLock<Vec<Observer>>,
    lifecycle: Mutex<Lifecycle>,
    startup: Mutex<Startup>,
    index_stats: Mutex<IndexStats>,
}

/// Combines the configured boxes with the built-in constant and computed
/// boxes. Box numbers start at 1, in configuration order.
pub struct Manager {
    shared: Arc<Shared>,
}

impl Manager {
    pub fn new(config: &Config) -> Result<Self, BoxError> {
        Self::with_parser(config, Box::new(MarkupParser))
    }

    pub fn with_parser(config: &Config, parser: Box<dyn ContentParser>) -> Result<Self, BoxError> {
        if config.boxes.is_empty() {
            return Err(BoxError::InvalidConfig("no box configured".to_string()));
        }
        let (infos_tx, infos_rx) = unbounded();
        let (idx_ready_tx, idx_ready_rx) = bounded(1);
        let pending = Arc::new(AtomicUsize::new(0));

        let mut boxes = Vec::with_capacity(config.boxes.len() + 2);
        for (pos, box_config) in config.boxes.iter().enumerate() {
            let data = ConnectData {
                number: pos + 1,
                notify: Some(infos_tx.clone()),
                pending: Arc::clone(&pending),
            };
            boxes.push(registry::connect(
                &box_config.uri,
                config.read_only_mode,
                &data,
            )?);
        }

        let shared = Arc::new_cyclic(|weak| {
            boxes.push(Box::new(ConstBox));
            boxes.push(Box::new(CompBox::new(weak.clone())));
            Shared {
                read_only_mode: config.read_only_mode,
                boxes,
                store: MemStore::new(),
                anteroom: Anteroom::new(config.anteroom_max_load),
                parser,
                infos_tx,
                infos_rx,
                idx_ready_tx,
                idx_ready_rx,
                pending,
                indexing: AtomicBool::new(false),
                observers: RwLock::new(Vec::new()),
                lifecycle: Mutex::new(Lifecycle {
                    state: StartState::Stopped,
                    done: None,
                    workers: Vec::new(),
                }),
                startup: Mutex::new(Startup::default()),
                index_stats: Mutex::new(IndexStats::default()),
            }
        });
        Ok(Self { shared })
    }

    pub fn state(&self) -> StartState {
        self.shared.state()
    }

    /// Starts all boxes and the background workers.
    ///
    /// The manager reports `Started` once every box announced that it is
    /// ready; use [`Manager::wait_started`] to block until then.
    pub fn start(&self) -> Result<(), BoxError> {
        let shared = &self.shared;
        {
            let mut lifecycle = shared.lifecycle();
            if lifecycle.state != StartState::Stopped {
                return Err(BoxError::Started);
            }
            lifecycle.state = StartState::Starting;
        }
        {
            let mut startup = shared.startup();
            startup.ready = shared
                .boxes
                .iter()
                .map(|managed| managed.start_stopper().is_none())
                .collect();
            startup.deferred.clear();
        }
        while shared.infos_rx.try_recv().is_ok() {
            shared.pending.fetch_sub(1, Ordering::SeqCst);
        }
        shared.anteroom.reset();

        for pos in (0..shared.boxes.len()).rev() {
            let Some(starter) = shared.boxes[pos].start_stopper() else {
                continue;
            };
            if let Err(err) = starter.start() {
                tracing::error!(box_number = pos + 1, error = %err, "unable to start box");
                shared.stop_boxes(pos + 1);
                shared.set_state(StartState::Stopped);
                return Err(err);
            }
        }

        let (done_tx, done_rx) = bounded::<()>(0);
        let mut workers = Vec::with_capacity(2);
        let spawned = notifier::spawn(Arc::clone(shared), done_rx.clone())
            .and_then(|handle| {
                workers.push(handle);
                indexer::spawn(Arc::clone(shared), done_rx)
            })
            .map(|handle| workers.push(handle));
        if let Err(err) = spawned {
            drop(done_tx);
            join_workers(workers);
            shared.stop_boxes(0);
            shared.set_state(StartState::Stopped);
            return Err(err.into());
        }
        {
            let mut lifecycle = shared.lifecycle();
            lifecycle.done = Some(done_tx);
            lifecycle.workers = workers;
        }
        tracing::info!(boxes = shared.boxes.len(), "box manager starting");
        shared.mark_ready(0);
        Ok(())
    }

    /// Stops the workers and then every box. Does nothing unless running.
    pub fn stop(&self) {
        let shared = &self.shared;
        let (done, workers) = {
            let mut lifecycle = shared.lifecycle();
            if !matches!(lifecycle.state, StartState::Starting | StartState::Started) {
                return;
            }
            lifecycle.state = StartState::Stopping;
            (lifecycle.done.take(), mem::take(&mut lifecycle.workers))
        };
        drop(done);
        join_workers(workers);
        shared.stop_boxes(0);
        shared.set_state(StartState::Stopped);
        tracing::info!("box manager stopped");
    }

    pub fn wait_started(&self, timeout: Duration) -> bool {
        poll_until(timeout, || self.state() == StartState::Started)
    }

    pub fn wait_indexed(&self, timeout: Duration) -> bool {
        poll_until(timeout, || self.shared.is_index_idle())
    }

    pub fn register_observer(&self, observer: impl Fn(UpdateInfo) + Send + Sync + 'static) {
        self.shared
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(observer));
    }

    pub fn location(&self) -> String {
        self.shared
            .boxes
            .first()
            .map(|managed| managed.location())
            .unwrap_or_default()
    }

    pub fn box_locations(&self) -> Vec<String> {
        self.shared.box_locations()
    }

    pub fn can_create_zettel(&self) -> bool {
        self.shared.is_started() && self.primary().can_create_zettel()
    }

    pub fn create_zettel(&self, mut zettel: Zettel) -> Result<Zid, BoxError> {
        self.shared.check_started()?;
        if self.shared.read_only_mode {
            return Err(BoxError::ReadOnly);
        }
        clean_for_store(&mut zettel);
        let zid = self.primary().create_zettel(zettel)?;
        tracing::debug!(zid = %zid, "zettel created");
        self.shared.index_now(zid);
        Ok(zid)
    }

    pub fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError> {
        self.shared.check_started()?;
        for (pos, managed) in self.shared.boxes.iter().enumerate() {
            match managed.get_zettel(zid) {
                Ok(mut zettel) => {
                    self.shared.enrich_meta(&mut zettel.meta, pos + 1);
                    return Ok(zettel);
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Err(BoxError::ZettelNotFound(zid))
    }

    pub fn get_all_zettel(&self, zid: Zid) -> Result<Vec<Zettel>, BoxError> {
        self.shared.check_started()?;
        let mut result = Vec::new();
        for (pos, managed) in self.shared.boxes.iter().enumerate() {
            match managed.get_zettel(zid) {
                Ok(mut zettel) => {
                    self.shared.enrich_meta(&mut zettel.meta, pos + 1);
                    result.push(zettel);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    /// Metadata from the index, falling back to the boxes for zettel the
    /// indexer has not seen yet.
    pub fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        self.shared.check_started()?;
        match self.shared.store.get_meta(zid) {
            Ok(mut meta) => {
                self.shared.enrich_meta(&mut meta, 0);
                Ok(meta)
            }
            Err(_) => self.get_zettel(zid).map(|zettel| zettel.meta),
        }
    }

    pub fn has_zettel(&self, zid: Zid) -> bool {
        self.shared.is_started() && self.shared.has_zettel_raw(zid)
    }

    pub fn fetch_zids(&self) -> Result<ZidSet, BoxError> {
        self.shared.check_started()?;
        self.shared.fetch_zids_raw()
    }

    pub fn select_meta(&self, query: &Query) -> Result<Vec<Meta>, BoxError> {
        self.shared.check_started()?;
        let compiled = query.compile(&self.shared.store);
        if let Some(zids) = compiled.fixed_zids() {
            let metas = zids
                .iter()
                .filter_map(|zid| self.get_meta(*zid).ok())
                .filter(|meta| compiled.matches(meta))
                .collect();
            return Ok(compiled.after_search(metas));
        }

        let mut selected: BTreeMap<Zid, Meta> = BTreeMap::new();
        for term in compiled.terms() {
            let mut rejected = ZidSet::new();
            for (pos, managed) in self.shared.boxes.iter().enumerate() {
                managed.apply_meta(
                    &mut |mut meta: Meta| {
                        if selected.contains_key(&meta.zid) || rejected.contains(meta.zid) {
                            return;
                        }
                        self.shared.enrich_meta(&mut meta, pos + 1);
                        if term.matches(&meta) {
                            selected.insert(meta.zid, meta);
                        } else {
                            rejected.add(meta.zid);
                        }
                    },
                    &|zid| term.retrieve(zid),
                )?;
            }
        }
        Ok(compiled.after_search(selected.into_values().collect()))
    }

    pub fn can_update_zettel(&self, zettel: &Zettel) -> bool {
        self.shared.is_started() && self.primary().can_update_zettel(zettel)
    }

    /// Writes a zettel to the primary box. Properties are removed and the
    /// content is trimmed first.
    pub fn update_zettel(&self, mut zettel: Zettel) -> Result<(), BoxError> {
        self.shared.check_started()?;
        if self.shared.read_only_mode {
            return Err(BoxError::ReadOnly);
        }
        clean_for_store(&mut zettel);
        let zid = zettel.meta.zid;
        self.primary().update_zettel(zettel)?;
        tracing::debug!(zid = %zid, "zettel updated");
        self.shared.index_now(zid);
        Ok(())
    }

    pub fn allow_rename_zettel(&self, zid: Zid) -> bool {
        self.shared.is_started()
            && self
                .shared
                .boxes
                .iter()
                .all(|managed| managed.allow_rename_zettel(zid))
    }

    /// Renames a zettel in every box. Boxes already renamed are reverted if
    /// a later box fails.
    pub fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> Result<(), BoxError> {
        let shared = &self.shared;
        shared.check_started()?;
        if cur_zid == new_zid {
            return Ok(());
        }
        if !new_zid.is_valid() {
            return Err(BoxError::InvalidZid(new_zid.to_string()));
        }
        if !shared.has_zettel_raw(cur_zid) {
            return Err(BoxError::ZettelNotFound(cur_zid));
        }
        if shared.has_zettel_raw(new_zid) {
            return Err(BoxError::InvalidZid(new_zid.to_string()));
        }

        let mut renamed: Vec<usize> = Vec::new();
        for (pos, managed) in shared.boxes.iter().enumerate() {
            match managed.rename_zettel(cur_zid, new_zid) {
                Ok(()) => renamed.push(pos),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    for undo in renamed.into_iter().rev() {
                        if let Err(undo_err) = shared.boxes[undo].rename_zettel(new_zid, cur_zid) {
                            tracing::error!(
                                box_number = undo + 1,
                                zid = %new_zid,
                                error = %undo_err,
                                "unable to revert rename"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        tracing::debug!(from = %cur_zid, to = %new_zid, "zettel renamed");
        let to_check = shared.store.rename_zettel(cur_zid, new_zid);
        shared.enqueue_checks(&to_check);
        Ok(())
    }

    pub fn can_delete_zettel(&self, zid: Zid) -> bool {
        self.shared.is_started()
            && self
                .shared
                .boxes
                .iter()
                .any(|managed| managed.can_delete_zettel(zid))
    }

    /// Deletes the first deletable copy of a zettel.
    pub fn delete_zettel(&self, zid: Zid) -> Result<(), BoxError> {
        self.shared.check_started()?;
        for managed in &self.shared.boxes {
            match managed.delete_zettel(zid) {
                Ok(()) => {
                    tracing::debug!(zid = %zid, "zettel deleted");
                    // An overlay copy may become visible.
                    self.shared.index_now(zid);
                    return Ok(());
                }
                Err(err) if err.is_not_found() || err.is_read_only() => continue,
                Err(err) => return Err(err),
            }
        }
        Err(BoxError::ZettelNotFound(zid))
    }

    /// Re-reads every box that supports it and rebuilds the index.
    pub fn refresh(&self) -> Result<(), BoxError> {
        self.shared.check_started()?;
        self.shared.send_info(UpdateReason::Reload, Zid::INVALID);
        for managed in &self.shared.boxes {
            if let Some(refresher) = managed.refresher() {
                refresher.refresh()?;
            }
        }
        Ok(())
    }

    pub fn reindex(&self, zid: Zid) -> Result<(), BoxError> {
        self.shared.check_started()?;
        self.shared.send_info(UpdateReason::Zettel, zid);
        Ok(())
    }

    pub fn read_stats(&self) -> Stats {
        self.shared.read_stats()
    }

    pub fn dump_index(&self) -> String {
        self.shared.store.dump()
    }

    fn primary(&self) -> &dyn ManagedBox {
        self.shared.boxes[0].as_ref()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn startup(&self) -> MutexGuard<'_, Startup> {
        self.startup
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn index_stats(&self) -> MutexGuard<'_, IndexStats> {
        self.index_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> StartState {
        self.lifecycle().state
    }

    fn set_state(&self, state: StartState) {
        self.lifecycle().state = state;
    }

    fn is_started(&self) -> bool {
        self.state() == StartState::Started
    }

    fn check_started(&self) -> Result<(), BoxError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(BoxError::Stopped)
        }
    }

    fn stop_boxes(&self, from: usize) {
        for managed in &self.boxes[from..] {
            if let Some(stopper) = managed.start_stopper() {
                stopper.stop();
            }
        }
    }

    fn send_info(&self, reason: UpdateReason, zid: Zid) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        // The receiver lives in `self`, so sending cannot fail.
        let _ = self.infos_tx.send(UpdateInfo {
            box_number: 0,
            reason,
            zid,
        });
    }

    fn is_index_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
            && self.startup().deferred.is_empty()
            && self.anteroom.is_empty()
            && !self.indexing.load(Ordering::SeqCst)
    }

    pub(crate) fn box_locations(&self) -> Vec<String> {
        self.boxes.iter().map(|managed| managed.location()).collect()
    }

    pub(crate) fn store(&self) -> &MemStore {
        &self.store
    }

    /// Adds everything computed on read: stored-like defaults, `published`
    /// and the reference properties from the index.
    fn enrich_meta(&self, meta: &mut Meta, box_number: usize) {
        enrich::enrich_stored(meta, box_number);
        enrich::compute_published(meta);
        self.store.enrich(meta);
    }

    fn has_zettel_raw(&self, zid: Zid) -> bool {
        self.boxes.iter().any(|managed| managed.has_zettel(zid))
    }

    fn fetch_zids_raw(&self) -> Result<ZidSet, BoxError> {
        let mut result = ZidSet::new();
        for managed in &self.boxes {
            managed.apply_zid(
                &mut |zid: Zid| {
                    result.add(zid);
                },
                &|_| true,
            )?;
        }
        Ok(result)
    }

    pub(crate) fn read_stats(&self) -> Stats {
        let mut read_only = true;
        let mut zettel_total = 0;
        for managed in &self.boxes {
            let stats = managed.read_stats();
            read_only &= stats.read_only;
            zettel_total += stats.zettel;
        }
        let store = self.store.read_stats();
        let index = self.index_stats();
        Stats {
            read_only,
            num_managed_boxes: self.boxes.len(),
            zettel_total,
            last_reload: index.last_reload.map(|ts| {
                values::format_timestamp(time::PrimitiveDateTime::new(ts.date(), ts.time()))
            }),
            indexes_since_reload: index.since_reload,
            dur_last_reload_ms: u64::try_from(index.dur_reload.as_millis()).unwrap_or(u64::MAX),
            zettel_indexed: store.zettel,
            index_updates: store.updates,
            indexed_words: store.words,
            indexed_urls: store.urls,
        }
    }
}

fn clean_for_store(zettel: &mut Zettel) {
    zettel.meta.remove_properties();
    zettel.content.trim_space();
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        let name = worker.thread().name().unwrap_or("worker").to_string();
        if worker.join().is_err() {
            tracing::error!(worker = %name, "background worker ended with a panic");
        }
    }
}

fn poll_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Spawns a named thread running `body`, restarting it after a panic.
/// `body` returns once the worker should end.
fn spawn_worker(
    name: &'static str,
    mut body: impl FnMut() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("zs-{}", name))
        .spawn(move || loop {
            match panic::catch_unwind(AssertUnwindSafe(&mut body)) {
                Ok(()) => return,
                Err(payload) => {
                    tracing::error!(
                        worker = name,
                        panic = %panic_message(payload.as_ref()),
                        "background worker panicked, restarting"
                    );
                    thread::sleep(RESTART_DELAY);
                }
            }
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
