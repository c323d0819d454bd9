use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{after, Receiver};
use time::OffsetDateTime;

use super::collect::{collect_from_meta, Collector};
use super::{enrich, spawn_worker, AnteroomAction, Shared};
use crate::ast::walk_all;
use crate::boxes::BoxError;
use crate::content::Zettel;
use crate::id::{Zid, ZidSet};
use crate::store::ZettelIndex;

const IDLE_WAIT: Duration = Duration::from_secs(15);

pub(super) fn spawn(shared: Arc<Shared>, done: Receiver<()>) -> io::Result<JoinHandle<()>> {
    spawn_worker("indexer", move || indexer_loop(&shared, &done))
}

#[derive(Debug, Default)]
struct ReloadTrack {
    room: u64,
    started: Option<Instant>,
}

fn indexer_loop(shared: &Shared, done: &Receiver<()>) {
    let mut track = ReloadTrack::default();
    loop {
        shared.indexing.store(true, Ordering::SeqCst);
        shared.drain_anteroom(&mut track);
        shared.indexing.store(false, Ordering::SeqCst);

        crossbeam::select! {
            recv(shared.idx_ready_rx) -> _ => {}
            recv(done) -> _ => return,
            recv(after(IDLE_WAIT)) -> _ => {}
        }
    }
}

impl Shared {
    fn drain_anteroom(&self, track: &mut ReloadTrack) {
        loop {
            let (action, zid, room) = self.anteroom.dequeue();
            match action {
                AnteroomAction::Nothing => return,
                AnteroomAction::Reload => self.reload_index(track),
                AnteroomAction::Zettel => {
                    {
                        let mut stats = self.index_stats();
                        stats.since_reload += 1;
                        if room == track.room {
                            if let Some(started) = track.started {
                                stats.dur_reload = started.elapsed();
                            }
                        }
                    }
                    self.index_now(zid);
                }
            }
        }
    }

    fn reload_index(&self, track: &mut ReloadTrack) {
        let zids = match self.fetch_zids_raw() {
            Ok(zids) => zids,
            Err(err) => {
                tracing::warn!(error = %err, "unable to list zettel for reload");
                return;
            }
        };
        let mut stale = self.store.zids();
        stale.subtract(&zids);
        for zid in stale.iter() {
            self.delete_from_index(zid);
        }
        track.room = self.anteroom.reload(&zids);
        track.started = Some(Instant::now());
        let mut stats = self.index_stats();
        stats.last_reload = Some(OffsetDateTime::now_utc());
        stats.since_reload = 0;
        stats.dur_reload = Duration::ZERO;
        tracing::info!(zettel = zids.len(), stale = stale.len(), "index reload");
    }

    pub(super) fn index_now(&self, zid: Zid) {
        match self.zettel_for_index(zid) {
            Ok(Some(zettel)) => self.update_zettel_index(&zettel),
            Ok(None) => self.delete_from_index(zid),
            Err(err) => tracing::warn!(zid = %zid, error = %err, "unable to read zettel for indexing"),
        }
    }

    fn zettel_for_index(&self, zid: Zid) -> Result<Option<Zettel>, BoxError> {
        for (pos, managed) in self.boxes.iter().enumerate() {
            match managed.get_zettel(zid) {
                Ok(mut zettel) => {
                    enrich::enrich_stored(&mut zettel.meta, pos + 1);
                    return Ok(Some(zettel));
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn update_zettel_index(&self, zettel: &Zettel) {
        let zid = zettel.meta.zid;
        let exists = |zid: Zid| self.has_zettel_raw(zid);
        let mut zidx = ZettelIndex::new(zettel.meta.clone());
        let mut collector = Collector::default();
        collect_from_meta(
            &zettel.meta,
            self.parser.as_ref(),
            &exists,
            &mut zidx,
            &mut collector,
        );
        let document = match self.parser.parse_zettel(zettel) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(zid = %zid, error = %err, "zettel content not indexed");
                self.delete_from_index(zid);
                return;
            }
        };
        walk_all(&mut collector, &document.blocks);
        for target in collector.refs.iter() {
            if exists(target) {
                zidx.add_back_ref(target);
            } else {
                zidx.add_dead_ref(target);
            }
        }
        zidx.set_words(collector.words);
        zidx.set_urls(collector.urls);
        let to_check = self.store.update_references(zidx);
        tracing::debug!(zid = %zid, affected = to_check.len(), "zettel indexed");
        self.enqueue_checks(&to_check);
    }

    fn delete_from_index(&self, zid: Zid) {
        let to_check = self.store.delete_zettel(zid);
        tracing::debug!(zid = %zid, affected = to_check.len(), "zettel removed from index");
        self.enqueue_checks(&to_check);
    }

    pub(super) fn enqueue_checks(&self, zids: &ZidSet) {
        for zid in zids.iter() {
            self.anteroom.enqueue(zid);
        }
        if !zids.is_empty() {
            self.signal_indexer();
        }
    }
}
