use std::collections::HashMap;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;

use super::{spawn_worker, Shared, StartState};
use crate::boxes::{UpdateInfo, UpdateReason};
use crate::id::Zid;

const DESTUTTER_WINDOW: Duration = Duration::from_millis(500);
const DESTUTTER_FLUSH: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub(super) struct Destutter {
    seen: HashMap<(UpdateReason, Zid), Instant>,
    last_event: Option<Instant>,
}

impl Destutter {
    pub(super) fn accept(&mut self, info: &UpdateInfo, now: Instant) -> bool {
        if info.reason == UpdateReason::Ready {
            return true;
        }
        if self
            .last_event
            .is_some_and(|last| now.duration_since(last) > DESTUTTER_FLUSH)
        {
            self.seen.clear();
        }
        self.last_event = Some(now);
        let key = (info.reason, info.zid);
        if let Some(at) = self.seen.get(&key) {
            if now.duration_since(*at) < DESTUTTER_WINDOW {
                return false;
            }
        }
        self.seen.insert(key, now);
        true
    }
}

pub(super) fn spawn(shared: Arc<Shared>, done: Receiver<()>) -> io::Result<JoinHandle<()>> {
    let infos = shared.infos_rx.clone();
    spawn_worker("notifier", move || notify_loop(&shared, &infos, &done))
}

struct Handled<'a>(&'a AtomicUsize);

impl Drop for Handled<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn notify_loop(shared: &Shared, infos: &Receiver<UpdateInfo>, done: &Receiver<()>) {
    let mut destutter = Destutter::default();
    loop {
        crossbeam::select! {
            recv(infos) -> info => match info {
                Ok(info) => {
                    let _handled = Handled(&shared.pending);
                    if destutter.accept(&info, Instant::now()) {
                        shared.handle_update(info);
                    } else {
                        tracing::trace!(zid = %info.zid, reason = info.reason.as_str(), "duplicate event dropped");
                    }
                }
                Err(_) => return,
            },
            recv(done) -> _ => return,
        }
    }
}

impl Shared {
    pub(super) fn handle_update(&self, info: UpdateInfo) {
        tracing::trace!(
            box_number = info.box_number,
            reason = info.reason.as_str(),
            zid = %info.zid,
            "box event"
        );
        if info.reason == UpdateReason::Ready {
            self.mark_ready(info.box_number);
            return;
        }
        {
            let mut startup = self.startup();
            if self.state() == StartState::Starting {
                startup.deferred.push(info);
                return;
            }
        }
        self.route(info);
        self.notify_observers(info);
    }

    pub(super) fn mark_ready(&self, box_number: usize) {
        let deferred = {
            let mut startup = self.startup();
            if let Some(ready) = box_number
                .checked_sub(1)
                .and_then(|pos| startup.ready.get_mut(pos))
            {
                *ready = true;
            }
            if !startup.ready.iter().all(|ready| *ready) {
                return;
            }
            {
                let mut lifecycle = self.lifecycle();
                if lifecycle.state != StartState::Starting {
                    return;
                }
                lifecycle.state = StartState::Started;
            }
            mem::take(&mut startup.deferred)
        };
        tracing::info!(deferred = deferred.len(), "box manager started");
        self.notify_observers(UpdateInfo {
            box_number: 0,
            reason: UpdateReason::Ready,
            zid: Zid::INVALID,
        });
        for info in deferred {
            self.route(info);
            self.notify_observers(info);
        }
    }

    fn route(&self, info: UpdateInfo) {
        match info.reason {
            UpdateReason::Ready => return,
            UpdateReason::Reload => self.anteroom.reset(),
            UpdateReason::Zettel | UpdateReason::Delete => self.anteroom.enqueue(info.zid),
        }
        self.signal_indexer();
    }

    pub(super) fn signal_indexer(&self) {
        // A pending signal is as good as a new one.
        let _ = self.idx_ready_tx.try_send(());
    }

    fn notify_observers(&self, info: UpdateInfo) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in observers {
            observer(info);
        }
    }
}
