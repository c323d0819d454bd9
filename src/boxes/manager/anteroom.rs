use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use crate::id::{Zid, ZidSet};

pub const DEFAULT_MAX_LOAD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnteroomAction {
    Nothing,
    Reload,
    Zettel,
}

#[derive(Debug)]
struct Room {
    number: u64,
    /// `None` for a room asking for a full reload.
    waiting: Option<BTreeSet<Zid>>,
    reload: bool,
}

#[derive(Debug, Default)]
struct Rooms {
    queue: VecDeque<Room>,
    next_number: u64,
}

impl Rooms {
    fn new_room(&mut self, waiting: Option<BTreeSet<Zid>>, reload: bool) -> Room {
        self.next_number += 1;
        Room {
            number: self.next_number,
            waiting,
            reload,
        }
    }
}

/// Queue of zettel waiting to be indexed.
///
/// Zettel are grouped into rooms of bounded size. Reload rooms jump ahead
/// of ordinary ones.
#[derive(Debug)]
pub struct Anteroom {
    rooms: Mutex<Rooms>,
    max_load: usize,
}

impl Anteroom {
    pub fn new(max_load: usize) -> Self {
        Self {
            rooms: Mutex::new(Rooms::default()),
            max_load: if max_load == 0 {
                DEFAULT_MAX_LOAD
            } else {
                max_load
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Rooms> {
        self.rooms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a zid unless it already waits in an ordinary room.
    pub fn enqueue(&self, zid: Zid) {
        if !zid.is_valid() {
            return;
        }
        let mut rooms = self.lock();
        let waiting = rooms
            .queue
            .iter()
            .filter(|room| !room.reload)
            .any(|room| room.waiting.as_ref().is_some_and(|set| set.contains(&zid)));
        if waiting {
            return;
        }
        if let Some(last) = rooms.queue.back_mut() {
            if !last.reload {
                if let Some(set) = last.waiting.as_mut() {
                    if set.len() < self.max_load {
                        set.insert(zid);
                        return;
                    }
                }
            }
        }
        let room = rooms.new_room(Some(BTreeSet::from([zid])), false);
        rooms.queue.push_back(room);
    }

    /// Drops everything queued and asks for a full reload.
    pub fn reset(&self) {
        let mut rooms = self.lock();
        rooms.queue.clear();
        let room = rooms.new_room(None, true);
        rooms.queue.push_back(room);
    }

    /// Replaces leading reload rooms with one holding `zids`. Returns the
    /// number of that room.
    pub fn reload(&self, zids: &ZidSet) -> u64 {
        let mut rooms = self.lock();
        while rooms.queue.front().is_some_and(|room| room.reload) {
            rooms.queue.pop_front();
        }
        let room = rooms.new_room(Some(zids.iter().collect()), true);
        let number = room.number;
        if !zids.is_empty() {
            rooms.queue.push_front(room);
        }
        number
    }

    /// Takes the next unit of work together with the number of its room.
    pub fn dequeue(&self) -> (AnteroomAction, Zid, u64) {
        let mut rooms = self.lock();
        loop {
            let Some(first) = rooms.queue.front_mut() else {
                return (AnteroomAction::Nothing, Zid::INVALID, 0);
            };
            let number = first.number;
            let Some(waiting) = first.waiting.as_mut() else {
                rooms.queue.pop_front();
                return (AnteroomAction::Reload, Zid::INVALID, number);
            };
            let Some(zid) = waiting.pop_first() else {
                rooms.queue.pop_front();
                continue;
            };
            if waiting.is_empty() {
                rooms.queue.pop_front();
            }
            return (AnteroomAction::Zettel, zid, number);
        }
    }

    /// Number of zids waiting, not counting pending full reloads.
    pub fn len(&self) -> usize {
        self.lock()
            .queue
            .iter()
            .filter_map(|room| room.waiting.as_ref())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Anteroom, AnteroomAction};
    use crate::id::{Zid, ZidSet};

    fn zid(n: u64) -> Zid {
        Zid::from_u64(n).expect("zid should be valid")
    }

    #[test]
    fn enqueue_deduplicates_and_fills_rooms() {
        let ar = Anteroom::new(2);
        for n in [1, 2, 1, 3] {
            ar.enqueue(zid(n));
        }
        ar.enqueue(Zid::INVALID);
        assert_eq!(ar.len(), 3);
        let (_, _, first_room) = ar.dequeue();
        let (_, _, same_room) = ar.dequeue();
        let (action, last, next_room) = ar.dequeue();
        assert_eq!(first_room, same_room);
        assert_eq!(action, AnteroomAction::Zettel);
        assert_eq!(last, zid(3));
        assert!(next_room > first_room);
        assert_eq!(ar.dequeue().0, AnteroomAction::Nothing);
    }

    #[test]
    fn reset_drops_pending_zids() {
        let ar = Anteroom::new(0);
        ar.enqueue(zid(100));
        ar.reset();
        ar.enqueue(zid(200));
        let (action, reload_zid, reload_room) = ar.dequeue();
        assert_eq!(action, AnteroomAction::Reload);
        assert_eq!(reload_zid, Zid::INVALID);
        let (action, next, room) = ar.dequeue();
        assert_eq!(action, AnteroomAction::Zettel);
        assert_eq!(next, zid(200));
        assert!(room > reload_room);
        assert_eq!(ar.dequeue().0, AnteroomAction::Nothing);
    }

    #[test]
    fn reload_rooms_go_first() {
        let ar = Anteroom::new(10);
        ar.enqueue(zid(9));
        ar.reset();
        assert_eq!(ar.dequeue().0, AnteroomAction::Reload);
        ar.enqueue(zid(7));
        let all: ZidSet = [zid(1), zid(2)].into_iter().collect();
        let reload_room = ar.reload(&all);
        let order: Vec<(Zid, u64)> = (0..3).map(|_| ar.dequeue()).map(|(_, z, r)| (z, r)).collect();
        assert_eq!(order[0], (zid(1), reload_room));
        assert_eq!(order[1], (zid(2), reload_room));
        assert_eq!(order[2].0, zid(7));
        assert!(ar.is_empty());
    }

    #[test]
    fn zid_waiting_in_reload_room_may_still_be_queued() {
        let ar = Anteroom::new(10);
        let all: ZidSet = [zid(1)].into_iter().collect();
        ar.reload(&all);
        ar.enqueue(zid(1));
        assert_eq!(ar.len(), 2);
    }
}
