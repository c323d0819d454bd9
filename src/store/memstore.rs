use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, RwLock};

use super::{StoreStats, ZettelIndex};
use crate::boxes::BoxError;
use crate::id::{Digraph, Zid, ZidSet, ZidSlice};
use crate::meta::keys::{self, MetaType};
use crate::meta::{values, Meta};

const STORED_PROPERTIES: [&str; 3] = [
    keys::KEY_PUBLISHED,
    keys::KEY_BOX_NUMBER,
    keys::KEY_CREATED_MISSING,
];

const INTERNED_KEYS: [&str; 5] = [
    keys::KEY_ROLE,
    keys::KEY_SYNTAX,
    keys::KEY_FOLGE_ROLE,
    keys::KEY_LANG,
    keys::KEY_READ_ONLY,
];

#[derive(Debug, Default, Clone)]
struct MetaRefs {
    forward: ZidSlice,
    backward: ZidSlice,
}

impl MetaRefs {
    fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }
}

#[derive(Debug, Default)]
struct ZettelData {
    meta: Option<Meta>,
    dead: ZidSlice,
    forward: ZidSlice,
    backward: ZidSlice,
    other_refs: BTreeMap<String, MetaRefs>,
    words: Vec<String>,
    urls: Vec<String>,
}

impl ZettelData {
    fn is_unused_placeholder(&self) -> bool {
        self.meta.is_none()
            && self.dead.is_empty()
            && self.forward.is_empty()
            && self.backward.is_empty()
            && self.other_refs.values().all(MetaRefs::is_empty)
    }
}

#[derive(Debug, Default)]
struct StoreData {
    idx: BTreeMap<Zid, ZettelData>,
    dead: BTreeMap<Zid, ZidSlice>,
    words: BTreeMap<String, ZidSlice>,
    urls: BTreeMap<String, ZidSlice>,
    interned: HashSet<Arc<str>>,
}

#[derive(Debug, Default)]
pub struct MemStore {
    data: RwLock<StoreData>,
    updates: Mutex<u64>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_references(&self, zidx: ZettelIndex) -> ZidSet {
        let mut data = write_lock(&self.data);
        let zid = zidx.zid;
        let mut to_check = ZidSet::new();

        if let Some(refs) = data.dead.remove(&zid) {
            // Zettel that referenced this zid while it was missing.
            to_check.extend(refs.iter());
        }

        let meta = data.make_meta(zidx.meta());
        let mut zi = data.idx.remove(&zid).unwrap_or_default();
        zi.meta = Some(meta);

        data.update_dead_references(zid, &zidx, &mut zi);
        to_check.union_with(&data.update_forward_backward(zid, &zidx, &mut zi));
        data.update_meta_references(zid, &zidx, &mut zi);
        zi.words = update_strings(&mut data.words, zid, &zi.words, zidx.words());
        zi.urls = update_strings(&mut data.urls, zid, &zi.urls, zidx.urls());

        data.idx.insert(zid, zi);
        to_check
    }

    pub fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> ZidSet {
        let mut data = write_lock(&self.data);
        let has_cur = data.idx.get(&cur_zid).is_some_and(|zi| zi.meta.is_some());
        let has_new = data.idx.get(&new_zid).is_some_and(|zi| zi.meta.is_some());
        if !has_cur || has_new {
            return ZidSet::new();
        }
        let Some(cur) = data.idx.get(&cur_zid) else {
            return ZidSet::new();
        };
        let mut meta = cur.meta.clone().unwrap_or_else(|| Meta::new(cur_zid));
        meta.zid = new_zid;
        let dead = cur.dead.clone();
        let forward = cur.forward.clone();
        let words = cur.words.clone();
        let urls = cur.urls.clone();

        for target in dead.iter() {
            data.dead.entry(target).or_default().add(new_zid);
        }
        for target in forward.iter() {
            data.idx.entry(target).or_default().backward.add(new_zid);
        }
        for word in &words {
            data.words.entry(word.clone()).or_default().add(new_zid);
        }
        for url in &urls {
            data.urls.entry(url.clone()).or_default().add(new_zid);
        }
        let previous = data.idx.remove(&new_zid);
        let new_data = ZettelData {
            meta: Some(meta),
            dead,
            forward,
            backward: previous.map(|zi| zi.backward).unwrap_or_default(),
            other_refs: BTreeMap::new(),
            words,
            urls,
        };
        data.idx.insert(new_zid, new_data);

        let mut to_check = data.delete_zettel(cur_zid);
        if let Some(refs) = data.dead.remove(&new_zid) {
            to_check.extend(refs.iter());
        }
        // The renamed zettel must rebuild its metadata references.
        to_check.add(new_zid);
        to_check
    }

    pub fn delete_zettel(&self, zid: Zid) -> ZidSet {
        write_lock(&self.data).delete_zettel(zid)
    }

    pub fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        let data = read_lock(&self.data);
        data.idx
            .get(&zid)
            .and_then(|zi| zi.meta.clone())
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    pub fn has_zettel(&self, zid: Zid) -> bool {
        read_lock(&self.data)
            .idx
            .get(&zid)
            .is_some_and(|zi| zi.meta.is_some())
    }

    pub fn zids(&self) -> ZidSet {
        read_lock(&self.data)
            .idx
            .iter()
            .filter(|(_, zi)| zi.meta.is_some())
            .map(|(zid, _)| *zid)
            .collect()
    }

    pub fn enrich(&self, meta: &mut Meta) -> bool {
        for key in reference_property_keys() {
            meta.delete(key);
        }
        let updated = {
            let data = read_lock(&self.data);
            match data.idx.get(&meta.zid) {
                Some(zi) => enrich_meta(meta, zi),
                None => false,
            }
        };
        if updated {
            *lock(&self.updates) += 1;
        }
        updated
    }

    pub fn search_equal(&self, word: &str) -> ZidSet {
        let data = read_lock(&self.data);
        let mut result = ZidSet::new();
        if let Some(refs) = data.words.get(word) {
            result.extend(refs.iter());
        }
        if let Some(refs) = data.urls.get(word) {
            result.extend(refs.iter());
        }
        if let Ok(zid) = Zid::parse(word) {
            if let Some(zi) = data.idx.get(&zid) {
                add_backward_zids(&mut result, zid, zi);
            }
        }
        result
    }

    pub fn search_prefix(&self, prefix: &str) -> ZidSet {
        let data = read_lock(&self.data);
        let mut result = data.select_with(|s| s.starts_with(prefix));
        let len = prefix.len();
        if len > 14 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return result;
        }
        let Ok(max_zid) = Zid::parse(&format!("{}{}", prefix, &"99999999999999"[len..])) else {
            return result;
        };
        let min_zid = match Zid::parse(&format!("{}{}", prefix, &"00000000000000"[len..])) {
            Ok(zid) => zid,
            Err(_) => Zid::from_u64(1).unwrap_or(Zid::INVALID),
        };
        for (zid, zi) in data.idx.range(min_zid..=max_zid) {
            add_backward_zids(&mut result, *zid, zi);
        }
        result
    }

    pub fn search_suffix(&self, suffix: &str) -> ZidSet {
        let data = read_lock(&self.data);
        let mut result = data.select_with(|s| s.ends_with(suffix));
        let len = suffix.len();
        if len == 0 || len > 14 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return result;
        }
        let Ok(value) = suffix.parse::<u64>() else {
            return result;
        };
        let modulo = 10u64.pow(len as u32);
        for (zid, zi) in &data.idx {
            if zid.as_u64() % modulo == value {
                add_backward_zids(&mut result, *zid, zi);
            }
        }
        result
    }

    pub fn search_contains(&self, part: &str) -> ZidSet {
        let data = read_lock(&self.data);
        let mut result = data.select_with(|s| s.contains(part));
        if part.is_empty() || part.len() > 14 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return result;
        }
        for (zid, zi) in &data.idx {
            if zid.to_string().contains(part) {
                add_backward_zids(&mut result, *zid, zi);
            }
        }
        result
    }

    pub fn reference_graph(&self, key: Option<&str>) -> Digraph {
        let data = read_lock(&self.data);
        let mut graph = Digraph::new();
        for (zid, zi) in &data.idx {
            if zi.meta.is_none() {
                continue;
            }
            graph.add_vertex(*zid);
            let targets = match key {
                None => Some(&zi.forward),
                Some(key) => zi.other_refs.get(key).map(|refs| &refs.forward),
            };
            for target in targets.into_iter().flat_map(ZidSlice::iter) {
                graph.add_edge(*zid, target);
            }
        }
        graph
    }

    pub fn neighbour_graph(&self) -> Digraph {
        let data = read_lock(&self.data);
        let mut graph = Digraph::new();
        let indexed = |zid: &Zid| data.idx.get(zid).is_some_and(|zi| zi.meta.is_some());
        for (zid, zi) in data.idx.iter().filter(|(_, zi)| zi.meta.is_some()) {
            graph.add_vertex(*zid);
            let linked = zi
                .forward
                .iter()
                .chain(zi.backward.iter())
                .chain(zi.other_refs.values().flat_map(|refs| {
                    refs.forward.iter().chain(refs.backward.iter())
                }));
            for other in linked.filter(indexed) {
                graph.add_edge(*zid, other);
                graph.add_edge(other, *zid);
            }
        }
        graph
    }

    pub fn dead_references(&self) -> Vec<(Zid, ZidSlice)> {
        read_lock(&self.data)
            .dead
            .iter()
            .map(|(zid, refs)| (*zid, refs.clone()))
            .collect()
    }

    pub fn read_stats(&self) -> StoreStats {
        let data = read_lock(&self.data);
        StoreStats {
            zettel: data.idx.values().filter(|zi| zi.meta.is_some()).count(),
            updates: *lock(&self.updates),
            words: data.words.len(),
            urls: data.urls.len(),
        }
    }

    pub fn dump(&self) -> String {
        let data = read_lock(&self.data);
        let mut out = String::new();
        let _ = writeln!(out, "=== Dump");
        let _ = writeln!(out, "==== Zettel Index");
        for (zid, zi) in &data.idx {
            let _ = writeln!(out, "===== {}", zid);
            if zi.meta.is_none() {
                let _ = writeln!(out, "* Placeholder");
            }
            dump_slice(&mut out, "* Dead:", &zi.dead);
            dump_slice(&mut out, "* Forward:", &zi.forward);
            dump_slice(&mut out, "* Backward:", &zi.backward);
            for (key, refs) in &zi.other_refs {
                let _ = writeln!(out, "* Meta {}", key);
                dump_slice(&mut out, "** Forward:", &refs.forward);
                dump_slice(&mut out, "** Backward:", &refs.backward);
            }
            dump_strings(&mut out, "* Words", "", "", &zi.words);
            dump_strings(&mut out, "* URLs", "[[", "]]", &zi.urls);
        }
        if !data.dead.is_empty() {
            let _ = writeln!(out, "==== Dead References");
            for (zid, refs) in &data.dead {
                let _ = writeln!(out, "; {}", zid);
                let _ = writeln!(out, ": {}", refs);
            }
        }
        dump_string_refs(&mut out, "Words", "", "", &data.words);
        dump_string_refs(&mut out, "URLs", "[[", "]]", &data.urls);
        out
    }
}

impl StoreData {
    fn make_meta(&mut self, meta: &Meta) -> Meta {
        let mut result = Meta::new(meta.zid);
        result.set_yaml_sep(meta.yaml_sep());
        for (key, value) in meta.shared_pairs() {
            if keys::is_property(key) && !STORED_PROPERTIES.contains(&key.as_ref()) {
                continue;
            }
            let key = self.intern(key);
            let value = if INTERNED_KEYS.contains(&key.as_ref()) || key.ends_with("-role") {
                self.intern(value)
            } else {
                Arc::clone(value)
            };
            result.set_shared(key, value);
        }
        result
    }

    fn intern(&mut self, s: &Arc<str>) -> Arc<str> {
        if let Some(existing) = self.interned.get(s) {
            return Arc::clone(existing);
        }
        self.interned.insert(Arc::clone(s));
        Arc::clone(s)
    }

    fn update_dead_references(&mut self, zid: Zid, zidx: &ZettelIndex, zi: &mut ZettelData) {
        let dead = zidx.dead_refs().to_slice();
        let (added, removed) = dead.diff(&zi.dead);
        for target in removed.iter() {
            remove_ref(&mut self.dead, target, zid);
        }
        for target in added.iter() {
            self.dead.entry(target).or_default().add(zid);
        }
        zi.dead = dead;
    }

    fn update_forward_backward(
        &mut self,
        zid: Zid,
        zidx: &ZettelIndex,
        zi: &mut ZettelData,
    ) -> ZidSet {
        let forward = zidx.back_refs().to_slice();
        let (added, removed) = forward.diff(&zi.forward);
        let mut to_check = ZidSet::new();
        for target in removed.iter() {
            if target == zid {
                zi.backward.remove(zid);
                continue;
            }
            if let Some(tzi) = self.idx.get_mut(&target) {
                tzi.backward.remove(zid);
            }
            self.drop_if_unused(target);
        }
        for target in added.iter() {
            if target == zid {
                zi.backward.add(zid);
                continue;
            }
            let tzi = self.idx.entry(target).or_default();
            if tzi.meta.is_none() {
                to_check.add(target);
            }
            tzi.backward.add(zid);
        }
        zi.forward = forward;
        to_check
    }

    fn update_meta_references(&mut self, zid: Zid, zidx: &ZettelIndex, zi: &mut ZettelData) {
        let mut wanted: BTreeMap<&str, ZidSlice> = zidx
            .inverse_refs()
            .iter()
            .map(|(key, refs)| (key.as_str(), refs.to_slice()))
            .collect();
        for key in zi.other_refs.keys() {
            wanted.entry(key.as_str()).or_default();
        }
        let wanted: Vec<(String, ZidSlice)> = wanted
            .into_iter()
            .map(|(key, refs)| (key.to_string(), refs))
            .collect();

        for (key, forward) in wanted {
            let old = zi
                .other_refs
                .get(&key)
                .map(|refs| refs.forward.clone())
                .unwrap_or_default();
            let (added, removed) = forward.diff(&old);
            for target in removed.iter() {
                if target == zid {
                    if let Some(refs) = zi.other_refs.get_mut(&key) {
                        refs.backward.remove(zid);
                    }
                    continue;
                }
                self.remove_inverse_ref(target, &key, zid);
            }
            for target in added.iter() {
                if target == zid {
                    zi.other_refs.entry(key.clone()).or_default().backward.add(zid);
                    continue;
                }
                self.idx
                    .entry(target)
                    .or_default()
                    .other_refs
                    .entry(key.clone())
                    .or_default()
                    .backward
                    .add(zid);
            }
            let refs = zi.other_refs.entry(key.clone()).or_default();
            refs.forward = forward;
            if refs.is_empty() {
                zi.other_refs.remove(&key);
            }
        }
    }

    fn remove_inverse_ref(&mut self, target: Zid, key: &str, zid: Zid) {
        if let Some(tzi) = self.idx.get_mut(&target) {
            if let Some(refs) = tzi.other_refs.get_mut(key) {
                refs.backward.remove(zid);
                if refs.is_empty() {
                    tzi.other_refs.remove(key);
                }
            }
        }
        self.drop_if_unused(target);
    }

    fn drop_if_unused(&mut self, zid: Zid) {
        if self.idx.get(&zid).is_some_and(ZettelData::is_unused_placeholder) {
            self.idx.remove(&zid);
        }
    }

    fn delete_zettel(&mut self, zid: Zid) -> ZidSet {
        let Some(zi) = self.idx.remove(&zid) else {
            return ZidSet::new();
        };
        let mut to_check = ZidSet::new();
        for target in zi.dead.iter() {
            remove_ref(&mut self.dead, target, zid);
        }
        for target in zi.forward.iter() {
            if let Some(tzi) = self.idx.get_mut(&target) {
                tzi.backward.remove(zid);
            }
            self.drop_if_unused(target);
        }
        for source in zi.backward.iter() {
            if let Some(szi) = self.idx.get_mut(&source) {
                szi.forward.remove(zid);
                to_check.add(source);
            }
        }
        for (key, refs) in &zi.other_refs {
            for target in refs.forward.iter() {
                self.remove_inverse_ref(target, key, zid);
            }
            for source in refs.backward.iter() {
                if let Some(szi) = self.idx.get_mut(&source) {
                    if let Some(srefs) = szi.other_refs.get_mut(key) {
                        srefs.forward.remove(zid);
                        if srefs.is_empty() {
                            szi.other_refs.remove(key);
                        }
                    }
                    to_check.add(source);
                }
            }
        }
        delete_strings(&mut self.words, &zi.words, zid);
        delete_strings(&mut self.urls, &zi.urls, zid);
        to_check.remove(zid);
        to_check
    }

    fn select_with(&self, pred: impl Fn(&str) -> bool) -> ZidSet {
        let mut result = ZidSet::new();
        for (word, refs) in self.words.iter().chain(self.urls.iter()) {
            if pred(word) {
                result.extend(refs.iter());
            }
        }
        result
    }
}

fn reference_property_keys() -> impl Iterator<Item = &'static str> {
    [
        keys::KEY_BACK,
        keys::KEY_BACKWARD,
        keys::KEY_DEAD,
        keys::KEY_FORWARD,
    ]
    .into_iter()
    .chain(
        keys::registered_keys()
            .into_iter()
            .filter_map(|descriptor| descriptor.inverse),
    )
}

fn enrich_meta(meta: &mut Meta, zi: &ZettelData) -> bool {
    let mut updated = false;
    if !zi.dead.is_empty() {
        meta.set(keys::KEY_DEAD, &zi.dead.to_string());
        updated = true;
    }
    let mut back = zi.backward.clone();
    if !zi.backward.is_empty() {
        meta.set(keys::KEY_BACKWARD, &zi.backward.to_string());
        updated = true;
    }
    if !zi.forward.is_empty() {
        meta.set(keys::KEY_FORWARD, &zi.forward.to_string());
        back.remove_all(&zi.forward);
        updated = true;
    }
    for (key, refs) in &zi.other_refs {
        if refs.backward.is_empty() {
            continue;
        }
        meta.set(key, &refs.backward.to_string());
        back.remove_all(&refs.backward);
        updated = true;
    }
    remove_own_meta_refs(meta, &mut back);
    if !back.is_empty() {
        meta.set(keys::KEY_BACK, &back.to_string());
        updated = true;
    }
    updated
}

fn remove_own_meta_refs(meta: &Meta, back: &mut ZidSlice) {
    for (key, value) in meta.pairs_rest() {
        match keys::key_type(key) {
            MetaType::Id | MetaType::IdSet => {
                for item in values::list_from_value(value) {
                    if let Ok(zid) = Zid::parse(item) {
                        back.remove(zid);
                    }
                }
            }
            _ => {}
        }
    }
}

fn add_backward_zids(result: &mut ZidSet, zid: Zid, zi: &ZettelData) {
    result.add(zid);
    result.extend(zi.backward.iter());
    for refs in zi.other_refs.values() {
        result.extend(refs.backward.iter());
    }
}

fn remove_ref(map: &mut BTreeMap<Zid, ZidSlice>, key: Zid, zid: Zid) {
    if let Some(refs) = map.get_mut(&key) {
        refs.remove(zid);
        if refs.is_empty() {
            map.remove(&key);
        }
    }
}

fn update_strings(
    refs: &mut BTreeMap<String, ZidSlice>,
    zid: Zid,
    previous: &[String],
    next: &BTreeSet<String>,
) -> Vec<String> {
    let previous: BTreeSet<&String> = previous.iter().collect();
    for word in next.iter().filter(|word| !previous.contains(word)) {
        refs.entry(word.clone()).or_default().add(zid);
    }
    for word in previous.iter().filter(|word| !next.contains(word.as_str())) {
        if let Some(zids) = refs.get_mut(word.as_str()) {
            zids.remove(zid);
            if zids.is_empty() {
                refs.remove(word.as_str());
            }
        }
    }
    next.iter().cloned().collect()
}

fn delete_strings(refs: &mut BTreeMap<String, ZidSlice>, words: &[String], zid: Zid) {
    for word in words {
        if let Some(zids) = refs.get_mut(word) {
            zids.remove(zid);
            if zids.is_empty() {
                refs.remove(word);
            }
        }
    }
}

fn dump_slice(out: &mut String, label: &str, zids: &ZidSlice) {
    if !zids.is_empty() {
        let _ = writeln!(out, "{} {}", label, zids);
    }
}

fn dump_strings(out: &mut String, label: &str, pre: &str, post: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", label);
    for item in items {
        let _ = writeln!(out, "** {}{}{}", pre, item, post);
    }
}

fn dump_string_refs(
    out: &mut String,
    title: &str,
    pre: &str,
    post: &str,
    refs: &BTreeMap<String, ZidSlice>,
) {
    if refs.is_empty() {
        return;
    }
    let _ = writeln!(out, "==== {}", title);
    for (item, zids) in refs {
        let _ = writeln!(out, "; {}{}{}", pre, item, post);
        let _ = writeln!(out, ": {}", zids);
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "memstore_tests.rs"]
mod tests;
