use std::collections::BTreeSet;
use std::fmt;

use super::Zid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZidSet(BTreeSet<Zid>);

impl ZidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, zid: Zid) -> bool {
        self.0.insert(zid)
    }

    pub fn remove(&mut self, zid: Zid) -> bool {
        self.0.remove(&zid)
    }

    pub fn contains(&self, zid: Zid) -> bool {
        self.0.contains(&zid)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Zid> + '_ {
        self.0.iter().copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn union_with(&mut self, other: &ZidSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn intersect_with(&mut self, other: &ZidSet) {
        self.0.retain(|zid| other.0.contains(zid));
    }

    pub fn subtract(&mut self, other: &ZidSet) {
        self.0.retain(|zid| !other.0.contains(zid));
    }

    pub fn to_slice(&self) -> ZidSlice {
        ZidSlice(self.0.iter().copied().collect())
    }
}

impl FromIterator<Zid> for ZidSet {
    fn from_iter<T: IntoIterator<Item = Zid>>(iter: T) -> Self {
        ZidSet(iter.into_iter().collect())
    }
}

impl Extend<Zid> for ZidSet {
    fn extend<T: IntoIterator<Item = Zid>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ZidSet {
    type Item = Zid;
    type IntoIter = std::collections::btree_set::IntoIter<Zid>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ZidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, self.0.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZidSlice(Vec<Zid>);

impl ZidSlice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_unsorted(mut zids: Vec<Zid>) -> Self {
        zids.sort_unstable();
        zids.dedup();
        ZidSlice(zids)
    }

    pub fn as_slice(&self) -> &[Zid] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, zid: Zid) -> bool {
        self.0.binary_search(&zid).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Zid> + '_ {
        self.0.iter().copied()
    }

    pub fn add(&mut self, zid: Zid) -> bool {
        match self.0.binary_search(&zid) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, zid);
                true
            }
        }
    }

    pub fn remove(&mut self, zid: Zid) -> bool {
        match self.0.binary_search(&zid) {
            Ok(pos) => {
                self.0.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn remove_all(&mut self, other: &ZidSlice) {
        if other.is_empty() {
            return;
        }
        self.0.retain(|zid| !other.contains(*zid));
    }

    pub fn diff(&self, old: &ZidSlice) -> (ZidSlice, ZidSlice) {
        let added = self.0.iter().copied().filter(|zid| !old.contains(*zid));
        let removed = old.0.iter().copied().filter(|zid| !self.contains(*zid));
        (ZidSlice(added.collect()), ZidSlice(removed.collect()))
    }

    pub fn to_set(&self) -> ZidSet {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Zid> for ZidSlice {
    fn from_iter<T: IntoIterator<Item = Zid>>(iter: T) -> Self {
        ZidSlice::from_unsorted(iter.into_iter().collect())
    }
}

impl fmt::Display for ZidSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, self.0.iter())
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    zids: impl Iterator<Item = &'a Zid>,
) -> fmt::Result {
    for (pos, zid) in zids.enumerate() {
        if pos > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", zid)?;
    }
    Ok(())
}
