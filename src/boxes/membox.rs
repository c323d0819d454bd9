use std::collections::BTreeMap;
use std::sync::RwLock;

use url::Url;

use super::registry::{query_flag, query_number, ConnectData, OPTION_READ_ONLY};
use super::{
    new_zid, BoxError, ManagedBox, ManagedBoxStats, Notifier, StartStopper, UpdateReason,
};
use crate::content::Zettel;
use crate::id::Zid;
use crate::meta::Meta;

pub const OPTION_MAX_ZETTEL: &str = "max-zettel";
pub const OPTION_MAX_BYTES: &str = "max-bytes";

pub fn connect(url: &Url, data: &ConnectData) -> Result<Box<dyn ManagedBox>, BoxError> {
    let max_zettel = query_number(url, OPTION_MAX_ZETTEL)?.unwrap_or(0);
    let max_bytes = query_number(url, OPTION_MAX_BYTES)?.unwrap_or(0);
    Ok(Box::new(MemBox {
        location: url.to_string(),
        notifier: data.notifier(),
        max_zettel: if max_zettel == 0 { usize::MAX } else { max_zettel },
        max_bytes: if max_bytes == 0 { usize::MAX } else { max_bytes },
        read_only: query_flag(url, OPTION_READ_ONLY),
        data: RwLock::new(MemData::default()),
    }))
}

#[derive(Debug, Default)]
struct MemData {
    zettel: BTreeMap<Zid, Zettel>,
    cur_bytes: usize,
}

#[derive(Debug)]
pub struct MemBox {
    location: String,
    notifier: Notifier,
    max_zettel: usize,
    max_bytes: usize,
    read_only: bool,
    data: RwLock<MemData>,
}

impl MemBox {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemData> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemData> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ManagedBox for MemBox {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn can_create_zettel(&self) -> bool {
        !self.read_only && self.read().zettel.len() < self.max_zettel
    }

    fn create_zettel(&self, mut zettel: Zettel) -> Result<Zid, BoxError> {
        if self.read_only {
            return Err(BoxError::ReadOnly);
        }
        let zid = {
            let mut data = self.write();
            let new_bytes = data.cur_bytes.saturating_add(zettel.len());
            if data.zettel.len() >= self.max_zettel || new_bytes > self.max_bytes {
                return Err(BoxError::Capacity);
            }
            let zid = new_zid(|zid| Ok(!data.zettel.contains_key(&zid)))?;
            zettel.meta.zid = zid;
            data.zettel.insert(zid, zettel);
            data.cur_bytes = new_bytes;
            zid
        };
        self.notifier.notify(UpdateReason::Zettel, zid);
        Ok(zid)
    }

    fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError> {
        self.read()
            .zettel
            .get(&zid)
            .cloned()
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        self.read()
            .zettel
            .get(&zid)
            .map(|zettel| zettel.meta.clone())
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn has_zettel(&self, zid: Zid) -> bool {
        self.read().zettel.contains_key(&zid)
    }

    fn apply_zid(
        &self,
        handle: &mut dyn FnMut(Zid),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        let zids: Vec<Zid> = self.read().zettel.keys().copied().collect();
        for zid in zids.into_iter().filter(|zid| constraint(*zid)) {
            handle(zid);
        }
        Ok(())
    }

    fn apply_meta(
        &self,
        handle: &mut dyn FnMut(Meta),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        let metas: Vec<Meta> = self
            .read()
            .zettel
            .values()
            .filter(|zettel| constraint(zettel.meta.zid))
            .map(|zettel| zettel.meta.clone())
            .collect();
        for meta in metas {
            handle(meta);
        }
        Ok(())
    }

    fn can_update_zettel(&self, zettel: &Zettel) -> bool {
        if self.read_only {
            return false;
        }
        let data = self.read();
        let previous = data.zettel.get(&zettel.meta.zid);
        if previous.is_none() && data.zettel.len() >= self.max_zettel {
            return false;
        }
        let new_bytes = data.cur_bytes - previous.map_or(0, Zettel::len) + zettel.len();
        new_bytes <= self.max_bytes
    }

    fn update_zettel(&self, zettel: Zettel) -> Result<(), BoxError> {
        if self.read_only {
            return Err(BoxError::ReadOnly);
        }
        let zid = zettel.meta.zid;
        if !zid.is_valid() {
            return Err(BoxError::InvalidZid(zid.to_string()));
        }
        {
            let mut data = self.write();
            let previous = data.zettel.get(&zid).map(Zettel::len);
            if previous.is_none() && data.zettel.len() >= self.max_zettel {
                return Err(BoxError::Capacity);
            }
            let new_bytes = data.cur_bytes - previous.unwrap_or(0) + zettel.len();
            if new_bytes > self.max_bytes {
                return Err(BoxError::Capacity);
            }
            data.zettel.insert(zid, zettel);
            data.cur_bytes = new_bytes;
        }
        self.notifier.notify(UpdateReason::Zettel, zid);
        Ok(())
    }

    fn allow_rename_zettel(&self, _zid: Zid) -> bool {
        !self.read_only
    }

    fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> Result<(), BoxError> {
        {
            let mut data = self.write();
            if self.read_only {
                return if data.zettel.contains_key(&cur_zid) {
                    Err(BoxError::ReadOnly)
                } else {
                    Ok(())
                };
            }
            if data.zettel.contains_key(&new_zid) {
                return Err(BoxError::InvalidZid(new_zid.to_string()));
            }
            let Some(mut zettel) = data.zettel.remove(&cur_zid) else {
                return Err(BoxError::ZettelNotFound(cur_zid));
            };
            zettel.meta.zid = new_zid;
            data.zettel.insert(new_zid, zettel);
        }
        self.notifier.notify(UpdateReason::Delete, cur_zid);
        self.notifier.notify(UpdateReason::Zettel, new_zid);
        Ok(())
    }

    fn can_delete_zettel(&self, zid: Zid) -> bool {
        !self.read_only && self.has_zettel(zid)
    }

    fn delete_zettel(&self, zid: Zid) -> Result<(), BoxError> {
        if self.read_only {
            return Err(BoxError::ReadOnly);
        }
        {
            let mut data = self.write();
            let Some(zettel) = data.zettel.remove(&zid) else {
                return Err(BoxError::ZettelNotFound(zid));
            };
            data.cur_bytes -= zettel.len();
        }
        self.notifier.notify(UpdateReason::Delete, zid);
        Ok(())
    }

    fn read_stats(&self) -> ManagedBoxStats {
        ManagedBoxStats {
            read_only: self.read_only,
            zettel: self.read().zettel.len(),
        }
    }

    fn start_stopper(&self) -> Option<&dyn StartStopper> {
        Some(self)
    }
}

impl StartStopper for MemBox {
    fn start(&self) -> Result<(), BoxError> {
        *self.write() = MemData::default();
        tracing::debug!(
            box_number = self.notifier.box_number(),
            max_zettel = self.max_zettel,
            max_bytes = self.max_bytes,
            "start mem box"
        );
        self.notifier.notify(UpdateReason::Ready, Zid::INVALID);
        Ok(())
    }

    fn stop(&self) {
        *self.write() = MemData::default();
    }
}

#[cfg(test)]
#[path = "membox_tests.rs"]
mod tests;
