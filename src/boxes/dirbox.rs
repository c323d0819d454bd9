use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use percent_encoding::percent_decode_str;
use url::Url;

use super::registry::{query_flag, ConnectData, OPTION_READ_ONLY};
use super::{
    new_zid, BoxError, ManagedBox, ManagedBoxStats, Notifier, Refresher, StartStopper,
    UpdateReason,
};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::Meta;

const EXT_ZETTEL: &str = "zettel";
const EXT_META: &str = "meta";
const EXT_CONTENT: &str = "content";

pub fn connect(url: &Url, data: &ConnectData) -> Result<Box<dyn ManagedBox>, BoxError> {
    let path = percent_decode_str(url.path())
        .decode_utf8()
        .map_err(|err| BoxError::InvalidConfig(format!("directory box '{}': {}", url, err)))?;
    if path.is_empty() {
        return Err(BoxError::InvalidConfig(format!(
            "directory box '{}' needs a path",
            url
        )));
    }
    Ok(Box::new(DirBox::new(
        PathBuf::from(path.into_owned()),
        url.to_string(),
        data.notifier(),
        query_flag(url, OPTION_READ_ONLY),
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileLayout {
    Combined,
    Split,
}

#[derive(Debug)]
pub struct DirBox {
    dir: PathBuf,
    location: String,
    notifier: Notifier,
    read_only: bool,
    entries: RwLock<BTreeMap<Zid, FileLayout>>,
}

impl DirBox {
    pub fn new(dir: PathBuf, location: String, notifier: Notifier, read_only: bool) -> Self {
        Self {
            dir,
            location,
            notifier,
            read_only,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Zid, FileLayout>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entries_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<Zid, FileLayout>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn file(&self, zid: Zid, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", zid, ext))
    }

    fn layout(&self, zid: Zid) -> Result<FileLayout, BoxError> {
        self.entries()
            .get(&zid)
            .copied()
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn read_zettel(&self, zid: Zid, layout: FileLayout) -> Result<Zettel, BoxError> {
        match layout {
            FileLayout::Combined => {
                let data = fs::read(self.file(zid, EXT_ZETTEL))?;
                let (meta, start) = parse_header(zid, &data)?;
                Ok(Zettel::new(meta, Content::new(data[start..].to_vec())))
            }
            FileLayout::Split => {
                let meta = match read_optional(&self.file(zid, EXT_META))? {
                    Some(data) => parse_header(zid, &data)?.0,
                    None => Meta::new(zid),
                };
                let content = read_optional(&self.file(zid, EXT_CONTENT))?.unwrap_or_default();
                Ok(Zettel::new(meta, Content::new(content)))
            }
        }
    }

    fn write_zettel(&self, zettel: &Zettel) -> Result<FileLayout, BoxError> {
        let zid = zettel.meta.zid;
        if zettel.content.is_binary() {
            write_atomic(&self.file(zid, EXT_META), zettel.meta.write_header().as_bytes())?;
            write_atomic(&self.file(zid, EXT_CONTENT), zettel.content.as_bytes())?;
            remove_optional(&self.file(zid, EXT_ZETTEL))?;
            Ok(FileLayout::Split)
        } else {
            let data = zettel.meta.write_zettel(zettel.content.as_bytes());
            write_atomic(&self.file(zid, EXT_ZETTEL), &data)?;
            remove_optional(&self.file(zid, EXT_META))?;
            remove_optional(&self.file(zid, EXT_CONTENT))?;
            Ok(FileLayout::Combined)
        }
    }

    fn remove_files(&self, zid: Zid) -> Result<(), BoxError> {
        for ext in [EXT_ZETTEL, EXT_META, EXT_CONTENT] {
            remove_optional(&self.file(zid, ext))?;
        }
        Ok(())
    }

    fn rescan(&self) -> Result<usize, BoxError> {
        let scanned = scan_dir(&self.dir)?;
        let count = scanned.len();
        *self.entries_mut() = scanned;
        Ok(count)
    }
}

impl ManagedBox for DirBox {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn can_create_zettel(&self) -> bool {
        !self.read_only
    }

    fn create_zettel(&self, mut zettel: Zettel) -> Result<Zid, BoxError> {
        if self.read_only {
            return Err(BoxError::ReadOnly);
        }
        let zid = {
            let mut entries = self.entries_mut();
            let zid = new_zid(|zid| {
                Ok(!entries.contains_key(&zid) && !self.file(zid, EXT_ZETTEL).exists())
            })?;
            zettel.meta.zid = zid;
            let layout = self.write_zettel(&zettel)?;
            entries.insert(zid, layout);
            zid
        };
        self.notifier.notify(UpdateReason::Zettel, zid);
        Ok(zid)
    }

    fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError> {
        let layout = self.layout(zid)?;
        self.read_zettel(zid, layout)
    }

    fn has_zettel(&self, zid: Zid) -> bool {
        self.entries().contains_key(&zid)
    }

    fn apply_zid(
        &self,
        handle: &mut dyn FnMut(Zid),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        let zids: Vec<Zid> = self.entries().keys().copied().collect();
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
        let entries: Vec<(Zid, FileLayout)> = self
            .entries()
            .iter()
            .filter(|(zid, _)| constraint(**zid))
            .map(|(zid, layout)| (*zid, *layout))
            .collect();
        for (zid, layout) in entries {
            match self.read_zettel(zid, layout) {
                Ok(zettel) => handle(zettel.meta),
                Err(err) => {
                    tracing::warn!(zid = %zid, reason = %err, "skip unreadable zettel");
                }
            }
        }
        Ok(())
    }

    fn can_update_zettel(&self, _zettel: &Zettel) -> bool {
        !self.read_only
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
            let mut entries = self.entries_mut();
            let layout = self.write_zettel(&zettel)?;
            entries.insert(zid, layout);
        }
        self.notifier.notify(UpdateReason::Zettel, zid);
        Ok(())
    }

    fn allow_rename_zettel(&self, _zid: Zid) -> bool {
        !self.read_only
    }

    fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> Result<(), BoxError> {
        {
            let mut entries = self.entries_mut();
            let Some(layout) = entries.get(&cur_zid).copied() else {
                if self.read_only {
                    return Ok(());
                }
                return Err(BoxError::ZettelNotFound(cur_zid));
            };
            if self.read_only {
                return Err(BoxError::ReadOnly);
            }
            if entries.contains_key(&new_zid) {
                return Err(BoxError::InvalidZid(new_zid.to_string()));
            }
            let mut zettel = self.read_zettel(cur_zid, layout)?;
            zettel.meta.zid = new_zid;
            let layout = self.write_zettel(&zettel)?;
            self.remove_files(cur_zid)?;
            entries.remove(&cur_zid);
            entries.insert(new_zid, layout);
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
            let mut entries = self.entries_mut();
            if entries.remove(&zid).is_none() {
                return Err(BoxError::ZettelNotFound(zid));
            }
            self.remove_files(zid)?;
        }
        self.notifier.notify(UpdateReason::Delete, zid);
        Ok(())
    }

    fn read_stats(&self) -> ManagedBoxStats {
        ManagedBoxStats {
            read_only: self.read_only,
            zettel: self.entries().len(),
        }
    }

    fn start_stopper(&self) -> Option<&dyn StartStopper> {
        Some(self)
    }

    fn refresher(&self) -> Option<&dyn Refresher> {
        Some(self)
    }
}

impl StartStopper for DirBox {
    fn start(&self) -> Result<(), BoxError> {
        if !self.read_only {
            fs::create_dir_all(&self.dir)?;
        }
        let count = self.rescan()?;
        tracing::debug!(
            box_number = self.notifier.box_number(),
            dir = %self.dir.display(),
            zettel = count,
            "start dir box"
        );
        self.notifier.notify(UpdateReason::Ready, Zid::INVALID);
        Ok(())
    }

    fn stop(&self) {
        self.entries_mut().clear();
    }
}

impl Refresher for DirBox {
    fn refresh(&self) -> Result<(), BoxError> {
        self.rescan()?;
        self.notifier.notify(UpdateReason::Reload, Zid::INVALID);
        Ok(())
    }
}

fn scan_dir(dir: &Path) -> Result<BTreeMap<Zid, FileLayout>, BoxError> {
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some((stem, ext)) = name.to_str().and_then(|name| name.split_once('.')) else {
            continue;
        };
        let Ok(zid) = Zid::parse(stem) else {
            continue;
        };
        match ext {
            EXT_ZETTEL => {
                entries.insert(zid, FileLayout::Combined);
            }
            EXT_META | EXT_CONTENT => {
                entries.entry(zid).or_insert(FileLayout::Split);
            }
            _ => {
                tracing::debug!(zid = %zid, file = %entry.path().display(), "ignore useless file");
            }
        }
    }
    Ok(entries)
}

fn parse_header(zid: Zid, data: &[u8]) -> Result<(Meta, usize), BoxError> {
    Meta::parse_header(zid, data)
        .map_err(|err| BoxError::Io(io::Error::new(io::ErrorKind::InvalidData, err.to_string())))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, BoxError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn remove_optional(path: &Path) -> Result<(), BoxError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), BoxError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "dirbox_tests.rs"]
mod tests;
