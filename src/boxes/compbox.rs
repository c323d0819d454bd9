use std::env;
use std::fmt::Write as _;
use std::fs;
use std::sync::{OnceLock, Weak};

use super::manager::Shared;
use super::{BoxError, ManagedBox, ManagedBoxStats};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::logging;
use crate::meta::keys;
use crate::meta::Meta;

enum Source {
    Static(fn() -> String),
    Manager(fn(&Shared) -> String),
}

struct Generator {
    zid: Zid,
    title: &'static str,
    syntax: &'static str,
    visibility: &'static str,
    source: Source,
}

static GENERATORS: [Generator; 9] = [
    Generator {
        zid: Zid::VERSION,
        title: "Zettelstore Version",
        syntax: "text",
        visibility: "public",
        source: Source::Static(version),
    },
    Generator {
        zid: Zid::HOST,
        title: "Zettelstore Host",
        syntax: "text",
        visibility: "expert",
        source: Source::Static(host),
    },
    Generator {
        zid: Zid::OPERATING_SYSTEM,
        title: "Zettelstore Operating System",
        syntax: "text",
        visibility: "expert",
        source: Source::Static(operating_system),
    },
    Generator {
        zid: Zid::LOG,
        title: "Zettelstore Log",
        syntax: "text",
        visibility: "expert",
        source: Source::Static(log),
    },
    Generator {
        zid: Zid::MEMORY,
        title: "Zettelstore Memory",
        syntax: "zmk",
        visibility: "expert",
        source: Source::Static(memory),
    },
    Generator {
        zid: Zid::BOX_MANAGER,
        title: "Zettelstore Box Manager",
        syntax: "zmk",
        visibility: "expert",
        source: Source::Manager(box_manager),
    },
    Generator {
        zid: Zid::ZETTEL_INDEX,
        title: "Zettelstore Index",
        syntax: "zmk",
        visibility: "expert",
        source: Source::Manager(zettel_index),
    },
    Generator {
        zid: Zid::METADATA_KEYS,
        title: "Zettelstore Supported Metadata Keys",
        syntax: "zmk",
        visibility: "login",
        source: Source::Static(metadata_keys),
    },
    Generator {
        zid: Zid::WARNINGS,
        title: "Zettelstore Warnings",
        syntax: "zmk",
        visibility: "expert",
        source: Source::Manager(warnings),
    },
];

fn generator(zid: Zid) -> Option<&'static Generator> {
    GENERATORS.iter().find(|generator| generator.zid == zid)
}

fn created() -> &'static str {
    static CREATED: OnceLock<String> = OnceLock::new();
    CREATED.get_or_init(|| Zid::now(true).to_string())
}

pub struct CompBox {
    shared: Weak<Shared>,
}

impl CompBox {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    fn meta(generator: &Generator) -> Meta {
        let mut meta = Meta::new(generator.zid);
        meta.set(keys::KEY_TITLE, generator.title);
        meta.set(keys::KEY_ROLE, "configuration");
        meta.set(keys::KEY_SYNTAX, generator.syntax);
        meta.set(keys::KEY_VISIBILITY, generator.visibility);
        meta.set(keys::KEY_READ_ONLY, "true");
        meta.set(keys::KEY_CREATED, created());
        meta
    }

    fn content(&self, generator: &Generator) -> Result<String, BoxError> {
        match generator.source {
            Source::Static(generate) => Ok(generate()),
            Source::Manager(generate) => {
                let shared = self.shared.upgrade().ok_or(BoxError::Stopped)?;
                Ok(generate(&shared))
            }
        }
    }
}

impl ManagedBox for CompBox {
    fn location(&self) -> String {
        "comp:".to_string()
    }

    fn can_create_zettel(&self) -> bool {
        false
    }

    fn create_zettel(&self, _zettel: Zettel) -> Result<Zid, BoxError> {
        Err(BoxError::ReadOnly)
    }

    fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError> {
        let generator = generator(zid).ok_or(BoxError::ZettelNotFound(zid))?;
        let content = self.content(generator)?;
        Ok(Zettel::new(Self::meta(generator), Content::from_text(content)))
    }

    fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        generator(zid)
            .map(Self::meta)
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn has_zettel(&self, zid: Zid) -> bool {
        generator(zid).is_some()
    }

    fn apply_zid(
        &self,
        handle: &mut dyn FnMut(Zid),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        for generator in &GENERATORS {
            if constraint(generator.zid) {
                handle(generator.zid);
            }
        }
        Ok(())
    }

    fn apply_meta(
        &self,
        handle: &mut dyn FnMut(Meta),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        for generator in &GENERATORS {
            if constraint(generator.zid) {
                handle(Self::meta(generator));
            }
        }
        Ok(())
    }

    fn can_update_zettel(&self, _zettel: &Zettel) -> bool {
        false
    }

    fn update_zettel(&self, _zettel: Zettel) -> Result<(), BoxError> {
        Err(BoxError::ReadOnly)
    }

    fn allow_rename_zettel(&self, zid: Zid) -> bool {
        !self.has_zettel(zid)
    }

    fn rename_zettel(&self, cur_zid: Zid, _new_zid: Zid) -> Result<(), BoxError> {
        if self.has_zettel(cur_zid) {
            Err(BoxError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn can_delete_zettel(&self, _zid: Zid) -> bool {
        false
    }

    fn delete_zettel(&self, zid: Zid) -> Result<(), BoxError> {
        if self.has_zettel(zid) {
            Err(BoxError::ReadOnly)
        } else {
            Err(BoxError::ZettelNotFound(zid))
        }
    }

    fn read_stats(&self) -> ManagedBoxStats {
        ManagedBoxStats {
            read_only: true,
            zettel: GENERATORS.len(),
        }
    }
}

fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn host() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn operating_system() -> String {
    format!("{}/{}", env::consts::OS, env::consts::ARCH)
}

fn log() -> String {
    logging::recent_entries().join("\n")
}

fn memory() -> String {
    let Ok(statm) = fs::read_to_string("/proc/self/statm") else {
        return "Memory statistics are not available on this system.".to_string();
    };
    let labels = ["Total pages", "Resident pages", "Shared pages", "Text pages"];
    let mut out = String::from("|=Name|Value>\n");
    for (label, value) in labels.iter().zip(statm.split_whitespace()) {
        let _ = writeln!(out, "|{}|{}", label, value);
    }
    out
}

fn box_manager(shared: &Shared) -> String {
    let stats = shared.read_stats();
    let mut out = String::from("|=Name|Value>\n");
    let _ = writeln!(out, "|Read-only|{}", stats.read_only);
    let _ = writeln!(out, "|Managed boxes|{}", stats.num_managed_boxes);
    let _ = writeln!(out, "|Zettel (total)|{}", stats.zettel_total);
    for (pos, location) in shared.box_locations().iter().enumerate() {
        let _ = writeln!(out, "|Box {}|{}", pos + 1, location);
    }
    out
}

fn zettel_index(shared: &Shared) -> String {
    let stats = shared.read_stats();
    let mut out = String::from("|=Name|Value>\n");
    let _ = writeln!(
        out,
        "|Last reload|{}",
        stats.last_reload.as_deref().unwrap_or("never")
    );
    let _ = writeln!(out, "|Indexes since last reload|{}", stats.indexes_since_reload);
    let _ = writeln!(out, "|Duration last reload|{} ms", stats.dur_last_reload_ms);
    let _ = writeln!(out, "|Indexed zettel|{}", stats.zettel_indexed);
    let _ = writeln!(out, "|Index updates|{}", stats.index_updates);
    let _ = writeln!(out, "|Indexed words|{}", stats.indexed_words);
    let _ = writeln!(out, "|Indexed URLs|{}", stats.indexed_urls);
    out
}

fn metadata_keys() -> String {
    let mut out = String::from("|=Name<|Type<|Computed?:|Property?:|Inverse\n");
    for descriptor in keys::registered_keys() {
        let _ = writeln!(
            out,
            "|{}|{}|{}|{}|{}",
            descriptor.name,
            descriptor.meta_type.as_str(),
            yes_no(descriptor.is_computed()),
            yes_no(descriptor.is_property()),
            descriptor.inverse.unwrap_or("")
        );
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn warnings(shared: &Shared) -> String {
    let store = shared.store();
    let mut out = String::new();
    let dead = store.dead_references();
    if !dead.is_empty() {
        out.push_str("=== Missing zettel\n");
        for (missing, referencing) in dead {
            let _ = writeln!(out, "* {} is referenced by {}", missing, referencing);
        }
    }
    if store.reference_graph(Some(keys::KEY_FOLGE)).has_cycle() {
        out.push_str("=== Precursor cycle\nThe precursor references form a cycle.\n");
    }
    if out.is_empty() {
        out.push_str("No warnings.");
    }
    out
}
