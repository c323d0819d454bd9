use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{BoxError, ManagedBox, ManagedBoxStats};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::keys;
use crate::meta::Meta;

struct ConstZettel {
    zid: Zid,
    header: &'static [(&'static str, &'static str)],
    content: &'static [u8],
}

const CREATED: &str = "20240101000000";

const LICENSE: &str = "Copyright (c) the Zettelstore authors.

Permission to use, copy, modify, and/or distribute this software for any
purpose with or without fee is hereby granted, provided that the above
copyright notice and this permission notice appear in all copies.";

const AUTHORS: &str = "Zettelstore is developed by its contributors.
See the version control history for a complete list.";

const DEPENDENCIES: &str = "=== Crates
* base64
* clap
* crossbeam
* serde and serde_json
* time
* toml
* tracing and tracing-subscriber
* unicode-normalization
* url";

const CONFIGURATION: &str = "";

const BASE_TEMPLATE: &str = "<!DOCTYPE html>
<html lang=\"{{lang}}\">
<head><meta charset=\"utf-8\"><title>{{title}}</title></head>
<body>{{content}}</body>
</html>";

const BASE_CSS: &str = "body { font-family: sans-serif; line-height: 1.4; margin: 0 auto; max-width: 50rem; }
a.broken { text-decoration: line-through; }";

const HOME: &str = "=== Thank you for using Zettelstore!

Create your first zettel and link it with [[other zettel|00000000000100]].
Every zettel is identified by a unique fourteen digit identifier.";

const EMOJI: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

static CONST_ZETTEL: [ConstZettel; 8] = [
    ConstZettel {
        zid: Zid::LICENSE,
        header: &[
            ("title", "Zettelstore License"),
            ("role", "configuration"),
            ("syntax", "text"),
            ("lang", "en"),
            ("read-only", "true"),
            ("visibility", "public"),
        ],
        content: LICENSE.as_bytes(),
    },
    ConstZettel {
        zid: Zid::AUTHORS,
        header: &[
            ("title", "Zettelstore Contributors"),
            ("role", "configuration"),
            ("syntax", "zmk"),
            ("lang", "en"),
            ("read-only", "true"),
            ("visibility", "login"),
        ],
        content: AUTHORS.as_bytes(),
    },
    ConstZettel {
        zid: Zid::DEPENDENCIES,
        header: &[
            ("title", "Zettelstore Dependencies"),
            ("role", "configuration"),
            ("syntax", "zmk"),
            ("lang", "en"),
            ("read-only", "true"),
            ("visibility", "login"),
        ],
        content: DEPENDENCIES.as_bytes(),
    },
    ConstZettel {
        zid: Zid::CONFIGURATION,
        header: &[
            ("title", "Zettelstore Runtime Configuration"),
            ("role", "configuration"),
            ("syntax", "none"),
            ("visibility", "owner"),
        ],
        content: CONFIGURATION.as_bytes(),
    },
    ConstZettel {
        zid: Zid::BASE_TEMPLATE,
        header: &[
            ("title", "Zettelstore Base HTML Template"),
            ("role", "configuration"),
            ("syntax", "html"),
            ("visibility", "expert"),
        ],
        content: BASE_TEMPLATE.as_bytes(),
    },
    ConstZettel {
        zid: Zid::BASE_CSS,
        header: &[
            ("title", "Zettelstore Base CSS"),
            ("role", "configuration"),
            ("syntax", "css"),
            ("visibility", "public"),
        ],
        content: BASE_CSS.as_bytes(),
    },
    ConstZettel {
        zid: Zid::EMOJI,
        header: &[
            ("title", "Zettelstore Generic Emoji"),
            ("role", "configuration"),
            ("syntax", "gif"),
            ("read-only", "true"),
            ("visibility", "public"),
        ],
        content: EMOJI,
    },
    ConstZettel {
        zid: Zid::HOME,
        header: &[
            ("title", "Home"),
            ("role", "zettel"),
            ("syntax", "zmk"),
            ("lang", "en"),
        ],
        content: HOME.as_bytes(),
    },
];

fn const_zettel() -> &'static BTreeMap<Zid, Zettel> {
    static ZETTEL: OnceLock<BTreeMap<Zid, Zettel>> = OnceLock::new();
    ZETTEL.get_or_init(|| {
        CONST_ZETTEL
            .iter()
            .map(|cz| {
                let mut meta = Meta::new(cz.zid);
                for (key, value) in cz.header {
                    meta.set(key, value);
                }
                meta.set(keys::KEY_CREATED, CREATED);
                (cz.zid, Zettel::new(meta, Content::new(cz.content.to_vec())))
            })
            .collect()
    })
}

#[derive(Debug, Default)]
pub struct ConstBox;

impl ManagedBox for ConstBox {
    fn location(&self) -> String {
        "const:".to_string()
    }

    fn can_create_zettel(&self) -> bool {
        false
    }

    fn create_zettel(&self, _zettel: Zettel) -> Result<Zid, BoxError> {
        Err(BoxError::ReadOnly)
    }

    fn get_zettel(&self, zid: Zid) -> Result<Zettel, BoxError> {
        const_zettel()
            .get(&zid)
            .cloned()
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn get_meta(&self, zid: Zid) -> Result<Meta, BoxError> {
        const_zettel()
            .get(&zid)
            .map(|zettel| zettel.meta.clone())
            .ok_or(BoxError::ZettelNotFound(zid))
    }

    fn has_zettel(&self, zid: Zid) -> bool {
        const_zettel().contains_key(&zid)
    }

    fn apply_zid(
        &self,
        handle: &mut dyn FnMut(Zid),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        for zid in const_zettel().keys().copied().filter(|zid| constraint(*zid)) {
            handle(zid);
        }
        Ok(())
    }

    fn apply_meta(
        &self,
        handle: &mut dyn FnMut(Meta),
        constraint: &dyn Fn(Zid) -> bool,
    ) -> Result<(), BoxError> {
        for (zid, zettel) in const_zettel() {
            if constraint(*zid) {
                handle(zettel.meta.clone());
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
            zettel: const_zettel().len(),
        }
    }
}
