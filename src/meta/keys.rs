use std::collections::HashMap;
use std::sync::OnceLock;

pub const KEY_ID: &str = "id";
pub const KEY_TITLE: &str = "title";
pub const KEY_ROLE: &str = "role";
pub const KEY_TAGS: &str = "tags";
pub const KEY_SYNTAX: &str = "syntax";

pub const KEY_AUTHOR: &str = "author";
pub const KEY_BACK: &str = "back";
pub const KEY_BACKWARD: &str = "backward";
pub const KEY_BOX_NUMBER: &str = "box-number";
pub const KEY_COPYRIGHT: &str = "copyright";
pub const KEY_CREATED: &str = "created";
pub const KEY_CREATED_MISSING: &str = "created-missing";
pub const KEY_CREDENTIAL: &str = "credential";
pub const KEY_DEAD: &str = "dead";
pub const KEY_EXPIRE: &str = "expire";
pub const KEY_FOLGE: &str = "folge";
pub const KEY_FOLGE_ROLE: &str = "folge-role";
pub const KEY_FORWARD: &str = "forward";
pub const KEY_LANG: &str = "lang";
pub const KEY_LICENSE: &str = "license";
pub const KEY_MODIFIED: &str = "modified";
pub const KEY_PRECURSOR: &str = "precursor";
pub const KEY_PREDECESSOR: &str = "predecessor";
pub const KEY_PREQUEL: &str = "prequel";
pub const KEY_PUBLISHED: &str = "published";
pub const KEY_QUERY: &str = "query";
pub const KEY_READ_ONLY: &str = "read-only";
pub const KEY_SEQUEL: &str = "sequel";
pub const KEY_SUBORDINATES: &str = "subordinates";
pub const KEY_SUCCESSORS: &str = "successors";
pub const KEY_SUMMARY: &str = "summary";
pub const KEY_SUPERIOR: &str = "superior";
pub const KEY_URL: &str = "url";
pub const KEY_USER_ID: &str = "user-id";
pub const KEY_USER_ROLE: &str = "user-role";
pub const KEY_VISIBILITY: &str = "visibility";

pub const MAX_KEY_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    Credential,
    Empty,
    Id,
    IdSet,
    Number,
    String,
    TagSet,
    Timestamp,
    Url,
    Word,
    WordSet,
    Zettelmarkup,
}

impl MetaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaType::Credential => "Credential",
            MetaType::Empty => "EString",
            MetaType::Id => "Identifier",
            MetaType::IdSet => "IdentifierSet",
            MetaType::Number => "Number",
            MetaType::String => "String",
            MetaType::TagSet => "TagSet",
            MetaType::Timestamp => "Timestamp",
            MetaType::Url => "URL",
            MetaType::Word => "Word",
            MetaType::WordSet => "WordSet",
            MetaType::Zettelmarkup => "Zettelmarkup",
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, MetaType::IdSet | MetaType::TagSet | MetaType::WordSet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyUsage {
    User,
    Computed,
    Property,
}

impl KeyUsage {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyUsage::User => "user",
            KeyUsage::Computed => "computed",
            KeyUsage::Property => "property",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub name: &'static str,
    pub meta_type: MetaType,
    pub usage: KeyUsage,
    pub inverse: Option<&'static str>,
}

impl KeyDescriptor {
    pub fn is_computed(&self) -> bool {
        self.usage >= KeyUsage::Computed
    }

    pub fn is_property(&self) -> bool {
        self.usage == KeyUsage::Property
    }
}

const fn key(
    name: &'static str,
    meta_type: MetaType,
    usage: KeyUsage,
    inverse: Option<&'static str>,
) -> KeyDescriptor {
    KeyDescriptor {
        name,
        meta_type,
        usage,
        inverse,
    }
}

const REGISTERED_KEYS: [KeyDescriptor; 36] = [
    key(KEY_ID, MetaType::Id, KeyUsage::Computed, None),
    key(KEY_TITLE, MetaType::Zettelmarkup, KeyUsage::User, None),
    key(KEY_ROLE, MetaType::Word, KeyUsage::User, None),
    key(KEY_TAGS, MetaType::TagSet, KeyUsage::User, None),
    key(KEY_SYNTAX, MetaType::Word, KeyUsage::User, None),
    key(KEY_FOLGE, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_SEQUEL, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_SUCCESSORS, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_SUBORDINATES, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_PRECURSOR, MetaType::IdSet, KeyUsage::User, Some(KEY_FOLGE)),
    key(KEY_PREQUEL, MetaType::IdSet, KeyUsage::User, Some(KEY_SEQUEL)),
    key(KEY_PREDECESSOR, MetaType::Id, KeyUsage::User, Some(KEY_SUCCESSORS)),
    key(KEY_SUPERIOR, MetaType::IdSet, KeyUsage::User, Some(KEY_SUBORDINATES)),
    key(KEY_AUTHOR, MetaType::String, KeyUsage::User, None),
    key(KEY_BACK, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_BACKWARD, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_BOX_NUMBER, MetaType::Number, KeyUsage::Property, None),
    key(KEY_COPYRIGHT, MetaType::String, KeyUsage::User, None),
    key(KEY_CREATED, MetaType::Timestamp, KeyUsage::Computed, None),
    key(KEY_CREATED_MISSING, MetaType::Word, KeyUsage::Property, None),
    key(KEY_CREDENTIAL, MetaType::Credential, KeyUsage::User, None),
    key(KEY_DEAD, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_EXPIRE, MetaType::Timestamp, KeyUsage::User, None),
    key(KEY_FOLGE_ROLE, MetaType::Word, KeyUsage::User, None),
    key(KEY_FORWARD, MetaType::IdSet, KeyUsage::Property, None),
    key(KEY_LANG, MetaType::Word, KeyUsage::User, None),
    key(KEY_LICENSE, MetaType::Empty, KeyUsage::User, None),
    key(KEY_MODIFIED, MetaType::Timestamp, KeyUsage::Computed, None),
    key(KEY_PUBLISHED, MetaType::Timestamp, KeyUsage::Property, None),
    key(KEY_QUERY, MetaType::Empty, KeyUsage::User, None),
    key(KEY_READ_ONLY, MetaType::Word, KeyUsage::User, None),
    key(KEY_SUMMARY, MetaType::Zettelmarkup, KeyUsage::User, None),
    key(KEY_URL, MetaType::Url, KeyUsage::User, None),
    key(KEY_USER_ID, MetaType::Word, KeyUsage::User, None),
    key(KEY_USER_ROLE, MetaType::Word, KeyUsage::User, None),
    key(KEY_VISIBILITY, MetaType::Word, KeyUsage::User, None),
];

const SUFFIX_TYPES: [(&str, MetaType); 10] = [
    ("-date", MetaType::Timestamp),
    ("-number", MetaType::Number),
    ("-role", MetaType::Word),
    ("-set", MetaType::WordSet),
    ("-time", MetaType::Timestamp),
    ("-title", MetaType::Zettelmarkup),
    ("-url", MetaType::Url),
    ("-zettel", MetaType::Id),
    ("-zid", MetaType::Id),
    ("-zids", MetaType::IdSet),
];

fn registry() -> &'static HashMap<&'static str, KeyDescriptor> {
    static REGISTRY: OnceLock<HashMap<&'static str, KeyDescriptor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::with_capacity(REGISTERED_KEYS.len());
        for descriptor in REGISTERED_KEYS {
            if map.insert(descriptor.name, descriptor).is_some() {
                panic!("metadata key '{}' registered twice", descriptor.name);
            }
        }
        for descriptor in REGISTERED_KEYS {
            if let Some(inverse) = descriptor.inverse {
                if !map.contains_key(inverse) {
                    panic!(
                        "inverse key '{}' of '{}' is not registered",
                        inverse, descriptor.name
                    );
                }
            }
        }
        map
    })
}

pub fn descriptor(key: &str) -> Option<&'static KeyDescriptor> {
    registry().get(key)
}

pub fn registered_keys() -> Vec<&'static KeyDescriptor> {
    let mut keys: Vec<_> = registry().values().collect();
    keys.sort_by_key(|descriptor| descriptor.name);
    keys
}

pub fn key_type(key: &str) -> MetaType {
    if let Some(descriptor) = descriptor(key) {
        return descriptor.meta_type;
    }
    SUFFIX_TYPES
        .iter()
        .find(|(suffix, _)| key.ends_with(suffix))
        .map_or(MetaType::Empty, |(_, meta_type)| *meta_type)
}

pub fn is_computed(key: &str) -> bool {
    descriptor(key).is_some_and(KeyDescriptor::is_computed)
}

pub fn is_property(key: &str) -> bool {
    descriptor(key).is_some_and(KeyDescriptor::is_property)
}

pub fn inverse_key(key: &str) -> Option<&'static str> {
    descriptor(key).and_then(|descriptor| descriptor.inverse)
}

pub fn is_valid_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    let Some(first) = bytes.first() else {
        return false;
    };
    if bytes.len() > MAX_KEY_LEN || !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
