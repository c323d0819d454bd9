use std::fmt;

use url::Url;

use crate::id::Zid;

pub const QUERY_PREFIX: &str = "query:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefState {
    Invalid,
    Zettel,
    SelfRef,
    Found,
    Broken,
    Hosted,
    Based,
    Query,
    External,
}

impl RefState {
    pub fn as_str(self) -> &'static str {
        match self {
            RefState::Invalid => "invalid",
            RefState::Zettel => "zettel",
            RefState::SelfRef => "self",
            RefState::Found => "found",
            RefState::Broken => "broken",
            RefState::Hosted => "hosted",
            RefState::Based => "based",
            RefState::Query => "query",
            RefState::External => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub url: Option<Url>,
    pub value: String,
    pub state: RefState,
}

impl Reference {
    pub fn parse(value: &str) -> Reference {
        if value.is_empty() || value == "00000000000000" {
            return Self::with_state(value, RefState::Invalid);
        }
        if let Some(query) = value.strip_prefix(QUERY_PREFIX) {
            return Self::with_state(query, RefState::Query);
        }
        if let Some(state) = local_state(value) {
            let value = if state == RefState::Based {
                &value[1..]
            } else {
                value
            };
            return Self::with_state(value, state);
        }
        if let Ok(url) = Url::parse(value) {
            return Reference {
                url: Some(url),
                value: value.to_string(),
                state: RefState::External,
            };
        }

        let (path, fragment) = split_path(value);
        if Zid::parse(path).is_ok() {
            return Self::with_state(value, RefState::Zettel);
        }
        if path.is_empty() && fragment.is_some_and(|f| !f.is_empty()) {
            return Self::with_state(value, RefState::SelfRef);
        }
        Self::with_state(value, RefState::External)
    }

    fn with_state(value: &str, state: RefState) -> Reference {
        Reference {
            url: None,
            value: value.to_string(),
            state,
        }
    }

    pub fn zid(&self) -> Option<Zid> {
        match self.state {
            RefState::Zettel | RefState::Found | RefState::Broken => {
                Zid::parse(split_path(&self.value).0).ok()
            }
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state != RefState::Invalid
    }

    pub fn is_zettel(&self) -> bool {
        matches!(
            self.state,
            RefState::Zettel | RefState::Found | RefState::Broken
        )
    }

    pub fn is_local(&self) -> bool {
        matches!(self.state, RefState::Hosted | RefState::Based)
    }

    pub fn is_external(&self) -> bool {
        self.state == RefState::External
    }

    pub fn resolve(&mut self, exists: impl FnOnce(Zid) -> bool) {
        if let Some(zid) = self.zid() {
            self.state = if exists(zid) {
                RefState::Found
            } else {
                RefState::Broken
            };
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            RefState::Query => write!(f, "{}{}", QUERY_PREFIX, self.value),
            RefState::Based => write!(f, "/{}", self.value),
            _ => f.write_str(&self.value),
        }
    }
}

fn local_state(value: &str) -> Option<RefState> {
    let bytes = value.as_bytes();
    match bytes {
        [b'/', b'/', ..] => Some(RefState::Based),
        [b'/', ..] => Some(RefState::Hosted),
        [b'.', b'/', ..] | [b'.', b'.', b'/', ..] => Some(RefState::Hosted),
        _ => None,
    }
}

fn split_path(value: &str) -> (&str, Option<&str>) {
    let (before, fragment) = match value.split_once('#') {
        Some((before, fragment)) => (before, Some(fragment)),
        None => (value, None),
    };
    let path = before.split_once('?').map_or(before, |(path, _)| path);
    (path, fragment)
}
