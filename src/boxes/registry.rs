use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use url::Url;

use super::{dirbox, membox, BoxError, ManagedBox, Notifier, UpdateInfo};
use crate::meta::values;

pub const CONST_SCHEME: &str = " const";
pub const COMP_SCHEME: &str = " comp";

pub const OPTION_READ_ONLY: &str = "readonly";

#[derive(Debug, Clone, Default)]
pub struct ConnectData {
    pub number: usize,
    pub notify: Option<Sender<UpdateInfo>>,
    pub pending: Arc<AtomicUsize>,
}

impl ConnectData {
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.number, self.notify.clone()).with_pending(Arc::clone(&self.pending))
    }
}

pub type BoxFactory = fn(&Url, &ConnectData) -> Result<Box<dyn ManagedBox>, BoxError>;

const FACTORIES: [(&str, BoxFactory); 2] = [("dir", dirbox::connect), ("mem", membox::connect)];

fn registry() -> &'static HashMap<&'static str, BoxFactory> {
    static REGISTRY: OnceLock<HashMap<&'static str, BoxFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for (scheme, factory) in FACTORIES {
            if scheme == CONST_SCHEME || scheme == COMP_SCHEME {
                panic!("box scheme '{}' is reserved", scheme);
            }
            if map.insert(scheme, factory).is_some() {
                panic!("box scheme '{}' registered twice", scheme);
            }
        }
        map
    })
}

pub fn schemes() -> Vec<&'static str> {
    let mut schemes: Vec<_> = registry().keys().copied().collect();
    schemes.sort_unstable();
    schemes
}

pub fn connect(
    uri: &str,
    read_only: bool,
    data: &ConnectData,
) -> Result<Box<dyn ManagedBox>, BoxError> {
    let mut url = Url::parse(uri)
        .map_err(|err| BoxError::InvalidConfig(format!("box URI '{}': {}", uri, err)))?;
    if read_only && !query_flag(&url, OPTION_READ_ONLY) {
        url.query_pairs_mut().append_key_only(OPTION_READ_ONLY);
    }
    let factory = registry()
        .get(url.scheme())
        .ok_or_else(|| BoxError::InvalidScheme(url.scheme().to_string()))?;
    tracing::debug!(box_number = data.number, uri = %url, "connect box");
    factory(&url, data)
}

pub fn query_flag(url: &Url, key: &str) -> bool {
    url.query_pairs()
        .filter(|(name, _)| name == key)
        .any(|(_, value)| value.is_empty() || values::bool_value(&value))
}

pub fn query_number(url: &Url, key: &str) -> Result<Option<usize>, BoxError> {
    let Some((_, value)) = url.query_pairs().find(|(name, _)| name == key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| BoxError::InvalidConfig(format!("option '{}' needs a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{connect, query_flag, query_number, schemes, ConnectData};
    use crate::boxes::BoxError;

    fn data() -> ConnectData {
        ConnectData {
            number: 1,
            ..ConnectData::default()
        }
    }

    #[test]
    fn known_schemes_are_registered() {
        assert_eq!(schemes(), vec!["dir", "mem"]);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = connect("ftp://example.com", false, &data()).err();
        assert!(matches!(err, Some(BoxError::InvalidScheme(scheme)) if scheme == "ftp"));
        assert!(matches!(
            connect("not a uri", false, &data()).err(),
            Some(BoxError::InvalidConfig(_))
        ));
    }

    #[test]
    fn read_only_mode_forces_option() {
        let mem = connect("mem:", true, &data()).expect("mem box should connect");
        assert!(mem.read_stats().read_only);
        let mem = connect("mem:", false, &data()).expect("mem box should connect");
        assert!(!mem.read_stats().read_only);
    }

    #[test]
    fn query_options_are_parsed() {
        let url = Url::parse("mem:?readonly&max-zettel=10&flag=false").expect("url should parse");
        assert!(query_flag(&url, "readonly"));
        assert!(!query_flag(&url, "flag"));
        assert!(!query_flag(&url, "missing"));
        assert_eq!(query_number(&url, "max-zettel").expect("number"), Some(10));
        assert_eq!(query_number(&url, "max-bytes").expect("absent"), None);
        assert!(query_number(&url, "flag").is_err());
    }
}
