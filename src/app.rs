use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::boxes::{BoxError, Manager, Stats};
use crate::config::{Config, ConfigError};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::{arrange, keys, Meta, ParseMetaError};
use crate::query::{Query, QueryError};

const START_TIMEOUT: Duration = Duration::from_secs(10);
const INDEX_TIMEOUT: Duration = Duration::from_secs(30);

pub struct App {
    manager: Manager,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaView {
    pub id: Zid,
    pub meta: BTreeMap<String, String>,
}

impl From<&Meta> for MetaView {
    fn from(meta: &Meta) -> Self {
        Self {
            id: meta.zid,
            meta: meta
                .computed_pairs()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZettelView {
    pub id: Zid,
    pub meta: BTreeMap<String, String>,
    pub content: String,
    pub encoding: &'static str,
}

impl From<&Zettel> for ZettelView {
    fn from(zettel: &Zettel) -> Self {
        let MetaView { id, meta } = MetaView::from(&zettel.meta);
        let (content, encoding) = zettel.content.encode();
        Self {
            id,
            meta,
            content,
            encoding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    pub zettel: Vec<MetaView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrangement: Option<Arrangement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arrangement {
    pub key: String,
    pub groups: Vec<GroupCount>,
}

impl App {
    pub fn open(config: &Config) -> Result<Self, AppError> {
        let manager = Manager::new(config)?;
        manager.start()?;
        if !manager.wait_started(START_TIMEOUT) {
            return Err(AppError::StartTimeout);
        }
        if !manager.wait_indexed(INDEX_TIMEOUT) {
            tracing::warn!("initial indexing still running, results may be incomplete");
        }
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn get_zettel(&self, zid: Zid) -> Result<Zettel, AppError> {
        Ok(self.manager.get_zettel(zid)?)
    }

    pub fn get_meta(&self, zid: Zid) -> Result<Meta, AppError> {
        Ok(self.manager.get_meta(zid)?)
    }

    pub fn query(&self, input: &str) -> Result<QueryOutcome, AppError> {
        let query = Query::parse(input)?;
        let metas = self.manager.select_meta(&query)?;
        let arrangement = query
            .actions
            .iter()
            .find(|action| keys::is_valid_key(action))
            .map(|key| {
                let arrangement = arrange::create_arrangement(&metas, key);
                Arrangement {
                    key: key.clone(),
                    groups: arrange::counted(&arrangement)
                        .into_iter()
                        .map(|(name, count)| GroupCount {
                            name: name.to_string(),
                            count,
                        })
                        .collect(),
                }
            });
        Ok(QueryOutcome {
            zettel: metas.iter().map(MetaView::from).collect(),
            arrangement,
        })
    }

    pub fn create_zettel(&self, text: &[u8]) -> Result<Zid, AppError> {
        let zettel = parse_zettel(Zid::INVALID, text)?;
        let zid = self.manager.create_zettel(zettel)?;
        self.manager.wait_indexed(INDEX_TIMEOUT);
        Ok(zid)
    }

    pub fn update_zettel(&self, zid: Zid, text: &[u8]) -> Result<(), AppError> {
        if !self.manager.has_zettel(zid) {
            return Err(BoxError::ZettelNotFound(zid).into());
        }
        let zettel = parse_zettel(zid, text)?;
        self.manager.update_zettel(zettel)?;
        self.manager.wait_indexed(INDEX_TIMEOUT);
        Ok(())
    }

    pub fn delete_zettel(&self, zid: Zid) -> Result<(), AppError> {
        self.manager.delete_zettel(zid)?;
        self.manager.wait_indexed(INDEX_TIMEOUT);
        Ok(())
    }

    pub fn rename_zettel(&self, cur_zid: Zid, new_zid: Zid) -> Result<(), AppError> {
        self.manager.rename_zettel(cur_zid, new_zid)?;
        self.manager.wait_indexed(INDEX_TIMEOUT);
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        self.manager.read_stats()
    }

    pub fn dump(&self) -> String {
        self.manager.dump_index()
    }

    pub fn refresh(&self) -> Result<(), AppError> {
        self.manager.refresh()?;
        self.manager.wait_indexed(INDEX_TIMEOUT);
        Ok(())
    }
}

pub fn parse_zettel(zid: Zid, text: &[u8]) -> Result<Zettel, AppError> {
    let (meta, content_start) = Meta::parse_header(zid, text)?;
    let content = Content::new(text[content_start..].to_vec());
    Ok(Zettel::new(meta, content))
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Config(ConfigError),
    Box(BoxError),
    Query(QueryError),
    Meta(ParseMetaError),
    Json(serde_json::Error),
    StartTimeout,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Box(err) => write!(f, "{}", err),
            AppError::Query(err) => write!(f, "query error: {}", err),
            AppError::Meta(err) => write!(f, "{}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::StartTimeout => write!(f, "boxes did not become ready in time"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Box(err) => Some(err),
            AppError::Query(err) => Some(err),
            AppError::Meta(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::StartTimeout => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<BoxError> for AppError {
    fn from(value: BoxError) -> Self {
        AppError::Box(value)
    }
}

impl From<QueryError> for AppError {
    fn from(value: QueryError) -> Self {
        AppError::Query(value)
    }
}

impl From<ParseMetaError> for AppError {
    fn from(value: ParseMetaError) -> Self {
        AppError::Meta(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Json(value)
    }
}

#[cfg(test)]
mod tests;
