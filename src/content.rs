use std::error::Error;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::meta::Meta;

pub const ENCODING_BASE64: &str = "base64";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    data: Vec<u8>,
    is_binary: bool,
}

impl Content {
    pub fn new(data: Vec<u8>) -> Self {
        let is_binary = calc_is_binary(&data);
        Self { data, is_binary }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes())
    }

    pub fn is_binary(&self) -> bool {
        self.is_binary
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_text(&self) -> Option<&str> {
        if self.is_binary {
            None
        } else {
            std::str::from_utf8(&self.data).ok()
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn trim_space(&mut self) {
        if self.is_binary {
            return;
        }
        let Some(text) = self.as_text() else {
            return;
        };
        let trimmed = text.trim();
        if trimmed.len() != self.data.len() {
            self.data = trimmed.as_bytes().to_vec();
        }
    }

    pub fn encode(&self) -> (String, &'static str) {
        match self.as_text() {
            Some(text) => (text.to_string(), ""),
            None => (STANDARD.encode(&self.data), ENCODING_BASE64),
        }
    }

    pub fn set_decoded(&mut self, data: &str, encoding: &str) -> Result<(), DecodeError> {
        match encoding {
            "" => {
                *self = Content::from_text(data);
                Ok(())
            }
            ENCODING_BASE64 => {
                let bytes = STANDARD.decode(data.trim())?;
                *self = Content::new(bytes);
                Ok(())
            }
            other => Err(DecodeError::UnknownEncoding(other.to_string())),
        }
    }
}

fn calc_is_binary(data: &[u8]) -> bool {
    data.contains(&0) || std::str::from_utf8(data).is_err()
}

#[derive(Debug)]
pub enum DecodeError {
    UnknownEncoding(String),
    Base64(base64::DecodeError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownEncoding(name) => write!(f, "unknown content encoding '{}'", name),
            DecodeError::Base64(err) => write!(f, "invalid base64 content: {}", err),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeError::UnknownEncoding(_) => None,
            DecodeError::Base64(err) => Some(err),
        }
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(value: base64::DecodeError) -> Self {
        DecodeError::Base64(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zettel {
    pub meta: Meta,
    pub content: Content,
}

impl Zettel {
    pub fn new(meta: Meta, content: Content) -> Self {
        Self { meta, content }
    }

    pub fn len(&self) -> usize {
        self.meta.byte_len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
