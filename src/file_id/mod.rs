use crate::PathPair;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Marker prepended to provisional ids.
pub const PROVISIONAL_PREFIX: &str = "PROV_";

const SEPARATOR: char = '\0';
const CANONICAL_UUID_LEN: usize = 36;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileIdError {
    #[error("malformed file identifier '{input}': {reason}")]
    MalformedIdentifier { input: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FileIdError>;

/// Identity of a file as seen by clients.
///
/// Files with persisted discussion state have a UUID. Files that don't are
/// identified by their path pair until they get one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientFileId {
    Persistent(Uuid),
    Provisional(PathPair),
}

impl ClientFileId {
    pub fn persistent(id: Uuid) -> Self {
        ClientFileId::Persistent(id)
    }

    pub fn provisional(path: PathPair) -> Self {
        ClientFileId::Provisional(path)
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, ClientFileId::Provisional(_))
    }

    pub fn persistent_id(&self) -> Option<Uuid> {
        match self {
            ClientFileId::Persistent(id) => Some(*id),
            ClientFileId::Provisional(_) => None,
        }
    }

    pub fn provisional_path(&self) -> Option<&PathPair> {
        match self {
            ClientFileId::Persistent(_) => None,
            ClientFileId::Provisional(path) => Some(path),
        }
    }
}

/// Parse a client file id from its wire form.
pub fn parse(text: &str) -> Result<ClientFileId> {
    let malformed = |reason: &str| FileIdError::MalformedIdentifier {
        input: text.to_owned(),
        reason: reason.to_owned(),
    };

    if let Some(encoded) = text.strip_prefix(PROVISIONAL_PREFIX) {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| malformed(&format!("invalid base64: {e}")))?;
        let decoded = String::from_utf8(bytes).map_err(|_| malformed("paths are not valid UTF-8"))?;

        let path = match decoded.split_once(SEPARATOR) {
            Some((old_path, new_path)) => PathPair::new(old_path, new_path),
            None => PathPair::single(decoded),
        };
        return Ok(ClientFileId::Provisional(path));
    }

    if text.len() != CANONICAL_UUID_LEN {
        return Err(malformed("not a hyphenated UUID"));
    }
    let id = Uuid::try_parse(text).map_err(|e| malformed(&e.to_string()))?;
    Ok(ClientFileId::Persistent(id))
}

/// Render a client file id in its wire form.
pub fn write(id: &ClientFileId) -> String {
    match id {
        ClientFileId::Persistent(id) => id.hyphenated().to_string(),
        ClientFileId::Provisional(path) => {
            let joined = format!("{}{}{}", path.old_path, SEPARATOR, path.new_path);
            format!("{PROVISIONAL_PREFIX}{}", STANDARD.encode(joined))
        }
    }
}

impl FromStr for ClientFileId {
    type Err = FileIdError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

impl fmt::Display for ClientFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write(self))
    }
}

impl Serialize for ClientFileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&write(self))
    }
}

impl<'de> Deserialize<'de> for ClientFileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}
