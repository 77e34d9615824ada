use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevisionError {
    #[error("'{0}' is not a valid revision id")]
    InvalidRevision(String),
}

pub type Result<T> = std::result::Result<T, RevisionError>;

const HASH_LEN: usize = 40;

/// A point in a file's history.
///
/// Revision ids carry no ordering of their own: a matrix decides where each id
/// sits in its revision sequence, and `Base` always comes before all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RevisionId {
    /// The merge base the review started from.
    Base,
    /// A pushed revision, counted from 1.
    Numbered(u32),
    /// A head commit that has no revision number yet.
    Hash(String),
}

impl RevisionId {
    pub fn is_base(&self) -> bool {
        matches!(self, RevisionId::Base)
    }
}

impl FromStr for RevisionId {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "base" {
            return Ok(RevisionId::Base);
        }

        if let Ok(n) = s.parse::<u32>() {
            if n > 0 {
                return Ok(RevisionId::Numbered(n));
            }
            return Err(RevisionError::InvalidRevision(s.to_owned()));
        }

        if s.len() == HASH_LEN && s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(RevisionId::Hash(s.to_owned()));
        }

        Err(RevisionError::InvalidRevision(s.to_owned()))
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionId::Base => f.write_str("base"),
            RevisionId::Numbered(n) => write!(f, "{n}"),
            RevisionId::Hash(hash) => f.write_str(hash),
        }
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RevisionId::Base => serializer.serialize_str("base"),
            RevisionId::Numbered(n) => serializer.serialize_u32(*n),
            RevisionId::Hash(hash) => serializer.serialize_str(hash),
        }
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(RevisionIdVisitor)
    }
}

struct RevisionIdVisitor;

impl Visitor<'_> for RevisionIdVisitor {
    type Value = RevisionId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"base\", a positive revision number or a 40-character commit hash")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RevisionId, E> {
        match u32::try_from(v) {
            Ok(n) if n > 0 => Ok(RevisionId::Numbered(n)),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RevisionId, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RevisionId, E> {
        v.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn parses_all_forms() {
        assert_eq!("base".parse(), Ok(RevisionId::Base));
        assert_eq!("3".parse(), Ok(RevisionId::Numbered(3)));
        assert_eq!(HEAD.parse(), Ok(RevisionId::Hash(HEAD.to_string())));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!("0".parse::<RevisionId>().is_err());
        assert!("Base".parse::<RevisionId>().is_err());
        assert!("abc123".parse::<RevisionId>().is_err());
        assert!("".parse::<RevisionId>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for text in ["base", "12", HEAD] {
            let id: RevisionId = text.parse().unwrap();
            assert_eq!(id.to_string(), text);
        }
    }

    #[test]
    fn serializes_number_as_integer() {
        assert_eq!(serde_json::to_string(&RevisionId::Base).unwrap(), r#""base""#);
        assert_eq!(serde_json::to_string(&RevisionId::Numbered(4)).unwrap(), "4");
        assert_eq!(
            serde_json::to_string(&RevisionId::Hash(HEAD.to_string())).unwrap(),
            format!("\"{HEAD}\"")
        );
    }

    #[test]
    fn deserializes_integer_or_string() {
        let a: RevisionId = serde_json::from_str("7").unwrap();
        let b: RevisionId = serde_json::from_str(r#""7""#).unwrap();
        assert_eq!(a, RevisionId::Numbered(7));
        assert_eq!(a, b);
        assert!(serde_json::from_str::<RevisionId>("0").is_err());
        assert!(serde_json::from_str::<RevisionId>("-1").is_err());
    }
}
