use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use zbus::zvariant::Type;

/// A handle token is the last element of a request object path.
///
/// The portal builds the request path as
/// `/org/freedesktop/portal/desktop/request/SENDER/TOKEN`, so the token only
/// contains the ASCII characters `[A-Z][a-z][0-9]_`.
#[derive(Serialize, Type, PartialEq, Eq, Hash, Clone)]
pub struct HandleToken(String);

impl HandleToken {
    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandleToken").field(&self.0).finish()
    }
}

impl Default for HandleToken {
    fn default() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        Self(format!("ldu_{suffix}"))
    }
}

/// Why a string is not a valid handle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidHandleToken {
    /// The token is empty.
    Empty,
    /// The token contains a character outside `[A-Za-z0-9_]`.
    Character(char),
}

impl Display for InvalidHandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty handle token"),
            Self::Character(c) => write!(f, "Invalid Character {c}"),
        }
    }
}

impl std::error::Error for InvalidHandleToken {}

impl FromStr for HandleToken {
    type Err = InvalidHandleToken;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(InvalidHandleToken::Empty);
        }
        if let Some(invalid) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_')
        {
            return Err(InvalidHandleToken::Character(invalid));
        }
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for HandleToken {
    type Error = InvalidHandleToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse::<Self>()
    }
}

impl TryFrom<&str> for HandleToken {
    type Error = InvalidHandleToken;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse::<Self>()
    }
}

impl<'de> Deserialize<'de> for HandleToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        token
            .parse::<Self>()
            .map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::{HandleToken, InvalidHandleToken};

    #[test]
    fn handle_token() {
        assert!(HandleToken::from_str("token").is_ok());

        let token = HandleToken::from_str("LDU_42").unwrap();
        assert_eq!(token.to_string(), "LDU_42");

        assert_eq!(HandleToken::from_str(""), Err(InvalidHandleToken::Empty));
        assert_eq!(
            HandleToken::from_str("a.b"),
            Err(InvalidHandleToken::Character('.'))
        );
        assert!(HandleToken::from_str("/test").is_err());
        assert!(HandleToken::from_str("تجربة").is_err());
    }

    #[test]
    fn default_tokens_are_valid_and_distinct() {
        let first = HandleToken::default();
        let second = HandleToken::default();
        assert!(first.as_str().starts_with("ldu_"));
        assert_eq!(first.as_str().len(), 14);
        assert!(HandleToken::from_str(first.as_str()).is_ok());
        assert_ne!(first, second);
    }

    #[test]
    fn deserialize_rejects_invalid() {
        let token: HandleToken = serde_json::from_str("\"ok_token\"").unwrap();
        assert_eq!(token.as_str(), "ok_token");
        assert!(serde_json::from_str::<HandleToken>("\"not-ok\"").is_err());
        assert!(serde_json::from_str::<HandleToken>("\"\"").is_err());
    }
}
