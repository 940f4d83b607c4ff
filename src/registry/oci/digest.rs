use regex::Regex;
use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use crate::registry::oci::Error;

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<algorithm>[a-z0-9]+):(?P<hash>[a-f0-9]{64})$").unwrap()
});

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Digest {
    Sha256(String),
}

impl Digest {
    pub fn algorithm(&self) -> &str {
        match self {
            Digest::Sha256(_) => "sha256",
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            Digest::Sha256(s) => s,
        }
    }

    pub fn hash_prefix(&self) -> &str {
        let hash = self.hash();
        hash.get(0..2).unwrap_or(hash)
    }
}

impl TryFrom<&str> for Digest {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let Some(captures) = DIGEST_RE.captures(s.trim()) else {
            return Err(Error::InvalidFormat(format!("Invalid digest: '{s}'")));
        };

        match &captures["algorithm"] {
            "sha256" => Ok(Digest::Sha256(captures["hash"].to_string())),
            algorithm => Err(Error::InvalidFormat(format!(
                "Unsupported digest algorithm: '{algorithm}'"
            ))),
        }
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm(), self.hash())
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Digest, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DigestVisitor;

        impl Visitor<'_> for DigestVisitor {
            type Value = Digest;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                formatter.write_str("a valid digest string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Digest, E>
            where
                E: de::Error,
            {
                Digest::try_from(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}
