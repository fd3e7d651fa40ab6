use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};

/// Upstream platform a token or webhook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    EcCube,
    Mautic,
}

impl Platform {
    /// Route segment used under `/auth/`.
    pub fn slug(self) -> &'static str {
        match self {
            Self::EcCube => "ec",
            Self::Mautic => "mt",
        }
    }

    /// File name the bearer token is persisted under.
    pub fn token_file_name(self) -> &'static str {
        match self {
            Self::EcCube => "ecToken.txt",
            Self::Mautic => "mtToken.txt",
        }
    }

    /// Label used for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EcCube => "eccube",
            Self::Mautic => "mautic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque OAuth bearer token. `Debug` output never includes the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// EC-CUBE customer identifier.
///
/// Accepted from JSON as either a number or a numeric string and always
/// serialised back as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CustomerId(u64);

impl CustomerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CustomerId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(Self)
    }
}

impl<'de> Deserialize<'de> for CustomerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Ok(Self(value)),
            RawId::Text(text) => text.parse().map_err(|_| {
                de::Error::custom(format!("customer id must be numeric (got {text:?})"))
            }),
        }
    }
}

/// Customer record as returned by the EC-CUBE GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomerRecord {
    pub id: CustomerId,
    /// Family name.
    #[serde(default)]
    pub name01: Option<String>,
    /// Given name.
    #[serde(default)]
    pub name02: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}
