use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A scheme-addressed store location such as `file:///var/data/in` or
/// `mem://landing`. The part after `scheme://` is opaque here; the provider
/// behind the scheme decides what it means.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    scheme: String,
    path: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location `{0}` is missing a `scheme://` prefix")]
    MissingScheme(String),

    #[error("location `{0}` has an empty scheme")]
    EmptyScheme(String),
}

impl Location {
    pub fn parse(value: &str) -> Result<Self, LocationError> {
        let (scheme, path) = value
            .split_once("://")
            .ok_or_else(|| LocationError::MissingScheme(value.to_string()))?;
        if scheme.is_empty() {
            return Err(LocationError::EmptyScheme(value.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

impl TryFrom<String> for Location {
    type Error = LocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Location::parse(&value)
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        value.to_string()
    }
}
