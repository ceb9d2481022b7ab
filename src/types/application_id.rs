// ABOUTME: Validated application identifier.
// ABOUTME: Application ids double as service names, so they follow RFC 1123 label rules.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplicationIdError {
    #[error("application id cannot be empty")]
    Empty,

    #[error("application id exceeds maximum length of 63 characters")]
    TooLong,

    #[error("application id cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("application id must be lowercase")]
    NotLowercase,

    #[error("invalid character in application id: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(value: &str) -> Result<Self, ApplicationIdError> {
        if value.is_empty() {
            return Err(ApplicationIdError::Empty);
        }
        if value.len() > 63 {
            return Err(ApplicationIdError::TooLong);
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(ApplicationIdError::EdgeHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ApplicationIdError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ApplicationIdError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ApplicationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ApplicationId::new(&s).map_err(serde::de::Error::custom)
    }
}
