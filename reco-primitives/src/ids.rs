//! Entity and item identifier types.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Opaque identifier of a remembered entity (a user, in recommender terms).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an identifier after rejecting empty or whitespace-only values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntityId`] when the value is blank.
    pub fn new(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::InvalidEntityId {
                id: value,
                reason: "entity id must not be blank",
            });
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

/// Identifier of an item in the catalog.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item identifier after rejecting empty or whitespace-only values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItemId`] when the value is blank.
    pub fn new(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::InvalidItemId {
                id: value,
                reason: "item id must not be blank",
            });
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_ids() {
        let err = EntityId::new("  ").expect_err("blank entity id");
        assert!(matches!(err, Error::InvalidEntityId { .. }));

        let err = "".parse::<ItemId>().expect_err("empty item id");
        assert!(matches!(err, Error::InvalidItemId { .. }));
    }

    #[test]
    fn keeps_non_blank_values_verbatim() {
        let id = EntityId::new(" u1 ").unwrap();
        assert_eq!(id.as_str(), " u1 ");
        assert_eq!(ItemId::new("0").unwrap().to_string(), "0");
    }

    #[test]
    fn serializes_transparently() {
        let id = EntityId::new("u1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u1\"");

        let parsed: ItemId = serde_json::from_str("\"movie-42\"").unwrap();
        assert_eq!(parsed.as_str(), "movie-42");

        let err = serde_json::from_str::<EntityId>("\"\"");
        assert!(err.is_err());
    }
}
