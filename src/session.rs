//! Sessions
//!
//! Request-scoped key/value storage. Values are stored as JSON so anything
//! serde can handle can be kept in a session, the same way a web framework's
//! session backend would.

use rustc_hash::FxHashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{regions::RegionKey, store::UserId, uuids::TypedUuid};

/// Session id.
pub type SessionId = TypedUuid<Session>;

/// A visitor's session.
#[derive(Debug, Default)]
pub struct Session {
    id: SessionId,
    data: FxHashMap<String, Value>,
    modified: bool,
    user: Option<UserId>,
    region: Option<RegionKey>,
}

impl Session {
    /// New anonymous session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Logged in user, if any.
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    /// Mark the session as belonging to `user`.
    pub fn set_user(&mut self, user: Option<UserId>) {
        self.user = user;
        self.modified = true;
    }

    /// Selected region.
    pub fn region(&self) -> Option<RegionKey> {
        self.region
    }

    /// Select a region.
    pub fn set_region(&mut self, region: Option<RegionKey>) {
        self.region = region;
        self.modified = true;
    }

    /// Read and deserialise the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value doesn't deserialise as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
    }

    /// Serialise and store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` can't be serialised.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        self.modified = true;

        Ok(())
    }

    /// Remove the value under `key`.
    pub fn remove(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.modified = true;
        }
    }

    /// Whether anything has been written since the session was loaded.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn stores_values_as_json() -> TestResult {
        let mut session = Session::new();

        session.set("count", &3u32)?;

        assert_eq!(session.get::<u32>("count")?, Some(3));
        assert!(session.is_modified(), "writes should mark the session");

        Ok(())
    }

    #[test]
    fn missing_key_is_none() -> TestResult {
        let session = Session::new();

        assert_eq!(session.get::<u32>("count")?, None);
        assert!(!session.is_modified(), "reads should not mark the session");

        Ok(())
    }

    #[test]
    fn wrong_type_is_an_error() -> TestResult {
        let mut session = Session::new();
        session.set("count", &"three")?;

        assert!(session.get::<u32>("count").is_err());

        Ok(())
    }
}
