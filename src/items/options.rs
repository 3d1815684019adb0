//! Line Options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Values an option key accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionChoices {
    /// One of a fixed list, e.g. sizes.
    Choices(SmallVec<[String; 4]>),

    /// Any text, e.g. a monogram.
    FreeText(FreeText),
}

/// Marker for free-text options, written as `text` in fixtures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeText {
    /// Accept any value.
    Text,
}

impl OptionChoices {
    /// Free-text choice.
    pub const fn free_text() -> Self {
        Self::FreeText(FreeText::Text)
    }

    /// Fixed list of choices.
    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(values.into_iter().map(Into::into).collect())
    }

    /// Whether `value` is allowed.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::FreeText(_) => true,
            Self::Choices(values) => values.iter().any(|allowed| allowed == value),
        }
    }

    /// First choice, used as the default for fixed lists.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::FreeText(_) => None,
            Self::Choices(values) => values.first().map(String::as_str),
        }
    }
}

/// Options chosen for a cart line.
///
/// Keys are kept sorted so two lines with the same options compare equal no
/// matter the order they were submitted in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineOptions(BTreeMap<String, String>);

impl LineOptions {
    /// No options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` if there are no options.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Strip unknown keys and disallowed values.
    #[must_use]
    pub fn validated(&self, available: &[(String, OptionChoices)]) -> Self {
        let kept = self
            .0
            .iter()
            .filter(|(key, value)| {
                available
                    .iter()
                    .any(|(name, choices)| name == *key && choices.accepts(value))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self(kept)
    }

    /// Valid options, with missing fixed-choice keys set to their first
    /// choice. Lines are matched on the normalised options.
    #[must_use]
    pub fn normalised(&self, available: &[(String, OptionChoices)]) -> Self {
        let mut options = Self::defaults(available);
        options.0.extend(self.validated(available).0);

        options
    }

    /// First value of each fixed-choice option.
    pub fn defaults(available: &[(String, OptionChoices)]) -> Self {
        Self(
            available
                .iter()
                .filter_map(|(name, choices)| {
                    choices.first().map(|value| (name.clone(), value.to_string()))
                })
                .collect(),
        )
    }
}

impl<K, V> FromIterator<(K, V)> for LineOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
