//! Issue and hotspot classifications with fixed-key counters
//!
//! The enumerated dimensions (issue type, severity, hotspot review status)
//! are closed sets: unrecognised or missing wire values normalise to
//! `Unknown` instead of opening a new bucket.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// A closed set of keys that can be tallied
pub trait CountKey: Copy + Eq + fmt::Debug + 'static {
    /// Every key, in output order
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Normalise a wire value (anything unrecognised maps to the fallback key)
    fn parse(value: &str) -> Self;
}

macro_rules! count_key {
    (
        $(#[$meta:meta])*
        $name:ident, missing = $missing:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
        }

        impl CountKey for $name {
            const ALL: &'static [Self] = &[$($name::$variant,)+];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            fn parse(value: &str) -> Self {
                match value {
                    $($wire => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$missing
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Option::<String>::deserialize(deserializer)?;
                Ok(value.as_deref().map(Self::parse).unwrap_or_default())
            }
        }
    };
}

count_key! {
    /// Issue type as reported by the server
    IssueType, missing = Unknown {
        Bug => "BUG",
        Vulnerability => "VULNERABILITY",
        CodeSmell => "CODE_SMELL",
        SecurityHotspot => "SECURITY_HOTSPOT",
        Unknown => "UNKNOWN",
    }
}

count_key! {
    /// Issue severity, most severe first
    Severity, missing = Unknown {
        Blocker => "BLOCKER",
        Critical => "CRITICAL",
        Major => "MAJOR",
        Minor => "MINOR",
        Info => "INFO",
        Unknown => "UNKNOWN",
    }
}

count_key! {
    /// Review status of a security hotspot. A hotspot without a status has
    /// not been looked at yet.
    HotspotStatus, missing = ToReview {
        ToReview => "TO_REVIEW",
        Reviewed => "REVIEWED",
        Unknown => "UNKNOWN",
    }
}

/// Fixed-key counter: every key of `K` starts at zero.
///
/// Serialises as a JSON object holding only the non-zero keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Tally<K: CountKey> {
    counts: Vec<u64>,
    marker: PhantomData<K>,
}

impl<K: CountKey> Tally<K> {
    pub fn new() -> Self {
        Self {
            counts: vec![0; K::ALL.len()],
            marker: PhantomData,
        }
    }

    fn slot(key: K) -> usize {
        K::ALL
            .iter()
            .position(|k| *k == key)
            .unwrap_or(K::ALL.len() - 1)
    }

    pub fn increment(&mut self, key: K) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: K, n: u64) {
        self.counts[Self::slot(key)] += n;
    }

    pub fn get(&self, key: K) -> u64 {
        self.counts[Self::slot(key)]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Non-zero entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (K, u64)> + '_ {
        K::ALL
            .iter()
            .zip(self.counts.iter())
            .filter(|(_, n)| **n > 0)
            .map(|(k, n)| (*k, *n))
    }
}

impl<K: CountKey> Default for Tally<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CountKey> fmt::Debug for Tally<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, n)| (k.as_str(), n)))
            .finish()
    }
}

impl<K: CountKey> Serialize for Tally<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<_> = self.iter().collect();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, n) in entries {
            map.serialize_entry(key.as_str(), &n)?;
        }
        map.end()
    }
}

impl<'de, K: CountKey> Deserialize<'de> for Tally<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, u64>::deserialize(deserializer)?;
        let mut tally = Tally::new();
        for (key, n) in raw {
            tally.add(K::parse(&key), n);
        }
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_unknown_values() {
        assert_eq!(Severity::parse("BLOCKER"), Severity::Blocker);
        assert_eq!(Severity::parse("blocker"), Severity::Unknown);
        assert_eq!(IssueType::parse("CODE_SMELL"), IssueType::CodeSmell);
        assert_eq!(IssueType::parse("SOMETHING_NEW"), IssueType::Unknown);
        assert_eq!(HotspotStatus::default(), HotspotStatus::ToReview);
        assert_eq!(Severity::default(), Severity::Unknown);
    }

    #[test]
    fn test_deserialize_missing_and_null() {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default)]
            severity: Severity,
            #[serde(default)]
            status: HotspotStatus,
        }
        let w: Wire = serde_json::from_str(r#"{"severity": null}"#).unwrap();
        assert_eq!(w.severity, Severity::Unknown);
        assert_eq!(w.status, HotspotStatus::ToReview);
    }

    #[test]
    fn test_tally_serializes_only_non_zero() {
        let mut tally: Tally<Severity> = Tally::new();
        tally.increment(Severity::Major);
        tally.increment(Severity::Major);
        tally.increment(Severity::Blocker);

        let json = serde_json::to_value(&tally).unwrap();
        assert_eq!(json, serde_json::json!({"BLOCKER": 1, "MAJOR": 2}));
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.get(Severity::Info), 0);

        let back: Tally<Severity> = serde_json::from_value(json).unwrap();
        assert_eq!(back, tally);
    }
}
