// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use bitflags::bitflags;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

bitflags! {
    /// Bitmask over the supported TDX architecture specification revisions.
    ///
    /// A case's `version` field is an OR of one or more revisions, meaning
    /// "applicable under any of these"; the active filter for a run is also
    /// a `SpecVersion`, and a case is in scope when the two intersect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpecVersion: u8 {
        /// TDX 1.0
        const V1_0 = 1;
        /// TDX 1.5
        const V1_5 = 1 << 1;
        /// TDX 2.0
        const V2_0 = 1 << 2;
    }
}

impl SpecVersion {
    /// Resolves a free-text version token into the active version bitmask.
    ///
    /// Only the first matching substring in 1.0 > 1.5 > 2.0 priority order
    /// governs. Anything else, including an empty token or "generic", selects
    /// the full union so that unrecognized tokens run everything rather than
    /// nothing.
    pub fn resolve(token: &str) -> Self {
        if token.contains("1.0") {
            Self::V1_0
        } else if token.contains("1.5") {
            Self::V1_5
        } else if token.contains("2.0") {
            Self::V2_0
        } else {
            Self::all()
        }
    }

    /// Label for a single-revision mask; multi-revision masks have none.
    pub fn label(self) -> &'static str {
        if self == Self::V1_0 {
            "1.0"
        } else if self == Self::V1_5 {
            "1.5"
        } else if self == Self::V2_0 {
            "2.0"
        } else {
            ""
        }
    }

    /// Whether a case declared with `self` runs under the `active` filter.
    pub fn applies(self, active: SpecVersion) -> bool {
        self.intersects(active)
    }
}

impl Serialize for SpecVersion {
    /// Serialize as the list of revision labels, e.g. `["1.0", "1.5"]`.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.bits().count_ones() as usize))?;
        for revision in [Self::V1_0, Self::V1_5, Self::V2_0] {
            if self.contains(revision) {
                seq.serialize_element(revision.label())?;
            }
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_single_versions() {
        assert_eq!(SpecVersion::resolve("1.0"), SpecVersion::V1_0);
        assert_eq!(SpecVersion::resolve("1.5"), SpecVersion::V1_5);
        assert_eq!(SpecVersion::resolve("2.0"), SpecVersion::V2_0);
        assert_eq!(SpecVersion::resolve("tdx-1.5-beta"), SpecVersion::V1_5);
    }

    #[test]
    fn test_resolve_defaults_to_all() {
        assert_eq!(SpecVersion::resolve(""), SpecVersion::all());
        assert_eq!(SpecVersion::resolve("generic"), SpecVersion::all());
        assert_eq!(SpecVersion::resolve("3.0"), SpecVersion::all());
    }

    #[test]
    fn test_resolve_priority_order() {
        // "1.0" wins over "1.5" regardless of position in the token.
        assert_eq!(SpecVersion::resolve("1.5 1.0"), SpecVersion::V1_0);
        assert_eq!(SpecVersion::resolve("1.5 2.0"), SpecVersion::V1_5);
    }

    #[test]
    fn test_applies_is_intersection() {
        let case = SpecVersion::V1_0 | SpecVersion::V2_0;
        assert!(case.applies(SpecVersion::V1_0));
        assert!(case.applies(SpecVersion::all()));
        assert!(!case.applies(SpecVersion::V1_5));
    }

    #[test]
    fn test_serialize_as_labels() {
        let version = SpecVersion::V1_0 | SpecVersion::V1_5;
        assert_eq!(
            serde_json::to_value(version).unwrap(),
            serde_json::json!(["1.0", "1.5"])
        );
        assert_eq!(
            serde_json::to_value(SpecVersion::V2_0).unwrap(),
            serde_json::json!(["2.0"])
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(SpecVersion::V1_0.label(), "1.0");
        assert_eq!(SpecVersion::V1_5.label(), "1.5");
        assert_eq!(SpecVersion::V2_0.label(), "2.0");
        assert_eq!(SpecVersion::all().label(), "");
    }
}
