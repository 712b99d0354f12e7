// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a publication's `(profile_id, pub_id)` pair is folded into one string key.
///
/// `Difference` reproduces the keys written by the first generation of the
/// indexer (`profile_id - pub_id`). Distinct pairs with equal differences
/// alias to the same row under that scheme, so it only exists to keep reading
/// databases that were populated with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeKeyScheme {
    #[default]
    Concatenated,
    Difference,
}

impl CompositeKeyScheme {
    pub fn key(self, profile_id: i64, pub_id: i64) -> String {
        match self {
            CompositeKeyScheme::Concatenated => format!("{profile_id}-{pub_id}"),
            CompositeKeyScheme::Difference => {
                (i128::from(profile_id) - i128::from(pub_id)).to_string()
            }
        }
    }
}

impl FromStr for CompositeKeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concatenated" => Ok(CompositeKeyScheme::Concatenated),
            "difference" => Ok(CompositeKeyScheme::Difference),
            other => Err(format!("unknown composite key scheme: {other}")),
        }
    }
}

/// `(profile_id, pub_id)` pair, printed the way Lens tooling prints publication ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubRef {
    pub profile_id: i64,
    pub pub_id: i64,
}

impl PubRef {
    pub fn new(profile_id: i64, pub_id: i64) -> Self {
        Self { profile_id, pub_id }
    }
}

impl fmt::Display for PubRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.profile_id, self.pub_id)
    }
}
