// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::profiles;

/// Lens profile, keyed by the decimal profile id.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub id: String,
    pub profile_id: i64,
    pub address: Option<String>,
    pub handle: Option<String>,
    pub image_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Placeholder for a profile referenced before its ProfileCreated event was seen.
    pub fn stub(profile_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: profile_key(profile_id),
            profile_id,
            address: None,
            handle: None,
            image_uri: None,
            created_at,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.handle.is_none() && self.address.is_none()
    }
}

pub fn profile_key(profile_id: i64) -> String {
    profile_id.to_string()
}
