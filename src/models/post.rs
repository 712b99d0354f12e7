// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::posts;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    /// Composite key derived from (profile_id, post_id)
    pub id: String,
    pub post_id: i64,
    pub profile_id: i64,
    pub content_uri: Option<String>,
    /// Key of the creator's row in `profiles`
    pub creator_profile_id: String,
    pub created_at: DateTime<Utc>,
}
