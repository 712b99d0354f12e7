// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::comments;

/// A comment publication. Comments share the post key space, so `post_id`
/// always equals `id` under the same key scheme.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: String,
    pub comment_id: i64,
    pub profile_id: i64,
    pub content_uri: Option<String>,
    pub commenter_profile_id: String,
    pub post_id: String,
    // Raw ids of the publication being commented on
    pub original_post_id: i64,
    pub original_post_ref: String,
    pub original_profile_id: i64,
    pub original_profile_ref: String,
    pub created_at: DateTime<Utc>,
}
