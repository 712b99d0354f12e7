// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use diesel::allow_tables_to_appear_in_same_query;
use diesel::joinable;
use diesel::table;

table! {
    profiles (id) {
        id -> Varchar,
        profile_id -> Int8,
        address -> Nullable<Varchar>,
        handle -> Nullable<Varchar>,
        image_uri -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

table! {
    posts (id) {
        id -> Varchar,
        post_id -> Int8,
        profile_id -> Int8,
        content_uri -> Nullable<Text>,
        creator_profile_id -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    comments (id) {
        id -> Varchar,
        comment_id -> Int8,
        profile_id -> Int8,
        content_uri -> Nullable<Text>,
        commenter_profile_id -> Varchar,
        post_id -> Varchar,
        original_post_id -> Int8,
        original_post_ref -> Varchar,
        original_profile_id -> Int8,
        original_profile_ref -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    indexer_progress (id) {
        id -> Varchar,
        last_block_processed -> Int8,
        last_processed_at -> Timestamptz,
    }
}

joinable!(posts -> profiles (creator_profile_id));

allow_tables_to_appear_in_same_query!(
    profiles,
    posts,
    comments,
    indexer_progress,
);
