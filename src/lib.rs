// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod http;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod schema;
pub mod search;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod worker;
