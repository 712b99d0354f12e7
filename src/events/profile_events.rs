// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::abi::{self, AbiData};
use super::{timestamp_from_secs, DecodeError, RawLogEntry};
use crate::models::profile::{profile_key, Profile};

/// Event emitted when a new profile NFT is minted.
///
/// `ProfileCreated(uint256 indexed profileId, address indexed creator,
/// address indexed to, string handle, string imageURI, address followModule,
/// bytes followModuleReturnData, string followNFTURI, uint256 timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCreatedEvent {
    pub profile_id: i64,
    pub to: String,
    pub handle: String,
    pub image_uri: String,
    pub created_at: DateTime<Utc>,
}

impl ProfileCreatedEvent {
    pub fn decode(entry: &RawLogEntry) -> Result<Self, DecodeError> {
        let profile_id = abi::topic_uint(entry.topic(1)?)?;
        let to = abi::topic_address(entry.topic(3)?)?;

        let data = AbiData::from_hex(&entry.data)?;
        Ok(Self {
            profile_id,
            to,
            handle: data.string(0)?,
            image_uri: data.string(1)?,
            created_at: timestamp_from_secs(data.uint(5)?)?,
        })
    }

    /// Convert the event into a fully populated Profile model
    pub fn into_model(&self) -> Profile {
        Profile {
            id: profile_key(self.profile_id),
            profile_id: self.profile_id,
            address: Some(self.to.clone()),
            handle: Some(self.handle.clone()),
            image_uri: Some(self.image_uri.clone()),
            created_at: self.created_at,
        }
    }
}
