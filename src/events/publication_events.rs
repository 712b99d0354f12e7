// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::abi::{self, AbiData};
use super::{timestamp_from_secs, DecodeError, RawLogEntry};
use crate::reconcile::PubRef;

/// `PostCreated(uint256 indexed profileId, uint256 indexed pubId,
/// string contentURI, address collectModule, bytes collectModuleReturnData,
/// address referenceModule, bytes referenceModuleReturnData, uint256 timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCreatedEvent {
    pub profile_id: i64,
    pub pub_id: i64,
    pub content_uri: String,
    pub created_at: DateTime<Utc>,
}

impl PostCreatedEvent {
    pub fn decode(entry: &RawLogEntry) -> Result<Self, DecodeError> {
        let profile_id = abi::topic_uint(entry.topic(1)?)?;
        let pub_id = abi::topic_uint(entry.topic(2)?)?;

        let data = AbiData::from_hex(&entry.data)?;
        Ok(Self {
            profile_id,
            pub_id,
            content_uri: data.string(0)?,
            created_at: timestamp_from_secs(data.uint(5)?)?,
        })
    }

    pub fn pub_ref(&self) -> PubRef {
        PubRef::new(self.profile_id, self.pub_id)
    }
}

/// `CommentCreated(uint256 indexed profileId, uint256 indexed pubId,
/// string contentURI, uint256 profileIdPointed, uint256 pubIdPointed,
/// bytes referenceModuleData, address collectModule,
/// bytes collectModuleReturnData, address referenceModule,
/// bytes referenceModuleReturnData, uint256 timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentCreatedEvent {
    pub profile_id: i64,
    pub pub_id: i64,
    pub profile_id_pointed: i64,
    pub pub_id_pointed: i64,
    pub content_uri: String,
    pub created_at: DateTime<Utc>,
}

impl CommentCreatedEvent {
    pub fn decode(entry: &RawLogEntry) -> Result<Self, DecodeError> {
        let profile_id = abi::topic_uint(entry.topic(1)?)?;
        let pub_id = abi::topic_uint(entry.topic(2)?)?;

        let data = AbiData::from_hex(&entry.data)?;
        Ok(Self {
            profile_id,
            pub_id,
            content_uri: data.string(0)?,
            profile_id_pointed: data.uint(1)?,
            pub_id_pointed: data.uint(2)?,
            created_at: timestamp_from_secs(data.uint(8)?)?,
        })
    }

    pub fn pub_ref(&self) -> PubRef {
        PubRef::new(self.profile_id, self.pub_id)
    }

    pub fn pointed_ref(&self) -> PubRef {
        PubRef::new(self.profile_id_pointed, self.pub_id_pointed)
    }
}
