// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod abi;
pub mod profile_events;
pub mod publication_events;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use profile_events::ProfileCreatedEvent;
pub use publication_events::{CommentCreatedEvent, PostCreatedEvent};

// keccak256 of the canonical Lens hub event signatures
pub const PROFILE_CREATED_TOPIC: &str =
    "0x4e14f57cff7910416f2ef43cf05019b5a97a313de71fec9344be11b9b88fed12";
pub const POST_CREATED_TOPIC: &str =
    "0xc672c38b4d26c3c978228e99164105280410b144af24dd3ed8e4f9d211d96a50";
pub const COMMENT_CREATED_TOPIC: &str =
    "0x7b4d1aa33773161799847429e4fbf29f56dbf1a3fe815f5070231cbfba402c37";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("topic must be 32 bytes, got {0}")]
    BadTopicLength(usize),

    #[error("missing topic {0}")]
    MissingTopic(usize),

    #[error("read of {len} bytes at offset {offset} exceeds payload of {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("numeric value does not fit a non-negative i64")]
    NumberOverflow,

    #[error("string parameter {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

/// Log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEntry {
    #[serde(deserialize_with = "quantity::deserialize")]
    pub block_number: u64,
    pub transaction_hash: String,
    #[serde(default, deserialize_with = "quantity::deserialize")]
    pub log_index: u32,
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// JSON-RPC quantities arrive as `0x`-prefixed hex strings; replayed files
/// may also carry plain numbers.
mod quantity {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        let value = match Quantity::deserialize(deserializer)? {
            Quantity::Number(n) => n,
            Quantity::Text(text) => parse(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid quantity {text:?}")))?,
        };
        T::try_from(value).map_err(|_| D::Error::custom(format!("quantity {value} out of range")))
    }

    fn parse(text: &str) -> Option<u64> {
        let text = text.trim();
        match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => text.parse().ok(),
        }
    }
}

impl RawLogEntry {
    pub(crate) fn topic(&self, index: usize) -> Result<&str, DecodeError> {
        self.topics
            .get(index)
            .map(String::as_str)
            .ok_or(DecodeError::MissingTopic(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ProfileCreated,
    PostCreated,
    CommentCreated,
}

impl EventKind {
    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic.eq_ignore_ascii_case(PROFILE_CREATED_TOPIC) {
            Some(EventKind::ProfileCreated)
        } else if topic.eq_ignore_ascii_case(POST_CREATED_TOPIC) {
            Some(EventKind::PostCreated)
        } else if topic.eq_ignore_ascii_case(COMMENT_CREATED_TOPIC) {
            Some(EventKind::CommentCreated)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProfileCreated => "ProfileCreated",
            EventKind::PostCreated => "PostCreated",
            EventKind::CommentCreated => "CommentCreated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LensEvent {
    ProfileCreated(ProfileCreatedEvent),
    PostCreated(PostCreatedEvent),
    CommentCreated(CommentCreatedEvent),
}

/// Typed events of one processing batch, each list in log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub profiles: Vec<ProfileCreatedEvent>,
    pub posts: Vec<PostCreatedEvent>,
    pub comments: Vec<CommentCreatedEvent>,
    /// Kinds of the entries that failed to decode and were dropped
    pub dropped: Vec<EventKind>,
}

impl EventBatch {
    pub fn push(&mut self, event: LensEvent) {
        match event {
            LensEvent::ProfileCreated(e) => self.profiles.push(e),
            LensEvent::PostCreated(e) => self.posts.push(e),
            LensEvent::CommentCreated(e) => self.comments.push(e),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len() + self.posts.len() + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns raw hub logs into typed events.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    contract_address: String,
}

impl EventDecoder {
    pub fn new(contract_address: &str) -> Self {
        Self {
            contract_address: contract_address.to_lowercase(),
        }
    }

    /// Kind of the event carried by `entry`, or `None` for logs this indexer
    /// does not follow.
    pub fn classify(&self, entry: &RawLogEntry) -> Option<EventKind> {
        if !entry.address.eq_ignore_ascii_case(&self.contract_address) {
            return None;
        }
        entry.topics.first().and_then(|t| EventKind::from_topic(t))
    }

    pub fn decode(&self, kind: EventKind, entry: &RawLogEntry) -> Result<LensEvent, DecodeError> {
        Ok(match kind {
            EventKind::ProfileCreated => {
                LensEvent::ProfileCreated(ProfileCreatedEvent::decode(entry)?)
            }
            EventKind::PostCreated => LensEvent::PostCreated(PostCreatedEvent::decode(entry)?),
            EventKind::CommentCreated => {
                LensEvent::CommentCreated(CommentCreatedEvent::decode(entry)?)
            }
        })
    }

    /// Decode every followed entry. A malformed entry is logged and dropped;
    /// it never fails the batch.
    pub fn decode_batch(&self, entries: &[RawLogEntry]) -> EventBatch {
        let mut batch = EventBatch::default();

        for entry in entries {
            let Some(kind) = self.classify(entry) else {
                continue;
            };

            match self.decode(kind, entry) {
                Ok(event) => batch.push(event),
                Err(e) => {
                    warn!(
                        kind = %kind,
                        tx_hash = %entry.transaction_hash,
                        block = entry.block_number,
                        log_index = entry.log_index,
                        error = %e,
                        "Failed to decode {} event, dropping it", kind
                    );
                    batch.dropped.push(kind);
                }
            }
        }

        debug!(
            profiles = batch.profiles.len(),
            posts = batch.posts.len(),
            comments = batch.comments.len(),
            dropped = batch.dropped.len(),
            "Decoded log entries"
        );
        batch
    }
}

pub(crate) fn timestamp_from_secs(
    secs: i64,
) -> Result<chrono::DateTime<chrono::Utc>, DecodeError> {
    chrono::DateTime::from_timestamp(secs, 0).ok_or(DecodeError::InvalidTimestamp(secs))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Raw log builders shared by the decoder and worker tests.

    use super::abi::encode::{self, Token};
    use super::*;

    pub const HUB: &str = "0xdb46d1dc155634fbc732f92e853b10b288ad5a1d";
    pub const OWNER: &str = "0x00000000000000000000000000000000000000a1";

    fn entry(block: u64, topics: Vec<String>, data: String) -> RawLogEntry {
        RawLogEntry {
            block_number: block,
            transaction_hash: format!("0x{:064x}", block),
            log_index: 0,
            address: HUB.to_string(),
            topics,
            data,
        }
    }

    pub fn profile_created(block: u64, profile_id: u64, handle: &str, ts: u64) -> RawLogEntry {
        entry(
            block,
            vec![
                PROFILE_CREATED_TOPIC.to_string(),
                encode::topic(profile_id),
                encode::address_topic(OWNER),
                encode::address_topic(OWNER),
            ],
            encode::data(&[
                Token::String(handle.to_string()),
                Token::String(format!("ipfs://avatar-{profile_id}")),
                Token::Address("0x0000000000000000000000000000000000000000"),
                Token::Bytes(Vec::new()),
                Token::String("ipfs://follow-nft".to_string()),
                Token::Uint(ts),
            ]),
        )
    }

    pub fn post_created(block: u64, profile_id: u64, pub_id: u64, uri: &str, ts: u64) -> RawLogEntry {
        entry(
            block,
            vec![
                POST_CREATED_TOPIC.to_string(),
                encode::topic(profile_id),
                encode::topic(pub_id),
            ],
            encode::data(&[
                Token::String(uri.to_string()),
                Token::Address("0x0000000000000000000000000000000000000c01"),
                Token::Bytes(vec![1, 2, 3]),
                Token::Address("0x0000000000000000000000000000000000000000"),
                Token::Bytes(Vec::new()),
                Token::Uint(ts),
            ]),
        )
    }

    pub fn comment_created(
        block: u64,
        profile_id: u64,
        pub_id: u64,
        pointed_profile: u64,
        pointed_pub: u64,
        uri: &str,
        ts: u64,
    ) -> RawLogEntry {
        entry(
            block,
            vec![
                COMMENT_CREATED_TOPIC.to_string(),
                encode::topic(profile_id),
                encode::topic(pub_id),
            ],
            encode::data(&[
                Token::String(uri.to_string()),
                Token::Uint(pointed_profile),
                Token::Uint(pointed_pub),
                Token::Bytes(Vec::new()),
                Token::Address("0x0000000000000000000000000000000000000c01"),
                Token::Bytes(Vec::new()),
                Token::Address("0x0000000000000000000000000000000000000000"),
                Token::Bytes(Vec::new()),
                Token::Uint(ts),
            ]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tracing_test::traced_test;

    fn decoder() -> EventDecoder {
        EventDecoder::new("0xDb46d1Dc155634FbC732f92E853b10B288AD5a1d")
    }

    #[test]
    fn decodes_all_three_kinds_in_log_order() {
        let entries = vec![
            profile_created(1, 7, "alice.lens", 1_650_000_000),
            post_created(1, 7, 1, "ipfs://bafy-post", 1_650_000_010),
            comment_created(2, 8, 1, 7, 1, "ipfs://bafy-comment", 1_650_000_020),
            post_created(2, 7, 2, "https://example.com/p.json", 1_650_000_030),
        ];

        let batch = decoder().decode_batch(&entries);

        assert_eq!(batch.profiles.len(), 1);
        assert_eq!(batch.profiles[0].handle, "alice.lens");
        assert_eq!(batch.profiles[0].image_uri, "ipfs://avatar-7");
        assert_eq!(batch.profiles[0].to, OWNER);
        assert_eq!(batch.profiles[0].created_at.timestamp(), 1_650_000_000);

        assert_eq!(
            batch.posts.iter().map(|p| p.pub_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(batch.posts[0].content_uri, "ipfs://bafy-post");

        let comment = &batch.comments[0];
        assert_eq!((comment.profile_id, comment.pub_id), (8, 1));
        assert_eq!((comment.profile_id_pointed, comment.pub_id_pointed), (7, 1));
        assert!(batch.dropped.is_empty());
    }

    #[test]
    fn ignores_foreign_contracts_and_topics() {
        let mut foreign = post_created(1, 7, 1, "ipfs://x", 1);
        foreign.address = "0x0000000000000000000000000000000000000001".to_string();
        let mut unknown = post_created(1, 7, 1, "ipfs://x", 1);
        unknown.topics[0] = format!("0x{}", "ab".repeat(32));

        let batch = decoder().decode_batch(&[foreign, unknown]);
        assert!(batch.is_empty());
        assert!(batch.dropped.is_empty());
    }

    #[test]
    #[traced_test]
    fn malformed_entry_is_dropped_without_failing_the_batch() {
        let mut broken = comment_created(3, 8, 2, 7, 1, "ipfs://c", 5);
        broken.data = "0x1234".to_string();
        let entries = vec![broken, post_created(3, 7, 9, "ipfs://ok", 6)];

        let batch = decoder().decode_batch(&entries);

        assert_eq!(batch.posts.len(), 1);
        assert!(batch.comments.is_empty());
        assert_eq!(batch.dropped, vec![EventKind::CommentCreated]);
        assert!(logs_contain("Failed to decode CommentCreated event"));
    }

    #[test]
    fn missing_indexed_topic_is_a_decode_error() {
        let mut entry = post_created(1, 7, 1, "ipfs://x", 1);
        entry.topics.truncate(2);

        let err = decoder().decode(EventKind::PostCreated, &entry).unwrap_err();
        assert!(matches!(err, DecodeError::MissingTopic(2)));
    }

    #[test]
    fn raw_entries_deserialize_from_rpc_json() {
        let json = r#"{
            "blockNumber": "0x1b11a81",
            "transactionHash": "0xabc",
            "logIndex": "0x4",
            "address": "0xDb46d1Dc155634FbC732f92E853b10B288AD5a1d",
            "topics": ["0x01"],
            "data": "0x"
        }"#;
        let entry: RawLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.block_number, 0x1b1_1a81);
        assert_eq!(entry.log_index, 4);
    }

    #[test]
    fn raw_entries_accept_plain_numbers_and_missing_log_index() {
        let json = r#"{
            "blockNumber": 28384641,
            "transactionHash": "0xabc",
            "address": "0xdb46d1dc155634fbc732f92e853b10b288ad5a1d",
            "topics": [],
            "data": "0x"
        }"#;
        let entry: RawLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.block_number, 28_384_641);
        assert_eq!(entry.log_index, 0);
    }

    #[test]
    fn malformed_quantities_are_rejected() {
        for block in [r#""0xzz""#, r#""block""#, "-1"] {
            let json = format!(
                r#"{{"blockNumber": {block}, "transactionHash": "0x", "address": "0x", "topics": [], "data": "0x"}}"#
            );
            assert!(serde_json::from_str::<RawLogEntry>(&json).is_err(), "{block} accepted");
        }

        let overflow = r#"{"blockNumber": 1, "logIndex": "0x100000000", "transactionHash": "0x", "address": "0x", "topics": [], "data": "0x"}"#;
        assert!(serde_json::from_str::<RawLogEntry>(overflow).is_err());
    }
}
