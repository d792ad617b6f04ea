//! Probe record shape
//!
//! Field names on the wire are matched by the database's access rules for
//! the `groups` collection and must not drift from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic group record written by a single probe run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// Key allocated from the store for this record
    #[serde(rename = "id")]
    pub identifier: String,

    #[serde(rename = "from")]
    pub origin_label: String,

    #[serde(rename = "to")]
    pub destination_label: String,

    /// Epoch seconds stored as text; the rules expect a string here
    #[serde(rename = "departureTime")]
    pub departure_timestamp: String,

    #[serde(rename = "availableSeats")]
    pub capacity: i64,

    #[serde(rename = "pricePerPerson")]
    pub unit_price: i64,

    #[serde(rename = "createdAt")]
    pub created_at_millis: i64,

    /// Must equal the uid of the principal performing the write
    #[serde(rename = "createdBy")]
    pub owner_id: String,

    #[serde(rename = "members")]
    pub participants: BTreeMap<String, MemberInfo>,
}

/// Entry in the record's member map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(rename = "joinedAt")]
    pub joined_at_millis: i64,
}

impl ProbeRecord {
    pub const ORIGIN_LABEL: &'static str = "Current Location";
    pub const DESTINATION_LABEL: &'static str = "Test Destination";
    pub const DEPARTURE_TIMESTAMP: &'static str = "1718545678";
    pub const CAPACITY: i64 = 4;
    pub const UNIT_PRICE: i64 = 0;
    pub const MEMBER_DISPLAY_NAME: &'static str = "Test User";

    /// Build the record for `owner_id` at the current wall-clock time
    pub fn build(identifier: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::build_at(identifier, owner_id, chrono::Utc::now().timestamp_millis())
    }

    /// Build the record with an explicit construction timestamp
    pub fn build_at(
        identifier: impl Into<String>,
        owner_id: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        let owner_id = owner_id.into();

        let mut participants = BTreeMap::new();
        participants.insert(
            owner_id.clone(),
            MemberInfo {
                display_name: Self::MEMBER_DISPLAY_NAME.to_string(),
                joined_at_millis: now_millis,
            },
        );

        Self {
            identifier: identifier.into(),
            origin_label: Self::ORIGIN_LABEL.to_string(),
            destination_label: Self::DESTINATION_LABEL.to_string(),
            departure_timestamp: Self::DEPARTURE_TIMESTAMP.to_string(),
            capacity: Self::CAPACITY,
            unit_price: Self::UNIT_PRICE,
            created_at_millis: now_millis,
            owner_id,
            participants,
        }
    }
}
