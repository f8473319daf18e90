//! Wire representation of an item

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemId;

/// An item as the remote service stores and transmits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default, with = "super::timestamp::option")]
    pub bought_at: Option<DateTime<Utc>>,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_null_and_missing_bought_at() {
        let with_null = r#"{
            "id": "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f",
            "name": "Milk",
            "boughtAt": null,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }"#;
        let missing = r#"{
            "id": "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f",
            "name": "Milk",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }"#;

        let first: RemoteItem = serde_json::from_str(with_null).unwrap();
        let second: RemoteItem = serde_json::from_str(missing).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.bought_at, None);
    }

    #[test]
    fn serializes_camel_case_with_millisecond_timestamps() {
        let payload = r#"{
            "id": "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f",
            "name": "Milk",
            "boughtAt": "2024-01-03T12:00:00Z",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-03T12:00:00Z"
        }"#;
        let item: RemoteItem = serde_json::from_str(payload).unwrap();

        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["boughtAt"], "2024-01-03T12:00:00.000Z");
        assert_eq!(value["updatedAt"], "2024-01-03T12:00:00.000Z");
        assert_eq!(value["id"], "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f");
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let payload = r#"{
            "id": "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f",
            "name": "Milk",
            "createdAt": "yesterday",
            "updatedAt": "2024-01-03T12:00:00Z"
        }"#;
        assert!(serde_json::from_str::<RemoteItem>(payload).is_err());
    }
}
