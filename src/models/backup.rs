use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{catalog::CatalogEntry, transactions::Transaction, users::User};

/// Collections every backup document must carry, by their JSON key.
pub const REQUIRED_COLLECTIONS: [&str; 5] = [
    "users",
    "institutions",
    "receiptTypes",
    "transactions",
    "settings",
];

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Setting {
    #[sqlx(rename = "setting_key")]
    #[serde(alias = "setting_key")]
    pub key: String,
    #[sqlx(rename = "setting_value")]
    #[serde(alias = "setting_value")]
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub users: Vec<User>,
    pub institutions: Vec<CatalogEntry>,
    pub receipt_types: Vec<CatalogEntry>,
    pub transactions: Vec<Transaction>,
    pub settings: Vec<Setting>,
    /// Set on export, ignored on import.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl BackupDocument {
    /// Checks that `value` is an object holding every collection in
    /// [`REQUIRED_COLLECTIONS`] as an array, then decodes it.
    pub fn from_json(value: Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "Backup data must be a JSON object".to_string())?;

        let missing: Vec<&str> = REQUIRED_COLLECTIONS
            .iter()
            .copied()
            .filter(|key| !object.get(*key).is_some_and(Value::is_array))
            .collect();

        if !missing.is_empty() {
            return Err(format!(
                "Backup data is missing required collections: {}",
                missing.join(", ")
            ));
        }

        serde_json::from_value(value).map_err(|e| format!("Invalid backup data: {e}"))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub backup_data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "users": [
                {"id": 1, "name": "Admin User", "email": "admin@example.com", "username": "admin", "role": "super_admin"}
            ],
            "institutions": [{"id": 1, "name": "Ministry of Education"}],
            "receiptTypes": [{"id": 1, "name": "School Fees"}],
            "transactions": [{
                "id": 1,
                "transactionType": "receipt",
                "amount": "5000.00",
                "institutionId": 1,
                "typeId": 1,
                "date": "2023-01-15",
                "receiptNumber": "REC001",
                "description": null,
                "createdBy": 1
            }],
            "settings": [{"key": "opening_balance", "value": "10000"}],
            "timestamp": "2024-03-01T10:00:00Z"
        })
    }

    #[test]
    fn decodes_an_exported_document() {
        let backup = BackupDocument::from_json(document()).unwrap();

        assert_eq!(backup.institutions[0].name, "Ministry of Education");
        assert_eq!(backup.receipt_types.len(), 1);
        assert_eq!(backup.transactions[0].receipt_number.as_deref(), Some("REC001"));
        assert_eq!(backup.settings[0].key, "opening_balance");
        assert!(backup.timestamp.is_some());
    }

    #[test]
    fn names_every_missing_collection() {
        let mut value = document();
        let object = value.as_object_mut().unwrap();
        object.remove("receiptTypes");
        object.insert("settings".to_string(), json!({"opening_balance": "1"}));

        let err = BackupDocument::from_json(value).unwrap_err();

        assert_eq!(
            err,
            "Backup data is missing required collections: receiptTypes, settings"
        );
    }

    #[test]
    fn rejects_non_objects() {
        assert!(BackupDocument::from_json(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn rejects_malformed_rows() {
        let mut value = document();
        value["transactions"][0]["transactionType"] = json!("refund");

        let err = BackupDocument::from_json(value).unwrap_err();
        assert!(err.starts_with("Invalid backup data"));
    }

    #[test]
    fn timestamp_is_optional_on_import() {
        let mut value = document();
        value.as_object_mut().unwrap().remove("timestamp");

        let backup = BackupDocument::from_json(value).unwrap();
        assert_eq!(backup.timestamp, None);
    }

    #[test]
    fn decodes_snake_case_exports() {
        let value = json!({
            "users": [],
            "institutions": [{"id": 1, "name": "Ministry of Education", "created_at": "2023-01-01T08:00:00.000Z"}],
            "receiptTypes": [{"id": 1, "name": "School Fees"}],
            "transactions": [{
                "id": 1,
                "transaction_type": "receipt",
                "amount": "5000.00",
                "institution_id": 1,
                "type_id": 1,
                "date": "2023-01-15T00:00:00.000Z",
                "receipt_number": "REC001",
                "description": "School fees collection",
                "created_by": 1,
                "created_at": "2023-01-15T10:30:00.000Z"
            }],
            "settings": [{"id": 1, "setting_key": "opening_balance", "setting_value": "10000"}],
            "timestamp": "2024-03-01T10:00:00.000Z"
        });

        let backup = BackupDocument::from_json(value).unwrap();

        let row = &backup.transactions[0];
        assert_eq!(row.institution_id, 1);
        assert_eq!(row.date.to_string(), "2023-01-15");
        assert_eq!(row.created_by, 1);
        assert_eq!(backup.settings[0].key, "opening_balance");
        assert_eq!(backup.settings[0].value, "10000");
    }
}
