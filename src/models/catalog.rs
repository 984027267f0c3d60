use serde::{Deserialize, Serialize};

/// The two lookup tables that transactions are classified by. Both are plain
/// `(id, name)` rows and share repository, service and routes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Catalog {
    Institutions,
    ReceiptTypes,
}

impl Catalog {
    pub fn table(&self) -> &'static str {
        match self {
            Catalog::Institutions => "institutions",
            Catalog::ReceiptTypes => "receipt_types",
        }
    }

    /// Column of `transactions` that references this catalog.
    pub fn reference_column(&self) -> &'static str {
        match self {
            Catalog::Institutions => "institution_id",
            Catalog::ReceiptTypes => "type_id",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Catalog::Institutions => "institution",
            Catalog::ReceiptTypes => "receipt type",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Catalog::Institutions => "Institution",
            Catalog::ReceiptTypes => "Receipt type",
        }
    }

    /// Label used by reports when the catalog filter is not set.
    pub fn unfiltered_label(&self) -> &'static str {
        match self {
            Catalog::Institutions => "All Institutions",
            Catalog::ReceiptTypes => "All Types",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogEntryInput {
    pub name: Option<String>,
}
