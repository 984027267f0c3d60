//! Sample data for a fresh database: one account per role, a handful of
//! institutions and receipt types, and a few ledger rows to report on.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::auth;
use crate::models::catalog::Catalog;
use crate::models::transactions::{TransactionDraft, TransactionType};
use crate::models::users::{Role, UserFields};
use crate::repositories::{
    catalog::CatalogRepository, transactions::TransactionRepository, users::UserRepository,
};

struct SampleUser {
    name: &'static str,
    email: &'static str,
    username: &'static str,
    password: &'static str,
    role: Role,
}

const SAMPLE_USERS: [SampleUser; 3] = [
    SampleUser {
        name: "Admin User",
        email: "admin@example.com",
        username: "admin",
        password: "admin123",
        role: Role::SuperAdmin,
    },
    SampleUser {
        name: "Manager User",
        email: "manager@example.com",
        username: "manager",
        password: "manager123",
        role: Role::Manager,
    },
    SampleUser {
        name: "Data Entry User",
        email: "data@example.com",
        username: "data",
        password: "data123",
        role: Role::DataEntry,
    },
];

const SAMPLE_INSTITUTIONS: [&str; 5] = [
    "Ministry of Education",
    "Health Department",
    "Agriculture Office",
    "Local Council",
    "Public Works",
];

const SAMPLE_RECEIPT_TYPES: [&str; 5] = [
    "School Fees",
    "Medical Fees",
    "Land Rates",
    "Business Permit",
    "Market Fee",
];

struct SampleTransaction {
    receipt_number: &'static str,
    transaction_type: TransactionType,
    amount: &'static str,
    date: &'static str,
    institution: &'static str,
    receipt_type: &'static str,
    description: &'static str,
    created_by: &'static str,
}

const SAMPLE_TRANSACTIONS: [SampleTransaction; 5] = [
    SampleTransaction {
        receipt_number: "REC001",
        transaction_type: TransactionType::Receipt,
        amount: "5000.00",
        date: "2023-01-15",
        institution: "Ministry of Education",
        receipt_type: "School Fees",
        description: "School fees collection",
        created_by: "admin",
    },
    SampleTransaction {
        receipt_number: "REC002",
        transaction_type: TransactionType::Receipt,
        amount: "3000.00",
        date: "2023-01-20",
        institution: "Health Department",
        receipt_type: "Medical Fees",
        description: "Medical services",
        created_by: "manager",
    },
    SampleTransaction {
        receipt_number: "PAY001",
        transaction_type: TransactionType::Payment,
        amount: "2000.00",
        date: "2023-01-25",
        institution: "Ministry of Education",
        receipt_type: "School Fees",
        description: "Textbook purchase",
        created_by: "admin",
    },
    SampleTransaction {
        receipt_number: "REC003",
        transaction_type: TransactionType::Receipt,
        amount: "4000.00",
        date: "2023-02-10",
        institution: "Agriculture Office",
        receipt_type: "Land Rates",
        description: "Land rates collection",
        created_by: "data",
    },
    SampleTransaction {
        receipt_number: "PAY002",
        transaction_type: TransactionType::Payment,
        amount: "1500.00",
        date: "2023-02-15",
        institution: "Local Council",
        receipt_type: "Business Permit",
        description: "Office supplies",
        created_by: "manager",
    },
];

/// Inserts whatever sample data is missing. Users are matched by username;
/// the catalogs and ledger rows are only written into an empty ledger.
pub async fn run(pool: &MySqlPool) -> Result<(), anyhow::Error> {
    let users = UserRepository::new(pool.clone());
    seed_users(&users).await?;

    let institutions = CatalogRepository::new(pool.clone(), Catalog::Institutions);
    if !institutions.list().await?.is_empty() {
        log::info!("Ledger already holds institutions, skipping sample ledger data.");
        return Ok(());
    }

    let receipt_types = CatalogRepository::new(pool.clone(), Catalog::ReceiptTypes);
    let institution_ids = seed_catalog(&institutions, &SAMPLE_INSTITUTIONS).await?;
    let type_ids = seed_catalog(&receipt_types, &SAMPLE_RECEIPT_TYPES).await?;

    let user_ids: HashMap<String, i64> = users
        .list_users()
        .await?
        .into_iter()
        .map(|user| (user.username, user.id))
        .collect();

    let transactions = TransactionRepository::new(pool.clone());
    for sample in &SAMPLE_TRANSACTIONS {
        let draft = sample_draft(sample, &institution_ids, &type_ids, &user_ids)?;
        transactions.new_transaction(&draft).await?;
    }

    log::info!(
        "Seeded {} institutions, {} receipt types and {} transactions.",
        SAMPLE_INSTITUTIONS.len(),
        SAMPLE_RECEIPT_TYPES.len(),
        SAMPLE_TRANSACTIONS.len()
    );
    Ok(())
}

async fn seed_users(repository: &UserRepository) -> Result<(), anyhow::Error> {
    for sample in &SAMPLE_USERS {
        if repository.get_credentials(sample.username).await?.is_some() {
            continue;
        }

        let password_hash = auth::hash_password(sample.password)
            .map_err(|e| anyhow!("Could not hash password for {}: {e}", sample.username))?;
        let fields = UserFields {
            name: sample.name.to_string(),
            email: sample.email.to_string(),
            username: sample.username.to_string(),
            role: sample.role,
        };
        repository.insert_user(&fields, &password_hash).await?;
        log::info!("Seeded user {} ({}).", sample.username, sample.role);
    }

    Ok(())
}

async fn seed_catalog(
    repository: &CatalogRepository,
    names: &[&str],
) -> Result<HashMap<String, i64>, anyhow::Error> {
    let mut ids = HashMap::new();
    for name in names {
        let entry = repository.insert(name).await?;
        ids.insert(entry.name, entry.id);
    }
    Ok(ids)
}

fn sample_draft(
    sample: &SampleTransaction,
    institution_ids: &HashMap<String, i64>,
    type_ids: &HashMap<String, i64>,
    user_ids: &HashMap<String, i64>,
) -> Result<TransactionDraft, anyhow::Error> {
    let lookup = |ids: &HashMap<String, i64>, key: &str| {
        ids.get(key)
            .copied()
            .ok_or_else(|| anyhow!("Sample reference {key} was not seeded"))
    };

    Ok(TransactionDraft {
        transaction_type: sample.transaction_type,
        amount: BigDecimal::from_str(sample.amount).context("sample amount")?,
        institution_id: lookup(institution_ids, sample.institution)?,
        type_id: lookup(type_ids, sample.receipt_type)?,
        date: NaiveDate::parse_from_str(sample.date, "%Y-%m-%d").context("sample date")?,
        receipt_number: Some(sample.receipt_number.to_string()),
        description: Some(sample.description.to_string()),
        created_by: lookup(user_ids, sample.created_by)?,
    })
}
