use async_trait::async_trait;
use sqlx::MySqlPool;
use tokio::sync::oneshot;

use super::{is_still_referenced, required, RequestHandler, Service, ServiceError};
use crate::{
    models::catalog::{Catalog, CatalogEntry},
    repositories::catalog::CatalogRepository,
};

pub enum CatalogRequest {
    List {
        response: oneshot::Sender<Result<Vec<CatalogEntry>, ServiceError>>,
    },
    Create {
        name: Option<String>,
        response: oneshot::Sender<Result<CatalogEntry, ServiceError>>,
    },
    Update {
        id: i64,
        name: Option<String>,
        response: oneshot::Sender<Result<CatalogEntry, ServiceError>>,
    },
    Delete {
        id: i64,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

/// One handler per [`Catalog`]; institutions and receipt types each get their
/// own service instance and channel.
#[derive(Clone)]
pub struct CatalogRequestHandler {
    repository: CatalogRepository,
    catalog: Catalog,
}

impl CatalogRequestHandler {
    pub fn new(sql_conn: MySqlPool, catalog: Catalog) -> Self {
        let repository = CatalogRepository::new(sql_conn, catalog);

        CatalogRequestHandler {
            repository,
            catalog,
        }
    }

    fn failure(&self, verb: &str) -> String {
        let noun = match (self.catalog, verb) {
            (Catalog::Institutions, "fetch") => "institutions",
            (Catalog::ReceiptTypes, "fetch") => "receipt types",
            _ => self.catalog.noun(),
        };
        format!("Failed to {verb} {noun}")
    }

    fn name_required(&self) -> String {
        format!("{} name is required", self.catalog.title())
    }

    fn not_found(&self) -> ServiceError {
        ServiceError::NotFound(format!("{} not found", self.catalog.title()))
    }

    fn in_use(&self) -> ServiceError {
        ServiceError::Conflict(format!(
            "This {} is used in transactions and cannot be deleted",
            self.catalog.noun()
        ))
    }

    fn delete_failure(&self, error: anyhow::Error) -> ServiceError {
        if is_still_referenced(&error) {
            self.in_use()
        } else {
            ServiceError::database(&self.failure("delete"))(error)
        }
    }

    async fn list(&self) -> Result<Vec<CatalogEntry>, ServiceError> {
        let context = self.failure("fetch");
        self.repository
            .list()
            .await
            .map_err(ServiceError::database(&context))
    }

    async fn create(&self, name: Option<String>) -> Result<CatalogEntry, ServiceError> {
        let name = required(name, &self.name_required())?;
        let context = self.failure("add");

        let entry = self
            .repository
            .insert(&name)
            .await
            .map_err(ServiceError::database(&context))?;

        log::info!("Added {} {} ({}).", self.catalog.noun(), entry.id, entry.name);
        Ok(entry)
    }

    async fn update(&self, id: i64, name: Option<String>) -> Result<CatalogEntry, ServiceError> {
        let name = required(name, &self.name_required())?;
        let context = self.failure("update");

        self.repository
            .update(id, &name)
            .await
            .map_err(ServiceError::database(&context))?
            .ok_or_else(|| self.not_found())
    }

    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let context = self.failure("delete");

        let references = self
            .repository
            .count_references(id)
            .await
            .map_err(ServiceError::database(&context))?;
        if references > 0 {
            return Err(self.in_use());
        }

        let deleted = self
            .repository
            .delete(id)
            .await
            .map_err(|e| self.delete_failure(e))?;
        if !deleted {
            return Err(self.not_found());
        }

        log::info!("Deleted {} {id}.", self.catalog.noun());
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<CatalogRequest> for CatalogRequestHandler {
    async fn handle_request(&self, request: CatalogRequest) {
        match request {
            CatalogRequest::List { response } => {
                let entries = self.list().await;
                let _ = response.send(entries);
            }
            CatalogRequest::Create { name, response } => {
                let entry = self.create(name).await;
                let _ = response.send(entry);
            }
            CatalogRequest::Update { id, name, response } => {
                let entry = self.update(id, name).await;
                let _ = response.send(entry);
            }
            CatalogRequest::Delete { id, response } => {
                let result = self.delete(id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct CatalogService;

impl CatalogService {
    pub fn new() -> Self {
        CatalogService {}
    }
}

#[async_trait]
impl Service<CatalogRequest, CatalogRequestHandler> for CatalogService {}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(catalog: Catalog) -> CatalogRequestHandler {
        let pool = MySqlPool::connect_lazy("mysql://root@localhost/revenue_management").unwrap();
        CatalogRequestHandler::new(pool, catalog)
    }

    #[tokio::test]
    async fn messages_follow_the_catalog() {
        let institutions = handler(Catalog::Institutions);
        let receipt_types = handler(Catalog::ReceiptTypes);

        assert_eq!(institutions.failure("fetch"), "Failed to fetch institutions");
        assert_eq!(receipt_types.failure("fetch"), "Failed to fetch receipt types");
        assert_eq!(receipt_types.failure("add"), "Failed to add receipt type");
        assert_eq!(
            receipt_types.not_found().to_string(),
            "Receipt type not found"
        );
    }

    #[tokio::test]
    async fn blank_names_never_reach_the_database() {
        let institutions = handler(Catalog::Institutions);

        let created = institutions.create(Some("   ".into())).await;
        let updated = institutions.update(3, None).await;

        assert!(matches!(
            created,
            Err(ServiceError::Validation(msg)) if msg == "Institution name is required"
        ));
        assert!(matches!(updated, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn reference_added_during_delete_is_a_conflict() {
        let receipt_types = handler(Catalog::ReceiptTypes);

        let raced = receipt_types.delete_failure(crate::services::tests::foreign_key_violation());
        let broken = receipt_types.delete_failure(anyhow::anyhow!("connection reset"));

        assert!(matches!(
            raced,
            ServiceError::Conflict(msg) if msg == "This receipt type is used in transactions and cannot be deleted"
        ));
        assert!(matches!(
            broken,
            ServiceError::Database { context, .. } if context == "Failed to delete receipt type"
        ));
    }
}
