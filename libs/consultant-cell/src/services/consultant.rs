use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use shared_database::{DocumentStore, Predicate, StoreError, Stored};
use shared_utils::{normalize_phone_e164, Clock};

use crate::models::{
    Consultant, ConsultantError, CreateConsultantRequest, DeleteConsultantResponse,
    UpdateConsultantRequest, CONSULTANTS_COLLECTION,
};

const APPOINTMENTS_COLLECTION: &str = "appointments";

pub struct ConsultantService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ConsultantService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// All consultants, newest first.
    pub async fn list(&self) -> Result<Vec<Stored<Consultant>>, ConsultantError> {
        let docs = self
            .store
            .query(CONSULTANTS_COLLECTION, &[], None)
            .await
            .map_err(store_error)?;

        let mut consultants = Vec::with_capacity(docs.len());
        for doc in docs {
            let data: Consultant = doc.parse().map_err(store_error)?;
            consultants.push(Stored { id: doc.id, data });
        }
        consultants.sort_by(|a, b| b.data.created_at.cmp(&a.data.created_at));
        Ok(consultants)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Stored<Consultant>>, ConsultantError> {
        let doc = self
            .store
            .get(CONSULTANTS_COLLECTION, id)
            .await
            .map_err(store_error)?;
        match doc {
            Some(doc) => {
                let data: Consultant = doc.parse().map_err(store_error)?;
                Ok(Some(Stored { id: doc.id, data }))
            }
            None => Ok(None),
        }
    }

    pub async fn create(
        &self,
        request: CreateConsultantRequest,
    ) -> Result<Stored<Consultant>, ConsultantError> {
        if request.full_name.trim().is_empty() {
            return Err(ConsultantError::ValidationError("fullName is required".to_string()));
        }
        let phone = normalize_phone_e164(&request.phone)
            .map_err(|e| ConsultantError::ValidationError(e.to_string()))?;

        let now = self.clock.now();
        let consultant = Consultant {
            full_name: request.full_name,
            phone,
            specialties: request.specialties,
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let data = serde_json::to_value(&consultant).map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;
        let id = self
            .store
            .add(CONSULTANTS_COLLECTION, data)
            .await
            .map_err(store_error)?;

        info!("Created consultant {} ({})", id, consultant.full_name);
        Ok(Stored { id, data: consultant })
    }

    pub async fn update(
        &self,
        id: &str,
        request: UpdateConsultantRequest,
    ) -> Result<Stored<Consultant>, ConsultantError> {
        let existing = self.get(id).await?.ok_or(ConsultantError::NotFound)?;

        let mut patch = Map::new();
        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(ConsultantError::ValidationError("fullName is required".to_string()));
            }
            patch.insert("fullName".to_string(), json!(full_name));
        }
        if let Some(phone) = request.phone {
            let phone = normalize_phone_e164(&phone)
                .map_err(|e| ConsultantError::ValidationError(e.to_string()))?;
            patch.insert("phone".to_string(), json!(phone));
        }
        if let Some(specialties) = request.specialties {
            patch.insert("specialties".to_string(), json!(specialties));
        }
        if let Some(is_active) = request.is_active {
            patch.insert("isActive".to_string(), json!(is_active));
        }
        patch.insert("updatedAt".to_string(), json!(self.clock.now()));

        self.store
            .update(CONSULTANTS_COLLECTION, &existing.id, Value::Object(patch))
            .await
            .map_err(store_error)?;

        self.get(id)
            .await?
            .ok_or(ConsultantError::NotFound)
    }

    /// Hard-delete only when nothing references the consultant; otherwise
    /// deactivate so existing appointments keep a resolvable reference.
    pub async fn delete(&self, id: &str) -> Result<DeleteConsultantResponse, ConsultantError> {
        let existing = self.get(id).await?.ok_or(ConsultantError::NotFound)?;

        let referencing = self
            .store
            .query(
                APPOINTMENTS_COLLECTION,
                &[Predicate::eq("consultantId", id)],
                Some(1),
            )
            .await
            .map_err(store_error)?;

        if referencing.is_empty() {
            self.store
                .delete(CONSULTANTS_COLLECTION, &existing.id)
                .await
                .map_err(store_error)?;
            debug!("Deleted consultant {}", id);
            return Ok(DeleteConsultantResponse { ok: true, deleted: true });
        }

        self.store
            .update(
                CONSULTANTS_COLLECTION,
                &existing.id,
                json!({ "isActive": false, "updatedAt": self.clock.now() }),
            )
            .await
            .map_err(store_error)?;
        debug!("Deactivated consultant {} (has appointments)", id);
        Ok(DeleteConsultantResponse { ok: true, deleted: false })
    }
}

fn store_error(e: StoreError) -> ConsultantError {
    ConsultantError::DatabaseError(e.to_string())
}
