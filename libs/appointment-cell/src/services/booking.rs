use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use consultant_cell::{Consultant, ConsultantService};
use notification_cell::{
    NotificationQueueService, PlannedNotification, ReminderScheduler, KIND_CREATED,
};
use shared_database::{DocumentStore, Predicate, Stored};
use shared_utils::{add_minutes, normalize_phone_e164, Clock, TimeNormalizer};
use whatsapp_cell::MessageSender;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
    ListAppointmentsQuery, UpdateAppointmentRequest, APPOINTMENTS_COLLECTION,
    DEFAULT_DURATION_MINUTES,
};
use crate::services::conflict::ConflictDetectionService;

/// Booking lifecycle: conflict-gated create/reschedule/cancel, with the
/// notification queue kept in sync on every mutation. The queue is the
/// durable source of truth for reminders; the inline first send is a
/// best-effort extra, so the first reminder is at-least-once.
pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    conflicts: ConflictDetectionService,
    consultants: Arc<ConsultantService>,
    scheduler: Arc<ReminderScheduler>,
    queue: Arc<NotificationQueueService>,
    sender: Arc<dyn MessageSender>,
    normalizer: TimeNormalizer,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        consultants: Arc<ConsultantService>,
        scheduler: Arc<ReminderScheduler>,
        queue: Arc<NotificationQueueService>,
        sender: Arc<dyn MessageSender>,
        normalizer: TimeNormalizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            conflicts: ConflictDetectionService::new(Arc::clone(&store)),
            store,
            consultants,
            scheduler,
            queue,
            sender,
            normalizer,
            clock,
        }
    }

    pub async fn list(
        &self,
        query: ListAppointmentsQuery,
    ) -> Result<Vec<Stored<Appointment>>, AppointmentError> {
        let mut predicates = Vec::new();
        if let Some(consultant_id) = &query.consultant_id {
            predicates.push(Predicate::eq("consultantId", consultant_id.as_str()));
        }
        if let Some(from) = &query.from {
            let from = self.normalizer.to_absolute(from)?;
            predicates.push(Predicate::Gte("start".to_string(), json!(from)));
        }
        if let Some(to) = &query.to {
            let to = self.normalizer.to_absolute(to)?;
            predicates.push(Predicate::Lte("start".to_string(), json!(to)));
        }

        let docs = self
            .store
            .query(APPOINTMENTS_COLLECTION, &predicates, None)
            .await?;
        let mut appointments = Vec::with_capacity(docs.len());
        for doc in docs {
            let data: Appointment = doc.parse()?;
            appointments.push(Stored { id: doc.id, data });
        }
        appointments.sort_by(|a, b| a.data.start.cmp(&b.data.start));
        Ok(appointments)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Stored<Appointment>>, AppointmentError> {
        let doc = self.store.get(APPOINTMENTS_COLLECTION, id).await?;
        match doc {
            Some(doc) => {
                let data: Appointment = doc.parse()?;
                Ok(Some(Stored { id: doc.id, data }))
            }
            None => Ok(None),
        }
    }

    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Stored<Appointment>, AppointmentError> {
        if request.client_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError("clientName is required".to_string()));
        }
        let client_phone = normalize_phone_e164(&request.client_phone)
            .map_err(|e| AppointmentError::ValidationError(e.to_string()))?;

        let consultant = self.active_consultant(&request.consultant_id).await?;

        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration <= 0 {
            return Err(AppointmentError::ValidationError(
                "durationMinutes must be positive".to_string(),
            ));
        }
        let start = self.normalizer.to_absolute(&request.start)?;
        let end = match &request.end {
            Some(end) => self.normalizer.to_absolute(end)?,
            None => add_minutes(start, duration),
        };
        if end <= start {
            return Err(AppointmentError::ValidationError("end must be after start".to_string()));
        }

        if let Some(conflict) = self
            .conflicts
            .find_conflict(&request.consultant_id, start, end, None)
            .await?
        {
            return Err(AppointmentError::Conflict(Box::new(conflict)));
        }

        let now = self.clock.now();
        let title = format!("{} — {}", request.client_name, consultant.data.full_name);
        let appointment = Appointment {
            consultant_id: request.consultant_id,
            client_name: request.client_name,
            client_phone,
            start,
            end,
            duration_minutes: duration,
            title,
            notes: request.notes,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        let data = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        let id = self.store.add(APPOINTMENTS_COLLECTION, data).await?;
        info!("Created appointment {} for consultant {}", id, appointment.consultant_id);

        let planned = self
            .scheduler
            .plan(
                start,
                &appointment.client_name,
                &consultant.data.full_name,
                &appointment.client_phone,
                now,
            )
            .await;
        self.queue.enqueue_batch(&id, planned.clone()).await?;

        self.send_first_inline(&planned).await;

        Ok(Stored { id, data: appointment })
    }

    pub async fn reschedule(
        &self,
        id: &str,
        request: UpdateAppointmentRequest,
    ) -> Result<Stored<Appointment>, AppointmentError> {
        let existing = self.get(id).await?.ok_or(AppointmentError::NotFound)?;
        let existing = existing.data;

        let client_name = request.client_name.unwrap_or(existing.client_name);
        if client_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError("clientName is required".to_string()));
        }
        let client_phone = match request.client_phone {
            Some(phone) => normalize_phone_e164(&phone)
                .map_err(|e| AppointmentError::ValidationError(e.to_string()))?,
            None => existing.client_phone,
        };
        let consultant_id = request.consultant_id.unwrap_or(existing.consultant_id);
        let duration = request.duration_minutes.unwrap_or(existing.duration_minutes);
        if duration <= 0 {
            return Err(AppointmentError::ValidationError(
                "durationMinutes must be positive".to_string(),
            ));
        }

        let start = match &request.start {
            Some(start) => self.normalizer.to_absolute(start)?,
            None => existing.start,
        };
        // An explicit end wins; a moved start without one keeps the duration.
        let end = match &request.end {
            Some(end) => self.normalizer.to_absolute(end)?,
            None if request.start.is_some() => add_minutes(start, duration),
            None => existing.end,
        };
        if end <= start {
            return Err(AppointmentError::ValidationError("end must be after start".to_string()));
        }

        let consultant = self
            .consultants
            .get(&consultant_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::InvalidConsultant)?;

        if let Some(conflict) = self
            .conflicts
            .find_conflict(&consultant_id, start, end, Some(id))
            .await?
        {
            return Err(AppointmentError::Conflict(Box::new(conflict)));
        }

        let now = self.clock.now();
        let title = format!("{} — {}", client_name, consultant.data.full_name);
        self.store
            .update(
                APPOINTMENTS_COLLECTION,
                id,
                json!({
                    "clientName": client_name,
                    "clientPhone": client_phone,
                    "consultantId": consultant_id,
                    "start": start,
                    "end": end,
                    "durationMinutes": duration,
                    "title": title,
                    "notes": request.notes.or(existing.notes),
                    "updatedAt": now,
                }),
            )
            .await?;

        // Stale reminders must never fire after a reschedule: retire the old
        // batch first, then enqueue from the new start.
        self.queue.supersede_for_appointment(id, "rescheduled").await?;
        let planned = self
            .scheduler
            .plan(start, &client_name, &consultant.data.full_name, &client_phone, now)
            .await;
        self.queue.enqueue_batch(id, planned).await?;

        info!("Rescheduled appointment {}", id);
        self.get(id).await?.ok_or(AppointmentError::NotFound)
    }

    /// Cancellation is a status flip, never a hard delete.
    pub async fn cancel(&self, id: &str) -> Result<(), AppointmentError> {
        let existing = self.get(id).await?.ok_or(AppointmentError::NotFound)?;

        self.store
            .update(
                APPOINTMENTS_COLLECTION,
                &existing.id,
                json!({
                    "status": "cancelled",
                    "updatedAt": self.clock.now(),
                }),
            )
            .await?;
        self.queue.supersede_for_appointment(id, "cancelled").await?;

        info!("Cancelled appointment {}", id);
        Ok(())
    }

    async fn active_consultant(
        &self,
        consultant_id: &str,
    ) -> Result<Stored<Consultant>, AppointmentError> {
        let consultant = self
            .consultants
            .get(consultant_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        match consultant {
            Some(consultant) if consultant.data.is_active => Ok(consultant),
            _ => Err(AppointmentError::InvalidConsultant),
        }
    }

    /// Best-effort synchronous delivery of the confirmation message. The
    /// queued record remains authoritative, so a failure here is only logged.
    async fn send_first_inline(&self, planned: &[PlannedNotification]) {
        if let Some(created) = planned.iter().find(|p| p.kind == KIND_CREATED) {
            if let Err(e) = self.sender.send(&created.to, &created.message_text).await {
                warn!("Inline first send failed (queued attempt remains): {}", e);
            }
        }
    }
}
