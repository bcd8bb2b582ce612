use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_database::{DocumentStore, Predicate, Stored};

use crate::models::{Appointment, AppointmentError, APPOINTMENTS_COLLECTION};

/// Half-open interval overlap: `[s1,e1)` and `[s2,e2)` collide iff each
/// starts before the other ends. Abutting intervals (`e1 == s2`) are legal.
pub fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

pub struct ConflictDetectionService {
    store: Arc<dyn DocumentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// First scheduled appointment of the consultant overlapping the
    /// candidate slot, if any. Cancelled appointments never conflict, and
    /// filtering on status equality alone keeps the store query to a single
    /// field (range predicates on a second field are not portable). The scan
    /// is linear; a consultant's active calendar is small enough that an
    /// interval index would be overkill.
    pub async fn find_conflict(
        &self,
        consultant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Option<Stored<Appointment>>, AppointmentError> {
        debug!(
            "Checking conflicts for consultant {} from {} to {}",
            consultant_id, start, end
        );

        let candidates = self
            .store
            .query(
                APPOINTMENTS_COLLECTION,
                &[
                    Predicate::eq("consultantId", consultant_id),
                    Predicate::eq("status", "scheduled"),
                ],
                None,
            )
            .await?;

        for doc in candidates {
            if exclude_id == Some(doc.id.as_str()) {
                continue;
            }
            let appointment: Appointment = doc.parse()?;
            if intervals_overlap(appointment.start, appointment.end, start, end) {
                warn!(
                    "Conflict detected for consultant {}: appointment {}",
                    consultant_id, doc.id
                );
                return Ok(Some(Stored { id: doc.id, data: appointment }));
            }
        }
        Ok(None)
    }
}
