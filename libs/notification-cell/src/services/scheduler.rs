use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::warn;

use shared_utils::TimeNormalizer;

use crate::models::{NotificationSettings, PlannedNotification, KIND_CREATED};
use crate::services::settings::{render_template, SettingsService, TemplateTokens};

/// Turns the configured reminder rules into concrete (send instant, rendered
/// text) pairs for one appointment.
pub struct ReminderScheduler {
    settings: Arc<SettingsService>,
    normalizer: TimeNormalizer,
}

impl ReminderScheduler {
    pub fn new(settings: Arc<SettingsService>, normalizer: TimeNormalizer) -> Self {
        Self { settings, normalizer }
    }

    pub async fn plan(
        &self,
        start: DateTime<Utc>,
        client_name: &str,
        consultant_name: &str,
        to_e164: &str,
        now: DateTime<Utc>,
    ) -> Vec<PlannedNotification> {
        let settings = self.settings.get_settings().await;
        self.plan_with_settings(&settings, start, client_name, consultant_name, to_e164, now)
    }

    pub fn plan_with_settings(
        &self,
        settings: &NotificationSettings,
        start: DateTime<Utc>,
        client_name: &str,
        consultant_name: &str,
        to_e164: &str,
        now: DateTime<Utc>,
    ) -> Vec<PlannedNotification> {
        let parts = self.normalizer.civil_parts(start);
        let tokens = TemplateTokens {
            client_name: client_name.to_string(),
            consultant_name: consultant_name.to_string(),
            date_he: parts.date,
            time_he: parts.time,
        };

        let mut items = Vec::new();
        for rule in settings.reminders.iter().filter(|r| r.active) {
            let (kind, send_at) = if rule.immediate {
                (KIND_CREATED.to_string(), now)
            } else {
                let date = self.normalizer.civil_date(start) + Duration::days(rule.offset_days);
                let computed = match self.normalizer.at_civil_time(date, rule.hour, rule.minute) {
                    Ok(instant) => instant,
                    Err(e) => {
                        warn!(
                            "Skipping reminder rule {}d@{}:{:02}: {}",
                            rule.offset_days, rule.hour, rule.minute, e
                        );
                        continue;
                    }
                };
                // A send time that has already elapsed becomes "now"; the
                // minute-level dedup below keeps this from double-sending.
                let send_at = if computed < now { now } else { computed };
                (
                    format!("offset_{}_{}:{}", rule.offset_days, rule.hour, rule.minute),
                    send_at,
                )
            };

            items.push(PlannedNotification {
                kind,
                to: to_e164.to_string(),
                send_at,
                message_text: render_template(&rule.template, &settings.placeholders, &tokens),
            });
        }

        dedupe_by_minute(items)
    }
}

/// Collapse items landing on the same minute to a single send, preferring the
/// `created` item, otherwise the first encountered. Multiple rules can
/// legitimately land on "now" (an immediate rule plus a past-due offset rule
/// for a last-minute booking); sending both is user-visible spam.
fn dedupe_by_minute(items: Vec<PlannedNotification>) -> Vec<PlannedNotification> {
    let mut kept: Vec<PlannedNotification> = Vec::with_capacity(items.len());
    let mut index_by_minute: HashMap<DateTime<Utc>, usize> = HashMap::new();

    for item in items {
        let minute = truncate_to_minute(item.send_at);
        match index_by_minute.get(&minute) {
            Some(&existing) => {
                if item.kind == KIND_CREATED {
                    kept[existing] = item;
                }
            }
            None => {
                index_by_minute.insert(minute, kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderRule;

    fn planned(kind: &str, send_at: DateTime<Utc>) -> PlannedNotification {
        PlannedNotification {
            kind: kind.to_string(),
            to: "+972541234567".to_string(),
            send_at,
            message_text: "hi".to_string(),
        }
    }

    #[test]
    fn dedup_prefers_created_within_a_minute() {
        let t = "2025-08-27T06:00:12Z".parse::<DateTime<Utc>>().unwrap();
        let same_minute = "2025-08-27T06:00:45Z".parse::<DateTime<Utc>>().unwrap();

        let out = dedupe_by_minute(vec![
            planned("offset_-1_8:0", t),
            planned(KIND_CREATED, same_minute),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, KIND_CREATED);
    }

    #[test]
    fn dedup_keeps_first_when_no_created() {
        let t = "2025-08-27T06:00:12Z".parse::<DateTime<Utc>>().unwrap();
        let same_minute = "2025-08-27T06:00:45Z".parse::<DateTime<Utc>>().unwrap();

        let out = dedupe_by_minute(vec![
            planned("offset_-1_8:0", t),
            planned("offset_0_8:0", same_minute),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, "offset_-1_8:0");
    }

    #[test]
    fn distinct_minutes_all_survive() {
        let a = "2025-08-27T06:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let b = "2025-08-27T06:01:00Z".parse::<DateTime<Utc>>().unwrap();

        let out = dedupe_by_minute(vec![planned(KIND_CREATED, a), planned("offset_0_8:0", b)]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn offset_tag_format_matches_rule_fields() {
        let rule = ReminderRule {
            active: true,
            immediate: false,
            offset_days: -1,
            hour: 8,
            minute: 0,
            template: "x".to_string(),
        };
        let tag = format!("offset_{}_{}:{}", rule.offset_days, rule.hour, rule.minute);
        assert_eq!(tag, "offset_-1_8:0");
    }
}
