use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};

use notification_cell::{
    NotificationSettings, ReminderRule, ReminderScheduler, SettingsService, KIND_CREATED,
};
use shared_database::InMemoryStore;
use shared_utils::{Clock, FixedClock, TimeNormalizer};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn scheduler() -> ReminderScheduler {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(at("2025-08-20T09:00:00Z")));
    let settings = Arc::new(SettingsService::new(store, clock));
    ReminderScheduler::new(settings, TimeNormalizer::new(chrono_tz::Asia::Jerusalem))
}

fn plan_defaults(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<notification_cell::PlannedNotification> {
    scheduler().plan_with_settings(
        &NotificationSettings::default_settings(),
        start,
        "דנה",
        "יועץ כהן",
        "+972541234567",
        now,
    )
}

#[test]
fn default_rules_produce_created_day_before_and_morning_of() {
    // 2025-08-28T10:00 Jerusalem == 07:00Z (IDT, UTC+3).
    let start = at("2025-08-28T07:00:00Z");
    let now = at("2025-08-20T09:00:00Z");

    let planned = plan_defaults(start, now);
    assert_eq!(planned.len(), 3);

    assert_eq!(planned[0].kind, KIND_CREATED);
    assert_eq!(planned[0].send_at, now);

    assert_eq!(planned[1].kind, "offset_-1_8:0");
    assert_eq!(planned[1].send_at, at("2025-08-27T05:00:00Z"));

    assert_eq!(planned[2].kind, "offset_0_8:0");
    assert_eq!(planned[2].send_at, at("2025-08-28T05:00:00Z"));
}

#[test]
fn templates_render_civil_date_and_time() {
    let start = at("2025-08-28T07:00:00Z");
    let now = at("2025-08-20T09:00:00Z");

    let planned = plan_defaults(start, now);
    let created = &planned[0];
    assert!(created.message_text.contains("דנה"));
    assert!(created.message_text.contains("יועץ כהן"));
    assert!(created.message_text.contains("28/08/2025"));
    assert!(created.message_text.contains("10:00"));

    // No unreplaced placeholder tokens survive rendering.
    for item in &planned {
        assert!(!item.message_text.contains("{שם}"));
        assert!(!item.message_text.contains("{יועץ}"));
        assert!(!item.message_text.contains("{תאריך}"));
        assert!(!item.message_text.contains("{שעה}"));
    }
}

#[test]
fn past_due_day_before_collapses_to_now_and_dedups_with_created() {
    // Booked on the 27th at 09:00 Jerusalem (06:00Z): the day-before slot
    // (05:00Z) is already gone, so it collapses onto "now" and the dedup
    // keeps only the created item in that minute.
    let start = at("2025-08-28T07:00:00Z");
    let now = at("2025-08-27T06:00:00Z");

    let planned = plan_defaults(start, now);
    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].kind, KIND_CREATED);
    assert_eq!(planned[0].send_at, now);
    assert_eq!(planned[1].kind, "offset_0_8:0");
    assert_eq!(planned[1].send_at, at("2025-08-28T05:00:00Z"));
}

#[test]
fn appointment_entirely_in_the_past_collapses_to_a_single_send() {
    let start = at("2025-08-28T07:00:00Z");
    let now = at("2025-09-01T12:00:00Z");

    let planned = plan_defaults(start, now);
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].kind, KIND_CREATED);
    assert_eq!(planned[0].send_at, now);
}

#[test]
fn post_dedup_each_minute_bucket_has_one_item() {
    let start = at("2025-08-28T07:00:00Z");
    let now = at("2025-08-27T06:00:30Z");

    let planned = plan_defaults(start, now);
    let mut buckets: HashMap<DateTime<Utc>, usize> = HashMap::new();
    for item in &planned {
        let minute = item
            .send_at
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap();
        *buckets.entry(minute).or_default() += 1;
    }
    assert!(buckets.values().all(|&count| count == 1));
}

#[test]
fn inactive_rules_are_skipped() {
    let mut settings = NotificationSettings::default_settings();
    for rule in &mut settings.reminders {
        if !rule.immediate {
            rule.active = false;
        }
    }

    let planned = scheduler().plan_with_settings(
        &settings,
        at("2025-08-28T07:00:00Z"),
        "דנה",
        "יועץ כהן",
        "+972541234567",
        at("2025-08-20T09:00:00Z"),
    );
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].kind, KIND_CREATED);
}

#[test]
fn custom_offset_rule_gets_composite_tag() {
    let settings = NotificationSettings {
        reminders: vec![ReminderRule {
            active: true,
            immediate: false,
            offset_days: -2,
            hour: 18,
            minute: 30,
            template: "תזכורת ל{שם}".to_string(),
        }],
        placeholders: Default::default(),
    };

    let planned = scheduler().plan_with_settings(
        &settings,
        at("2025-08-28T07:00:00Z"),
        "דנה",
        "יועץ כהן",
        "+972541234567",
        at("2025-08-20T09:00:00Z"),
    );
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].kind, "offset_-2_18:30");
    // 26 Aug 18:30 Jerusalem == 15:30Z.
    assert_eq!(planned[0].send_at, at("2025-08-26T15:30:00Z"));
}

#[tokio::test]
async fn plan_reads_settings_from_the_store() {
    let store = Arc::new(InMemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at("2025-08-20T09:00:00Z")));
    let settings_service = Arc::new(SettingsService::new(store, Arc::clone(&clock)));

    let custom = NotificationSettings {
        reminders: vec![ReminderRule {
            active: true,
            immediate: true,
            offset_days: 0,
            hour: 0,
            minute: 0,
            template: "hi {שם}".to_string(),
        }],
        placeholders: Default::default(),
    };
    settings_service.save_settings(custom).await.unwrap();

    let scheduler = ReminderScheduler::new(
        settings_service,
        TimeNormalizer::new(chrono_tz::Asia::Jerusalem),
    );
    let planned = scheduler
        .plan(
            at("2025-08-28T07:00:00Z"),
            "דנה",
            "יועץ",
            "+972541234567",
            at("2025-08-20T09:00:00Z"),
        )
        .await;
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].message_text, "hi דנה");
}
