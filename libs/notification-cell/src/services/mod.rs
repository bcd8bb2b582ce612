pub mod queue;
pub mod scheduler;
pub mod settings;
pub mod worker;

pub use queue::{backoff_delay_minutes, NotificationQueueService};
pub use scheduler::ReminderScheduler;
pub use settings::{render_template, SettingsService, TemplateTokens};
pub use worker::NotificationWorkerService;
