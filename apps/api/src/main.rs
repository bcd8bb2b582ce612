use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::BookingService;
use consultant_cell::handlers::ConsultantCellState;
use consultant_cell::ConsultantService;
use notification_cell::handlers::NotificationCellState;
use notification_cell::{
    NotificationQueueService, NotificationWorkerService, ReminderScheduler, SettingsService,
    WorkerConfig,
};
use shared_config::AppConfig;
use shared_database::{DocumentStore, FirestoreClient};
use shared_utils::{Clock, SystemClock, TimeNormalizer};
use whatsapp_cell::handlers::WhatsAppCellState;
use whatsapp_cell::{MessageSender, StatusHub, WhatsAppGatewayClient};

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting consulta API server");

    let config = AppConfig::from_env();

    let store: Arc<dyn DocumentStore> = Arc::new(FirestoreClient::new(&config));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let normalizer = TimeNormalizer::new(config.reference_timezone);

    let gateway = Arc::new(WhatsAppGatewayClient::new(&config));
    let sender: Arc<dyn MessageSender> = gateway.clone();
    let hub = Arc::new(StatusHub::new());

    let settings = Arc::new(SettingsService::new(Arc::clone(&store), Arc::clone(&clock)));
    let scheduler = Arc::new(ReminderScheduler::new(Arc::clone(&settings), normalizer));
    let queue = Arc::new(NotificationQueueService::new(Arc::clone(&store), Arc::clone(&clock)));
    let consultants = Arc::new(ConsultantService::new(Arc::clone(&store), Arc::clone(&clock)));
    let booking = Arc::new(BookingService::new(
        Arc::clone(&store),
        Arc::clone(&consultants),
        Arc::clone(&scheduler),
        Arc::clone(&queue),
        Arc::clone(&sender),
        normalizer,
        Arc::clone(&clock),
    ));

    // The queue drains independently of the request path.
    let worker = Arc::new(NotificationWorkerService::new(
        WorkerConfig::default(),
        Arc::clone(&queue),
        Arc::clone(&sender),
    ));
    let worker_handle = Arc::clone(&worker);
    tokio::spawn(async move {
        worker_handle.start().await;
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(router::ApiContext {
        consultants: ConsultantCellState { service: consultants },
        appointments: AppointmentCellState { booking },
        settings: NotificationCellState { settings },
        whatsapp: WhatsAppCellState { gateway, hub },
    })
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.expect("failed to bind port");
    axum::serve(listener, app).await.expect("server error");
}
