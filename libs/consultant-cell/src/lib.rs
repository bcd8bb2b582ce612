pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::create_consultants_router;
pub use services::consultant::ConsultantService;
