pub mod consultant;

pub use consultant::ConsultantService;
