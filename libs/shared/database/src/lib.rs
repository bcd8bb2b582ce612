pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreClient;
pub use memory::InMemoryStore;
pub use store::{Document, DocumentStore, Predicate, StoreError, Stored};
