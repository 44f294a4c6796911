// Core modules implementing storage, export streaming, and error modeling.
pub mod error;
pub mod export;
pub mod models;
pub mod outbox;
pub mod schema;
pub mod store;
pub mod value;
