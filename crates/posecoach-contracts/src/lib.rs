pub mod chat;
pub mod data_url;
pub mod errors;
pub mod events;
pub mod gallery;
pub mod models;
pub mod pose;
pub mod session;
pub mod store;
