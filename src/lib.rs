pub mod access;
pub mod consent;
pub mod context;
pub mod creation;
pub mod decision;
pub mod error;
pub mod identity;
pub mod oauth;
pub mod profile;
pub mod quota;
pub mod service;
pub mod stage;
pub mod store;
pub mod types;
pub mod update;
pub mod utils;
