//! Mboga Pap! grocery marketplace server.
//!
//! Customers order produce from several vendors at once, vendors manage
//! their stock, riders claim and deliver orders. Everyone follows along
//! through in-app notifications.

pub mod background_jobs;
pub mod cart;
pub mod client_state;
pub mod config;
pub mod loyalty;
pub mod marketplace;
pub mod notifications;
pub mod oidc;
pub mod server;
pub mod sqlite_persistence;
pub mod user;
