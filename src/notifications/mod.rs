//! User notifications module

mod hub;
mod models;
mod service;
mod store;

pub use hub::NotificationHub;
pub use models::{Notification, NotificationType, OrderNotificationData};
pub use service::NotificationService;
pub use store::NotificationStore;
