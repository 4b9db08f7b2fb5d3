//! Notification storage trait

use anyhow::Result;

use super::models::{Notification, NotificationType};

pub trait NotificationStore: Send + Sync {
    /// Creates a notification for a user, evicting the oldest ones past the
    /// per user limit. Returns the stored notification.
    fn create_notification(
        &self,
        user_id: usize,
        notification_type: NotificationType,
        title: String,
        body: Option<String>,
        data: serde_json::Value,
    ) -> Result<Notification>;

    /// Newest first.
    fn get_user_notifications(&self, user_id: usize) -> Result<Vec<Notification>>;

    /// Returns Ok(None) unless the notification exists and belongs to the user.
    fn get_notification(
        &self,
        notification_id: &str,
        user_id: usize,
    ) -> Result<Option<Notification>>;

    /// Marks a notification read and returns it.
    /// Returns None if the notification doesn't exist or doesn't belong to the user.
    fn mark_notification_read(
        &self,
        notification_id: &str,
        user_id: usize,
    ) -> Result<Option<Notification>>;

    /// Returns how many notifications were updated.
    fn mark_all_notifications_read(&self, user_id: usize) -> Result<usize>;

    fn get_unread_count(&self, user_id: usize) -> Result<usize>;
}
