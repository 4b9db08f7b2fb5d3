//! Notification service for creating and broadcasting notifications

use std::sync::Arc;
use tracing::{debug, info};

use crate::marketplace::{Order, OrderStatus};
use crate::server::metrics;

use super::hub::NotificationHub;
use super::models::{Notification, NotificationType, OrderNotificationData};
use super::store::NotificationStore;

fn format_kes(cents: u64) -> String {
    format!("KES {}.{:02}", cents / 100, cents % 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Customer,
    Vendor,
    Rider,
}

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    hub: Arc<NotificationHub>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, hub: Arc<NotificationHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Stores a notification and pushes it to the user's open streams.
    pub async fn create_notification(
        &self,
        user_id: usize,
        notification_type: NotificationType,
        title: String,
        body: Option<String>,
        data: serde_json::Value,
    ) -> anyhow::Result<Notification> {
        let notification =
            self.store
                .create_notification(user_id, notification_type, title, body, data)?;
        metrics::record_notification_created(notification_type.as_db_str());

        let delivered = self.hub.publish(user_id, &notification).await;
        debug!(
            "Notification {} for user {} pushed to {} streams",
            notification.id, user_id, delivered
        );
        Ok(notification)
    }

    /// Writes one notification per party of the order. `previous_status`
    /// None means the order was just placed. An unchanged status writes
    /// nothing.
    pub async fn fan_out_order_update(
        &self,
        order: &Order,
        previous_status: Option<OrderStatus>,
    ) -> anyhow::Result<Vec<Notification>> {
        if previous_status == Some(order.status) {
            debug!("Order {} status unchanged, nothing to notify", order.id);
            return Ok(vec![]);
        }
        let notification_type = match previous_status {
            None => NotificationType::OrderPlaced,
            Some(_) => NotificationType::OrderStatusChanged,
        };
        let data = serde_json::to_value(OrderNotificationData {
            order_id: order.id.clone(),
            status: order.status.as_str().to_string(),
            previous_status: previous_status.map(|s| s.as_str().to_string()),
            customer_id: order.customer_id,
            vendor_id: order.vendor_id,
            rider_id: order.rider_id,
            total_cents: order.total_cents,
        })?;

        let mut created = vec![];
        for (user_id, party) in Self::recipients(order) {
            let (title, body) = match notification_type {
                NotificationType::OrderPlaced => Self::placed_message(order, party),
                _ => Self::status_message(order, party),
            };
            created.push(
                self.create_notification(user_id, notification_type, title, body, data.clone())
                    .await?,
            );
        }
        info!(
            "Order {} {:?} -> {}: notified {} users",
            order.id,
            previous_status.map(|s| s.as_str()),
            order.status.as_str(),
            created.len()
        );
        Ok(created)
    }

    /// Tells every party that a rider picked up the order.
    pub async fn notify_rider_assigned(&self, order: &Order) -> anyhow::Result<Vec<Notification>> {
        let rider_id = match order.rider_id {
            Some(id) => id,
            None => return Ok(vec![]),
        };
        let data = serde_json::to_value(OrderNotificationData {
            order_id: order.id.clone(),
            status: order.status.as_str().to_string(),
            previous_status: None,
            customer_id: order.customer_id,
            vendor_id: order.vendor_id,
            rider_id: Some(rider_id),
            total_cents: order.total_cents,
        })?;

        let mut created = vec![];
        for (user_id, party) in Self::recipients(order) {
            let (title, body) = match party {
                Party::Rider => (
                    format!("You are delivering order {}", order.short_id()),
                    Some(format!("Deliver to {}", order.delivery_address)),
                ),
                _ => (
                    format!("A rider was assigned to order {}", order.short_id()),
                    None,
                ),
            };
            created.push(
                self.create_notification(
                    user_id,
                    NotificationType::RiderAssigned,
                    title,
                    body,
                    data.clone(),
                )
                .await?,
            );
        }
        Ok(created)
    }

    /// Customer, vendor and rider if any, without duplicates.
    fn recipients(order: &Order) -> Vec<(usize, Party)> {
        let mut recipients = vec![
            (order.customer_id, Party::Customer),
            (order.vendor_id, Party::Vendor),
        ];
        if let Some(rider_id) = order.rider_id {
            recipients.push((rider_id, Party::Rider));
        }
        let mut seen = std::collections::HashSet::new();
        recipients.retain(|(id, _)| seen.insert(*id));
        recipients
    }

    fn placed_message(order: &Order, party: Party) -> (String, Option<String>) {
        match party {
            Party::Customer => (
                "Order placed".to_string(),
                Some(format!(
                    "Your order {} of {} was sent to the vendor",
                    order.short_id(),
                    format_kes(order.total_cents)
                )),
            ),
            Party::Vendor => (
                "New order".to_string(),
                Some(format!(
                    "Order {} worth {} is waiting for confirmation",
                    order.short_id(),
                    format_kes(order.total_cents)
                )),
            ),
            Party::Rider => (format!("Order {} placed", order.short_id()), None),
        }
    }

    fn status_message(order: &Order, party: Party) -> (String, Option<String>) {
        let title = format!("Order {} is {}", order.short_id(), order.status.label());
        let body = match (party, order.status) {
            (Party::Customer, OrderStatus::OutForDelivery) => {
                Some("Your groceries are on the way".to_string())
            }
            (Party::Customer, OrderStatus::Delivered) => {
                Some("Enjoy your groceries!".to_string())
            }
            (Party::Vendor, OrderStatus::Cancelled) => {
                Some("Items have been returned to stock".to_string())
            }
            (Party::Rider, OrderStatus::Cancelled) => {
                Some("No need to deliver this order".to_string())
            }
            _ => None,
        };
        (title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{Profile, SqliteUserStore, UserStore};
    use tempfile::TempDir;

    struct Fixture {
        service: NotificationService,
        store: Arc<SqliteUserStore>,
        customer: usize,
        vendor: usize,
        rider: usize,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteUserStore::new(dir.path().join("user.db")).unwrap());
        let customer = store
            .create_user("c", "C", &Profile::Customer(Default::default()))
            .unwrap();
        let vendor = store
            .create_user(
                "v",
                "V",
                &Profile::default_for(crate::user::UserRole::Vendor, "V"),
            )
            .unwrap();
        let rider = store
            .create_user(
                "r",
                "R",
                &Profile::default_for(crate::user::UserRole::Rider, "R"),
            )
            .unwrap();
        let service = NotificationService::new(store.clone(), Arc::new(NotificationHub::new()));
        Fixture {
            service,
            store,
            customer,
            vendor,
            rider,
            _dir: dir,
        }
    }

    fn order(f: &Fixture, status: OrderStatus, rider: Option<usize>) -> Order {
        Order {
            id: "0f3c9a7e-1111-2222-3333-444455556666".to_string(),
            customer_id: f.customer,
            vendor_id: f.vendor,
            rider_id: rider,
            status,
            items: vec![],
            total_cents: 125_050,
            delivery_address: "Tom Mboya Street".to_string(),
            created: 0,
            updated: 0,
        }
    }

    #[tokio::test]
    async fn placed_order_notifies_customer_and_vendor() {
        let f = fixture();
        let created = f
            .service
            .fan_out_order_update(&order(&f, OrderStatus::Pending, None), None)
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created
            .iter()
            .all(|n| n.notification_type == NotificationType::OrderPlaced));

        let vendor_notifications = f.store.get_user_notifications(f.vendor).unwrap();
        assert_eq!(vendor_notifications.len(), 1);
        assert_eq!(vendor_notifications[0].title, "New order");
        assert!(vendor_notifications[0]
            .body
            .as_deref()
            .unwrap()
            .contains("KES 1250.50"));
        assert!(f.store.get_user_notifications(f.rider).unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_change_notifies_all_parties() {
        let f = fixture();
        let created = f
            .service
            .fan_out_order_update(
                &order(&f, OrderStatus::OutForDelivery, Some(f.rider)),
                Some(OrderStatus::Preparing),
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        for user in [f.customer, f.vendor, f.rider] {
            let n = f.store.get_user_notifications(user).unwrap();
            assert_eq!(n.len(), 1);
            assert_eq!(n[0].notification_type, NotificationType::OrderStatusChanged);
            assert_eq!(n[0].data["status"], "out_for_delivery");
            assert_eq!(n[0].data["previous_status"], "preparing");
        }
    }

    #[test]
    fn delivered_message_does_not_promise_points() {
        let f = fixture();
        let delivered = order(&f, OrderStatus::Delivered, Some(f.rider));
        let (title, body) = NotificationService::status_message(&delivered, Party::Customer);
        assert_eq!(title, "Order 0f3c9a7e is delivered");
        assert_eq!(body.as_deref(), Some("Enjoy your groceries!"));
    }

    #[tokio::test]
    async fn unchanged_status_writes_nothing() {
        let f = fixture();
        let created = f
            .service
            .fan_out_order_update(
                &order(&f, OrderStatus::Confirmed, None),
                Some(OrderStatus::Confirmed),
            )
            .await
            .unwrap();
        assert!(created.is_empty());
        assert_eq!(f.store.get_unread_count(f.customer).unwrap(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_created_notifications() {
        let f = fixture();
        let mut rx = f.service.hub().subscribe(f.customer).await;
        f.service
            .fan_out_order_update(&order(&f, OrderStatus::Pending, None), None)
            .await
            .unwrap();
        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.title, "Order placed");
    }

    #[tokio::test]
    async fn rider_assignment() {
        let f = fixture();
        let unassigned = f
            .service
            .notify_rider_assigned(&order(&f, OrderStatus::Confirmed, None))
            .await
            .unwrap();
        assert!(unassigned.is_empty());

        let created = f
            .service
            .notify_rider_assigned(&order(&f, OrderStatus::Confirmed, Some(f.rider)))
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        let rider_n = f.store.get_user_notifications(f.rider).unwrap();
        assert_eq!(rider_n[0].body.as_deref(), Some("Deliver to Tom Mboya Street"));
    }
}
