//! Per-client cart and loyalty state.
//!
//! State is kept as JSON strings in a [`StateStorage`], one key per user and
//! reducer, the way a browser keeps it in local storage. Nothing here is
//! reconciled against orders except at checkout.

mod storage;

pub use storage::{FileStateStorage, MemoryStateStorage, StateStorage, StateStorageError};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cart::{Cart, CartAction, CartError, CartItem};
use crate::loyalty::{LoyaltyLedger, RedemptionError, Reward, RewardCatalog};

pub const CART_KEY_PREFIX: &str = "mboga-cart";
pub const LOYALTY_KEY_PREFIX: &str = "mboga-loyalty";

pub fn cart_key(user_id: usize) -> String {
    format!("{}:{}", CART_KEY_PREFIX, user_id)
}

pub fn loyalty_key(user_id: usize) -> String {
    format!("{}:{}", LOYALTY_KEY_PREFIX, user_id)
}

/// Missing keys and unreadable payloads both give `T::default()`.
pub fn load_state<T: DeserializeOwned + Default>(
    storage: &dyn StateStorage,
    key: &str,
) -> Result<T, StateStorageError> {
    let raw = match storage.get_item(key)? {
        Some(raw) => raw,
        None => return Ok(T::default()),
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Ok(state),
        Err(err) => {
            warn!("Discarding unreadable state under {}: {}", key, err);
            Ok(T::default())
        }
    }
}

pub fn save_state<T: Serialize>(
    storage: &dyn StateStorage,
    key: &str,
    state: &T,
) -> Result<(), StateStorageError> {
    let raw = serde_json::to_string(state)?;
    storage.set_item(key, &raw)
}

#[derive(Debug, Error)]
pub enum ClientStateError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Redemption(#[from] RedemptionError),
    #[error(transparent)]
    Storage(#[from] StateStorageError),
}

/// Result of [`ClientStateService::checkout`].
#[derive(Debug)]
pub struct CheckoutOutcome<O, E> {
    pub placed: Vec<O>,
    /// Vendors whose order was not placed. Their lines are still in the cart.
    pub failed: Vec<(usize, E)>,
}

pub struct ClientStateService {
    storage: Arc<dyn StateStorage>,
    rewards: RewardCatalog,
    // One lock per user, held for a whole load-modify-save cycle
    user_locks: RwLock<HashMap<usize, Arc<Mutex<()>>>>,
}

impl ClientStateService {
    pub fn new(storage: Arc<dyn StateStorage>, rewards: RewardCatalog) -> Self {
        Self {
            storage,
            rewards,
            user_locks: RwLock::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: usize) -> Arc<Mutex<()>> {
        if let Some(lock) = self.user_locks.read().unwrap().get(&user_id) {
            return lock.clone();
        }
        self.user_locks
            .write()
            .unwrap()
            .entry(user_id)
            .or_default()
            .clone()
    }

    pub fn rewards(&self) -> &RewardCatalog {
        &self.rewards
    }

    pub fn get_cart(&self, user_id: usize) -> Result<Cart, StateStorageError> {
        load_state(self.storage.as_ref(), &cart_key(user_id))
    }

    /// Runs `f` on the stored cart and saves the result if `f` succeeds.
    pub fn update_cart<R, E, F>(&self, user_id: usize, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Cart) -> Result<R, E>,
        E: From<StateStorageError>,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();
        let key = cart_key(user_id);
        let mut cart: Cart = load_state(self.storage.as_ref(), &key)?;
        let result = f(&mut cart)?;
        save_state(self.storage.as_ref(), &key, &cart)?;
        Ok(result)
    }

    pub fn apply_cart_action(
        &self,
        user_id: usize,
        action: CartAction,
    ) -> Result<Cart, ClientStateError> {
        self.update_cart(user_id, |cart| {
            cart.apply(action)?;
            Ok(cart.clone())
        })
    }

    /// Places one order per vendor in the cart through `place`.
    ///
    /// A vendor's lines are taken out of the stored cart before its order is
    /// placed and written back if placing fails, so a retried checkout never
    /// orders the same lines twice. A vendor whose lines cannot be taken out
    /// is reported as failed without calling `place`.
    pub fn checkout<O, E, F>(
        &self,
        user_id: usize,
        mut place: F,
    ) -> Result<CheckoutOutcome<O, E>, StateStorageError>
    where
        F: FnMut(usize, &[CartItem]) -> Result<O, E>,
        E: From<StateStorageError>,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();
        let key = cart_key(user_id);
        let mut cart: Cart = load_state(self.storage.as_ref(), &key)?;

        let groups: Vec<(usize, Vec<CartItem>)> = cart
            .items_by_vendor()
            .into_iter()
            .map(|(vendor_id, items)| (vendor_id, items.into_iter().cloned().collect()))
            .collect();

        let mut outcome = CheckoutOutcome {
            placed: vec![],
            failed: vec![],
        };
        for (vendor_id, lines) in groups {
            let mut remaining = cart.clone();
            remaining.items.retain(|i| i.vendor_id != vendor_id);
            if let Err(e) = save_state(self.storage.as_ref(), &key, &remaining) {
                error!(
                    "Cannot take vendor {} lines out of the cart of {}: {}",
                    vendor_id, user_id, e
                );
                outcome.failed.push((vendor_id, e.into()));
                continue;
            }

            match place(vendor_id, &lines) {
                Ok(order) => {
                    cart = remaining;
                    outcome.placed.push(order);
                }
                Err(e) => {
                    debug!("Putting vendor {} lines back in the cart of {}", vendor_id, user_id);
                    // A later successful save writes `cart`, lines included.
                    if let Err(restore) = save_state(self.storage.as_ref(), &key, &cart) {
                        error!(
                            "Cannot put vendor {} lines back in the cart of {}: {}",
                            vendor_id, user_id, restore
                        );
                    }
                    outcome.failed.push((vendor_id, e));
                }
            }
        }
        Ok(outcome)
    }

    pub fn get_loyalty(&self, user_id: usize) -> Result<LoyaltyLedger, StateStorageError> {
        load_state(self.storage.as_ref(), &loyalty_key(user_id))
    }

    fn update_loyalty<R, E, F>(&self, user_id: usize, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut LoyaltyLedger) -> Result<R, E>,
        E: From<StateStorageError>,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();
        let key = loyalty_key(user_id);
        let mut ledger: LoyaltyLedger = load_state(self.storage.as_ref(), &key)?;
        let result = f(&mut ledger)?;
        save_state(self.storage.as_ref(), &key, &ledger)?;
        Ok(result)
    }

    /// Returns the points earned and the updated ledger.
    pub fn earn_points(
        &self,
        user_id: usize,
        amount_cents: u64,
        description: &str,
    ) -> Result<(u64, LoyaltyLedger), StateStorageError> {
        self.update_loyalty(user_id, |ledger| {
            let earned = ledger.earn_points(amount_cents, description);
            Ok((earned, ledger.clone()))
        })
    }

    pub fn redeem(
        &self,
        user_id: usize,
        reward_id: &str,
    ) -> Result<(Reward, LoyaltyLedger), ClientStateError> {
        self.update_loyalty(user_id, |ledger| {
            let reward = ledger.redeem(reward_id, &self.rewards)?;
            Ok((reward, ledger.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn item(product_id: usize, vendor_id: usize, quantity: u32) -> CartItem {
        CartItem {
            product_id,
            vendor_id,
            name: "Sukuma".to_string(),
            unit: "bunch".to_string(),
            unit_price_cents: 2_000,
            quantity,
            image_url: None,
        }
    }

    /// Memory storage whose writes can be switched off.
    #[derive(Default)]
    struct SwitchableStorage {
        inner: MemoryStateStorage,
        fail_writes: AtomicBool,
    }

    impl StateStorage for SwitchableStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StateStorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StateStorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StateStorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StateStorageError> {
            self.inner.remove_item(key)
        }
    }

    fn service() -> ClientStateService {
        ClientStateService::new(Arc::new(MemoryStateStorage::new()), RewardCatalog::default())
    }

    #[test]
    fn missing_and_corrupt_state_load_as_default() {
        let storage = MemoryStateStorage::new();
        let cart: Cart = load_state(&storage, "nothing").unwrap();
        assert!(cart.is_empty());

        storage.set_item("broken", "{not json").unwrap();
        let ledger: LoyaltyLedger = load_state(&storage, "broken").unwrap();
        assert_eq!(ledger, LoyaltyLedger::default());
    }

    #[test]
    fn state_roundtrips_through_files() {
        let dir = TempDir::new().unwrap();
        let mut cart = Cart::new();
        cart.add_item(item(1, 1, 2)).unwrap();
        cart.add_item(item(2, 3, 1)).unwrap();
        let mut ledger = LoyaltyLedger::new();
        ledger.earn_points(50_000, "Order");

        {
            let storage = FileStateStorage::new(dir.path()).unwrap();
            save_state(&storage, &cart_key(9), &cart).unwrap();
            save_state(&storage, &loyalty_key(9), &ledger).unwrap();
        }

        let storage = FileStateStorage::new(dir.path()).unwrap();
        let loaded_cart: Cart = load_state(&storage, &cart_key(9)).unwrap();
        let loaded_ledger: LoyaltyLedger = load_state(&storage, &loyalty_key(9)).unwrap();
        assert_eq!(loaded_cart, cart);
        assert_eq!(loaded_ledger.points, 50);
        assert_eq!(loaded_ledger, ledger);
    }

    #[test]
    fn keys_are_per_user() {
        assert_eq!(cart_key(5), "mboga-cart:5");
        assert_eq!(loyalty_key(5), "mboga-loyalty:5");

        let service = service();
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 1, 1)))
            .unwrap();
        assert_eq!(service.get_cart(1).unwrap().total_items(), 1);
        assert!(service.get_cart(2).unwrap().is_empty());
    }

    #[test]
    fn cart_actions_persist() {
        let service = service();
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 1, 1)))
            .unwrap();
        let cart = service
            .apply_cart_action(1, CartAction::AddItem(item(1, 1, 2)))
            .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(service.get_cart(1).unwrap(), cart);
    }

    #[test]
    fn failed_cart_action_is_not_saved() {
        let service = service();
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 1, 1)))
            .unwrap();
        let err = service
            .apply_cart_action(1, CartAction::AddItem(item(2, 1, 0)))
            .unwrap_err();
        assert!(matches!(err, ClientStateError::Cart(_)));
        assert_eq!(service.get_cart(1).unwrap().items.len(), 1);
    }

    #[test]
    fn earn_then_redeem_insufficient_keeps_balance() {
        let catalog = RewardCatalog::new(vec![Reward {
            id: "hundred".to_string(),
            name: "Hundred".to_string(),
            description: String::new(),
            points_required: 100,
            is_active: true,
        }]);
        let service = ClientStateService::new(Arc::new(MemoryStateStorage::new()), catalog);

        let (earned, _) = service.earn_points(3, 50_000, "Order").unwrap();
        assert_eq!(earned, 50);

        let err = service.redeem(3, "hundred").unwrap_err();
        assert!(matches!(
            err,
            ClientStateError::Redemption(RedemptionError::InsufficientPoints { .. })
        ));
        assert_eq!(service.get_loyalty(3).unwrap().points, 50);

        service.earn_points(3, 50_000, "Order 2").unwrap();
        let (reward, ledger) = service.redeem(3, "hundred").unwrap();
        assert_eq!(reward.id, "hundred");
        assert_eq!(ledger.points, 0);
        assert_eq!(service.get_loyalty(3).unwrap().points, 0);
    }

    #[test]
    fn checkout_takes_lines_out_before_placing() {
        let storage = Arc::new(MemoryStateStorage::new());
        let service = ClientStateService::new(storage.clone(), RewardCatalog::default());
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 10, 2)))
            .unwrap();
        service
            .apply_cart_action(1, CartAction::AddItem(item(2, 20, 1)))
            .unwrap();

        let outcome = service
            .checkout(1, |vendor_id, lines| {
                let stored: Cart = load_state(storage.as_ref(), &cart_key(1)).unwrap();
                assert!(stored.items.iter().all(|i| i.vendor_id != vendor_id));
                Ok::<_, StateStorageError>((vendor_id, lines.len()))
            })
            .unwrap();

        assert_eq!(outcome.placed, vec![(10, 1), (20, 1)]);
        assert!(outcome.failed.is_empty());
        assert!(service.get_cart(1).unwrap().is_empty());
    }

    #[test]
    fn failed_vendor_lines_go_back_in_the_cart() {
        let service = service();
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 10, 2)))
            .unwrap();
        service
            .apply_cart_action(1, CartAction::AddItem(item(2, 20, 1)))
            .unwrap();

        let outcome = service
            .checkout(1, |vendor_id, _| {
                if vendor_id == 10 {
                    Err(StateStorageError::InvalidKey("sold out".to_string()))
                } else {
                    Ok(vendor_id)
                }
            })
            .unwrap();

        assert_eq!(outcome.placed, vec![20]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, 10);
        let cart = service.get_cart(1).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].vendor_id, 10);
    }

    #[test]
    fn checkout_places_nothing_when_the_cart_cannot_be_saved() {
        let storage = Arc::new(SwitchableStorage::default());
        let service = ClientStateService::new(storage.clone(), RewardCatalog::default());
        service
            .apply_cart_action(1, CartAction::AddItem(item(1, 10, 2)))
            .unwrap();
        service
            .apply_cart_action(1, CartAction::AddItem(item(2, 20, 1)))
            .unwrap();
        storage.fail_writes.store(true, Ordering::SeqCst);

        let placed = AtomicUsize::new(0);
        for _ in 0..2 {
            let outcome = service
                .checkout(1, |vendor_id, _| {
                    placed.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StateStorageError>(vendor_id)
                })
                .unwrap();
            assert!(outcome.placed.is_empty());
            assert_eq!(outcome.failed.len(), 2);
        }

        assert_eq!(placed.load(Ordering::SeqCst), 0);
        assert_eq!(service.get_cart(1).unwrap().items.len(), 2);
    }

    #[test]
    fn users_do_not_share_a_lock() {
        let service = service();
        let lock = service.user_lock(1);
        let _held = lock.lock().unwrap();

        // Would deadlock if user 2 waited on user 1
        service
            .apply_cart_action(2, CartAction::AddItem(item(1, 10, 1)))
            .unwrap();
        assert!(Arc::ptr_eq(&service.user_lock(1), &lock));
        assert!(!Arc::ptr_eq(&service.user_lock(2), &lock));
    }
}
