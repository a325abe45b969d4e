use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::restaurant::Restaurant;
use crate::models::review::Review;
use crate::query::RestaurantFilter;

pub type RestaurantsCallback = Arc<dyn Fn(Vec<Restaurant>) + Send + Sync>;
pub type RestaurantCallback = Arc<dyn Fn(Option<Restaurant>) + Send + Sync>;
pub type ReviewsCallback = Arc<dyn Fn(Vec<Review>) + Send + Sync>;

// What a committed write touched. Watchers use this to decide whether their
// result set may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    // A restaurant document was created or its fields were updated.
    Restaurant { restaurant_id: String },
    // A review was added under a restaurant. The parent aggregates changed
    // in the same commit.
    Review { restaurant_id: String },
}

impl ChangeEvent {
    pub fn restaurant_id(&self) -> &str {
        match self {
            ChangeEvent::Restaurant { restaurant_id } => restaurant_id,
            ChangeEvent::Review { restaurant_id } => restaurant_id,
        }
    }
}

// A registered live query. The callback receives the full current result
// set on every delivery, never a delta.
#[derive(Clone)]
pub enum Watcher {
    Restaurants {
        filter: RestaurantFilter,
        callback: RestaurantsCallback,
    },
    RestaurantById {
        restaurant_id: String,
        callback: RestaurantCallback,
    },
    Reviews {
        restaurant_id: String,
        callback: ReviewsCallback,
    },
}

impl Watcher {
    // Whether this watcher's result set may be affected by the event.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            // Membership and ordering of the list can change on any write.
            Watcher::Restaurants { .. } => true,
            Watcher::RestaurantById { restaurant_id, .. } => {
                event.restaurant_id() == restaurant_id
            }
            Watcher::Reviews { restaurant_id, .. } => {
                matches!(event, ChangeEvent::Review { restaurant_id: id } if id == restaurant_id)
            }
        }
    }
}

// Registry of live watchers, shared between the database and the
// subscription handles it hands out.
#[derive(Default)]
pub struct WatcherRegistry {
    next_id: AtomicU64,
    watchers: Mutex<HashMap<u64, Watcher>>,
}

impl WatcherRegistry {
    pub fn register(&self, watcher: Watcher) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.watchers.lock().unwrap().insert(id, watcher);
        id
    }

    pub fn remove(&self, id: u64) {
        self.watchers.lock().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.watchers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Clones out the watchers affected by the event so callbacks run
    // without the registry lock held.
    pub fn matching(&self, event: &ChangeEvent) -> Vec<Watcher> {
        self.watchers
            .lock()
            .unwrap()
            .values()
            .filter(|watcher| watcher.matches(event))
            .cloned()
            .collect()
    }
}

// Handle for a live subscription. Dropping it does NOT cancel the
// subscription; the caller must call `unsubscribe` to release the watcher.
pub struct Subscription {
    id: u64,
    registry: Arc<WatcherRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: Arc<WatcherRegistry>) -> Self {
        Self { id, registry }
    }

    pub fn unsubscribe(self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_event(id: &str) -> ChangeEvent {
        ChangeEvent::Review {
            restaurant_id: id.to_string(),
        }
    }

    #[test]
    fn list_watchers_match_every_event() {
        let watcher = Watcher::Restaurants {
            filter: RestaurantFilter::default(),
            callback: Arc::new(|_| {}),
        };
        assert!(watcher.matches(&review_event("a")));
        assert!(watcher.matches(&ChangeEvent::Restaurant {
            restaurant_id: "b".into(),
        }));
    }

    #[test]
    fn review_watchers_match_only_their_restaurant() {
        let watcher = Watcher::Reviews {
            restaurant_id: "a".into(),
            callback: Arc::new(|_| {}),
        };
        assert!(watcher.matches(&review_event("a")));
        assert!(!watcher.matches(&review_event("b")));
        // A bare restaurant update does not change the review set.
        assert!(!watcher.matches(&ChangeEvent::Restaurant {
            restaurant_id: "a".into(),
        }));
    }

    #[test]
    fn unsubscribe_removes_the_watcher() {
        let registry = Arc::new(WatcherRegistry::default());
        let id = registry.register(Watcher::RestaurantById {
            restaurant_id: "a".into(),
            callback: Arc::new(|_| {}),
        });
        assert_eq!(registry.len(), 1);

        Subscription::new(id, registry.clone()).unsubscribe();
        assert!(registry.is_empty());
    }
}
