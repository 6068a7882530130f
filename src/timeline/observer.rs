use std::sync::Arc;

/// A timeline notification target.
///
/// One function-capability shape covers every observer variant: no-argument
/// actions and data-bound actions are closed over at construction, and the
/// timeline reduces everything to `notify(delta_ms)`.
///
/// Clones share identity, which is what [`same_observer`](Self::same_observer)
/// and `Timeline::unsubscribe` compare.
#[derive(Clone)]
pub struct TimelineObserver {
    notify: Arc<dyn Fn(f64) + Send + Sync>,
}

impl TimelineObserver {
    /// Observer that ignores the delta.
    pub fn from_action(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            notify: Arc::new(move |_| action()),
        }
    }

    /// Observer that receives the elapsed milliseconds since the previous
    /// tick.
    pub fn from_delta(action: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            notify: Arc::new(action),
        }
    }

    /// Observer bound to a value captured at construction.
    pub fn with_data<T: Send + Sync + 'static>(
        action: impl Fn(&T) + Send + Sync + 'static,
        data: T,
    ) -> Self {
        Self {
            notify: Arc::new(move |_| action(&data)),
        }
    }

    pub fn notify(&self, delta_ms: f64) {
        (self.notify)(delta_ms);
    }

    /// Identity comparison; true for clones of the same observer.
    pub fn same_observer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.notify, &other.notify)
    }
}

impl std::fmt::Debug for TimelineObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineObserver")
            .field("ptr", &Arc::as_ptr(&self.notify))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn clones_share_identity() {
        let a = TimelineObserver::from_action(|| {});
        let b = a.clone();
        let c = TimelineObserver::from_action(|| {});
        assert!(a.same_observer(&b));
        assert!(!a.same_observer(&c));
    }

    #[test]
    fn data_bound_observer_sees_its_value() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let observer = TimelineObserver::with_data(
            move |v: &usize| {
                seen2.store(*v, Ordering::SeqCst);
            },
            42usize,
        );
        observer.notify(16.0);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }
}
