use std::sync::Arc;

/// A runnable item executed by a [`WorkItemThread`](super::WorkItemThread).
pub trait WorkItem: Send + Sync {
    /// Human-readable description used in diagnostics; may be empty.
    fn description(&self) -> &str;

    fn run(&self);
}

/// A pollable pool of runnable items.
///
/// Two retrieval modes exist: batch pools hand back their entire current
/// set each cycle (`batch_mode() == true`); single-item pools hand back at
/// most one item per pull and are expected to report their backlog depth
/// through `queue_len`.
pub trait WorkItemPool: Send + Sync {
    fn batch_mode(&self) -> bool;

    fn queue_len(&self) -> usize;

    /// The next runnable item(s): the whole working set in batch mode,
    /// zero or one item in single mode.
    fn next_items(&self) -> Vec<Arc<dyn WorkItem>>;
}

struct FnWorkItem {
    description: String,
    action: Box<dyn Fn() + Send + Sync>,
}

impl WorkItem for FnWorkItem {
    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self) {
        (self.action)();
    }
}

/// Wraps a closure as a work item.
pub fn work_item(
    description: impl Into<String>,
    action: impl Fn() + Send + Sync + 'static,
) -> Arc<dyn WorkItem> {
    Arc::new(FnWorkItem {
        description: description.into(),
        action: Box::new(action),
    })
}

/// Wraps a closure plus a bound value as a work item; the value is
/// captured at construction and borrowed on every run.
pub fn work_item_with<T: Send + Sync + 'static>(
    description: impl Into<String>,
    action: impl Fn(&T) + Send + Sync + 'static,
    data: T,
) -> Arc<dyn WorkItem> {
    Arc::new(FnWorkItem {
        description: description.into(),
        action: Box::new(move || action(&data)),
    })
}
