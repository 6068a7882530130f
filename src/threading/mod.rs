//! Generic execution loops over pollable pools of runnable items.
//!
//! [`WorkItemThread`] drives any [`WorkItemPool`] at a fixed cadence with
//! panic containment, optional abort timeouts, and slow-task diagnostics;
//! [`LogicThread`] is the concrete batch-mode pool that normally drives
//! the timeline.

mod logic_thread;
mod thread;
mod work_item;

pub use logic_thread::LogicThread;
pub use thread::{ThreadOptions, WorkItemThread};
pub use work_item::{WorkItem, WorkItemPool, work_item, work_item_with};
