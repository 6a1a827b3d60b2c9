//! Organization and repository pulls.
//!
//! A pull fetches state from a [`GitHost`](crate::host::GitHost) and
//! reconciles it with the database. The [`Reconciler`] returns the
//! [`PullEvent`]s describing what changed and what failed.

mod errors;
mod events;
mod progress;
mod reconcile;

pub use errors::{PullError, Result};
pub use events::PullEvent;
pub use progress::{ProgressCallback, PullProgress, emit};
pub use reconcile::{PullReport, PullSummary, Reconciler};
