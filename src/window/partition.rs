//! Cap-aware window partitioning
//!
//! The search API never returns more than a fixed number of results for one
//! query, however many repositories actually match. [`partition`] splits a
//! window until every piece reports a total count within that cap, so paging
//! through each piece reaches every result.

use crate::github::ApiError;
use crate::window::DateWindow;
use async_trait::async_trait;

/// Source of total result counts for a window
///
/// The live implementation is [`crate::github::SearchClient`]; tests supply
/// in-memory oracles.
#[async_trait]
pub trait CountOracle: Send + Sync {
    /// Returns the total number of results the search reports for `window`
    async fn count(&self, window: &DateWindow) -> Result<u64, ApiError>;
}

/// A partition leaf: a window safe to page through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafWindow {
    /// The window to search
    pub window: DateWindow,

    /// Total count the oracle reported for this window
    pub total_count: u64,

    /// Results beyond the cap that no query can reach (irreducible single day)
    pub unreachable: u64,
}

/// Splits `window` into chronologically ordered leaves whose counts fit `cap`
///
/// A window within the cap is its own leaf. Otherwise it is bisected with
/// [`DateWindow::bisect`] and each half is partitioned in turn. A single day
/// whose count still exceeds the cap is kept as a leaf with its excess recorded
/// in [`LeafWindow::unreachable`].
///
/// Every call strictly shrinks the window, so the number of oracle queries is
/// bounded by twice the number of days in `window`.
///
/// # Errors
///
/// Propagates the first error returned by the oracle.
pub async fn partition<O>(
    window: DateWindow,
    oracle: &O,
    cap: u64,
) -> Result<Vec<LeafWindow>, ApiError>
where
    O: CountOracle + ?Sized,
{
    let mut leaves = Vec::new();
    // Right halves are pushed first so the left half is always popped next.
    let mut pending = vec![window];

    while let Some(current) = pending.pop() {
        let count = oracle.count(&current).await?;

        if count <= cap {
            tracing::debug!("Window {} holds {} results", current, count);
            leaves.push(LeafWindow {
                window: current,
                total_count: count,
                unreachable: 0,
            });
            continue;
        }

        match current.bisect() {
            Some((left, right)) => {
                tracing::debug!(
                    "Window {} holds {} results (cap {}), splitting into {} and {}",
                    current,
                    count,
                    cap,
                    left,
                    right
                );
                pending.push(right);
                pending.push(left);
            }
            None => {
                let unreachable = count - cap;
                tracing::warn!(
                    "Single day {} holds {} results, {} beyond the cap of {} cannot be reached",
                    current.start(),
                    count,
                    unreachable,
                    cap
                );
                leaves.push(LeafWindow {
                    window: current,
                    total_count: count,
                    unreachable,
                });
            }
        }
    }

    Ok(leaves)
}
