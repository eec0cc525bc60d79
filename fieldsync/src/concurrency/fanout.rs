use std::future::Future;

use futures::{StreamExt, TryStreamExt, stream};

use crate::error::SyncResult;

/// Runs `f` for every item with at most `limit` futures in flight.
///
/// Results keep the order of `items`. The first error stops the fan-out and is returned.
pub async fn try_fan_out<I, T, F, Fut>(items: I, limit: usize, f: F) -> SyncResult<Vec<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::bail;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn keeps_input_order_and_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = try_fan_out(0..20u64, 3, |i| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20 - i)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(i * 2)
            }
        })
        .await
        .unwrap();

        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn returns_the_first_error() {
        let result = try_fan_out(0..5, 2, |i| async move {
            if i == 3 {
                bail!(ErrorKind::DestinationQueryFailed, "Lookup failed");
            }
            Ok(i)
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::DestinationQueryFailed);
    }
}
