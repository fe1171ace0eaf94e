//! Notification outbox drain.
//!
//! Booking admissions enqueue a [`NotificationRequest`] in the same
//! transaction as the insert; this task drains the queue and hands each
//! entry to a [`NotificationSink`]. Delivery is at-least-once: an entry is
//! only marked dispatched after the sink accepts it, so a crash between
//! deliver and mark re-delivers on the next pass.

use lagoon_core::store::{BookingStore, NotificationRequest, StoreError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

const DRAIN_BATCH: u32 = 50;

/// Where admitted-booking notifications go (chat-bot push, email relay).
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    fn deliver<'a>(
        &'a self,
        request: &'a NotificationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Sink that records notifications in the log. Stands in until an external
/// delivery channel is wired up.
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn deliver<'a>(
        &'a self,
        request: &'a NotificationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                booking_id = %request.booking_id,
                reference = %request.reference,
                guest = %request.guest_name,
                resort = %request.resort_name,
                total = %request.total,
                "booking notification"
            );
            Ok(())
        })
    }
}

/// Drain one batch. Returns how many entries were dispatched.
///
/// A sink failure leaves the entry pending for the next pass; a later entry
/// can still dispatch in the same batch.
///
/// # Errors
///
/// Returns [`StoreError`] when the outbox itself cannot be read or updated.
pub async fn drain_once(
    store: &Arc<dyn BookingStore>,
    sink: &Arc<dyn NotificationSink>,
) -> Result<usize, StoreError> {
    let pending = store.pending_notifications(DRAIN_BATCH).await?;
    let mut dispatched = 0;
    for entry in pending {
        match sink.deliver(&entry.payload).await {
            Ok(()) => {
                store.mark_notification_dispatched(entry.id).await?;
                dispatched += 1;
            }
            Err(error) => {
                metrics::counter!("lagoon_notifications_failed_total").increment(1);
                tracing::warn!(
                    outbox_id = %entry.id,
                    booking_id = %entry.payload.booking_id,
                    %error,
                    "notification delivery failed; will retry"
                );
            }
        }
    }
    if dispatched > 0 {
        metrics::counter!("lagoon_notifications_dispatched_total").increment(dispatched as u64);
    }
    Ok(dispatched)
}

/// Run the drain loop until the task is aborted.
pub async fn run_notifier(
    store: Arc<dyn BookingStore>,
    sink: Arc<dyn NotificationSink>,
    poll_interval: Duration,
) {
    loop {
        if let Err(error) = drain_once(&store, &sink).await {
            tracing::warn!(%error, "notification drain failed; retrying next pass");
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use lagoon_core::store::{NewBookingRecord, NotificationRequest};
    use lagoon_core::types::{
        BookingId, BookingReference, BookingStatus, Money, PaymentStatus, Resort,
    };
    use lagoon_testing::{InMemoryBookingStore, fixtures};
    use std::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<NotificationRequest>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn deliver<'a>(
            &'a self,
            request: &'a NotificationRequest,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                if self.fail {
                    anyhow::bail!("sink offline");
                }
                self.delivered.lock().unwrap().push(request.clone());
                Ok(())
            })
        }
    }

    async fn seed_outbox_entry(store: &InMemoryBookingStore, resort: &Resort) {
        let id = BookingId::new();
        let record = NewBookingRecord {
            id,
            resort_id: resort.id,
            guest_name: "Asha".to_string(),
            guest_email: "asha@example.com".to_string(),
            guest_phone: "9999999999".to_string(),
            check_in: fixtures::date(2025, 6, 1),
            check_out: fixtures::date(2025, 6, 2),
            guests: 2,
            base_price: Money::new(1000),
            platform_fee: Money::new(15),
            discount: Money::new(0),
            total_price: Money::new(1015),
            reference: BookingReference::derive(id),
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
        };
        let notification = NotificationRequest {
            booking_id: id,
            reference: record.reference.as_str().to_string(),
            guest_name: record.guest_name.clone(),
            guest_email: record.guest_email.clone(),
            guest_phone: record.guest_phone.clone(),
            resort_name: resort.name.clone(),
            check_in: record.check_in,
            check_out: record.check_out,
            total: record.total_price,
        };
        store
            .insert_booking(record, None, notification)
            .await
            .expect("booking should insert");
    }

    #[tokio::test]
    async fn dispatched_entries_leave_the_queue() {
        let store = Arc::new(InMemoryBookingStore::new());
        let resort = fixtures::resort("Blue Lagoon", 1000);
        store.seed_resort(resort.clone());
        seed_outbox_entry(&store, &resort).await;

        let sink = Arc::new(RecordingSink::new(false));
        let store_dyn: Arc<dyn BookingStore> = store.clone();
        let sink_dyn: Arc<dyn NotificationSink> = sink.clone();

        let first = drain_once(&store_dyn, &sink_dyn).await.expect("drain");
        assert_eq!(first, 1);
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);

        let second = drain_once(&store_dyn, &sink_dyn).await.expect("drain");
        assert_eq!(second, 0, "dispatched entries are not re-delivered");
    }

    #[tokio::test]
    async fn failed_deliveries_stay_pending() {
        let store = Arc::new(InMemoryBookingStore::new());
        let resort = fixtures::resort("Blue Lagoon", 1000);
        store.seed_resort(resort.clone());
        seed_outbox_entry(&store, &resort).await;

        let store_dyn: Arc<dyn BookingStore> = store.clone();
        let failing: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new(true));
        let dispatched = drain_once(&store_dyn, &failing).await.expect("drain");
        assert_eq!(dispatched, 0);

        // The entry survives for a healthy sink on the next pass.
        let healthy: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new(false));
        let dispatched = drain_once(&store_dyn, &healthy).await.expect("drain");
        assert_eq!(dispatched, 1);
    }
}
