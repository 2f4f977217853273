use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub const FEED_POLLS_TOTAL: &str = "quake_feed_polls_total";
pub const FEED_ERRORS_TOTAL: &str = "quake_feed_errors_total";
pub const FEED_FETCH_MS: &str = "quake_feed_fetch_ms";
pub const EVENTS_TOTAL: &str = "quake_events_total";
pub const NOTIFICATIONS_TOTAL: &str = "quake_notifications_total";
pub const FORMAT_ERRORS_TOTAL: &str = "quake_format_errors_total";
pub const DELIVERIES_TOTAL: &str = "quake_deliveries_total";
pub const DELIVERY_FAILURES_TOTAL: &str = "quake_delivery_failures_total";
pub const LAST_CYCLE_TS: &str = "quake_last_cycle_ts";

/// One-time metrics registration (so series carry descriptions once a
/// recorder is installed).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(FEED_POLLS_TOTAL, "Feed polls attempted, per source.");
        describe_counter!(FEED_ERRORS_TOTAL, "Feed fetch/parse/timeout failures.");
        describe_histogram!(FEED_FETCH_MS, "Upstream HTTP fetch time in milliseconds.");
        describe_counter!(EVENTS_TOTAL, "New (deduplicated) events surfaced.");
        describe_counter!(
            NOTIFICATIONS_TOTAL,
            "Subscriber notifications that passed the worthiness check."
        );
        describe_counter!(FORMAT_ERRORS_TOTAL, "Alerts dropped while rendering.");
        describe_counter!(DELIVERIES_TOTAL, "Delivery tasks dispatched, per channel.");
        describe_counter!(
            DELIVERY_FAILURES_TOTAL,
            "Delivery tasks that failed or were skipped, per channel."
        );
        describe_gauge!(LAST_CYCLE_TS, "Unix ts when the poll cycle last ran.");
    });
}
