use verwatch_core::NotificationSink;

/// Prints update messages to stdout.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify_update(&self, message: &str) {
        log::info!("{message}");
        println!("{message}");
    }

    fn notify_up_to_date(&self, message: &str) {
        println!("{message}");
    }
}
