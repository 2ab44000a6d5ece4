use chrono::Local;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f%:z";

/// Log timestamps in the machine's local time zone.
pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(LOG_TIME_FORMAT))
    }
}
