use ic_canister_log::{declare_log_buffer, GlobalBuffer, LogEntry, Sink};

#[doc(hidden)]
pub use ic_canister_log as canister_log;

// High-priority messages.
declare_log_buffer!(name = INFO_BUF, capacity = 1000);

// Low-priority info messages.
declare_log_buffer!(name = DEBUG_BUF, capacity = 1000);

pub const INFO: PrintProxySink = PrintProxySink("INFO", &INFO_BUF, true);
// Full request and response bodies land here, so it is buffered only.
pub const DEBUG: PrintProxySink = PrintProxySink("DEBUG", &DEBUG_BUF, false);

/// Appends entries to its buffer. Sinks flagged as mirrored also print
/// them to stderr.
#[derive(Clone, Copy)]
pub struct PrintProxySink(&'static str, &'static GlobalBuffer, bool);

impl PrintProxySink {
    pub fn is_mirrored(&self) -> bool {
        self.2
    }
}

impl Sink for PrintProxySink {
    fn append(&self, entry: LogEntry) {
        if self.is_mirrored() {
            eprintln!("{} {}:{} {}", self.0, entry.file, entry.line, entry.message);
        }
        self.1.append(entry)
    }
}

/// Appends a formatted entry to `$sink`. Unlike `ic_canister_log::log!` this
/// does not echo the message to stdout; the sink decides what is printed.
#[macro_export]
macro_rules! log {
    ($sink:expr, $message:expr $(,$args:expr)* $(,)*) => {{
        use $crate::logs::canister_log::Sink;
        let message = std::format!($message $(,$args)*);
        (&$sink).append($crate::logs::canister_log::LogEntry {
            timestamp: $crate::logs::canister_log::now(),
            message,
            file: std::file!(),
            line: std::line!(),
            counter: $crate::logs::canister_log::entry_counter::increment(),
        });
    }};
}
