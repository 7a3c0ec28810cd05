//! Trace output that stamps events with simulated time.

use std::cell::Cell;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::types::{CoreId, Time};

thread_local! {
    static SIM_CLOCK: Cell<Time> = const { Cell::new(0) };
    static SIM_CORE: Cell<Option<CoreId>> = const { Cell::new(None) };
}

/// Set the simulated clock shown by [`SimFormat`] on this thread.
pub fn set_sim_clock(now: Time) {
    SIM_CLOCK.with(|c| c.set(now));
}

pub fn sim_clock() -> Time {
    SIM_CLOCK.with(|c| c.get())
}

/// Set the core currently being stepped, or `None` between per-core phases.
pub fn set_sim_core(core: Option<CoreId>) {
    SIM_CORE.with(|c| c.set(core));
}

pub fn sim_core() -> Option<CoreId> {
    SIM_CORE.with(|c| c.get())
}

/// Format a u64 with underscore grouping (groups of 3 from the right).
pub(crate) fn fmt_grouped(v: u64) -> String {
    let digits = v.to_string();
    let len = digits.len();
    if len <= 3 {
        return digits;
    }
    let mut result = String::with_capacity(len + (len - 1) / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push('_');
        }
        result.push(ch);
    }
    result
}

/// Tick stamp: grouped digits, then `:C<n>` for a core or `:P` for
/// processor-wide phases.
///
/// - `[      1_250:C2]`
/// - `[         40:P]`
pub struct FmtTick {
    pub tick: Time,
    pub core: Option<CoreId>,
}

impl fmt::Display for FmtTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grouped = fmt_grouped(self.tick);
        match self.core {
            Some(core) => write!(f, "{grouped:>11}:C{}", core.0),
            None => write!(f, "{grouped:>11}:P"),
        }
    }
}

/// Event formatter that shows the simulated tick instead of wall-clock time.
pub struct SimFormat;

impl<S, N> FormatEvent<S, N> for SimFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let stamp = FmtTick {
            tick: sim_clock(),
            core: sim_core(),
        };
        write!(writer, "[{stamp}] ")?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::ERROR => "\x1b[31m",
                Level::WARN => "\x1b[33m",
                Level::INFO => "\x1b[32m",
                Level::DEBUG => "\x1b[34m",
                Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{color}{level:>5}\x1b[0m ")?;
        } else {
            write!(writer, "{level:>5} ")?;
        }

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        write!(writer, "{}", visitor.message)?;
        for (key, value) in &visitor.fields {
            write!(writer, " {key}={value}")?;
        }

        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.push((field.name(), value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.push((field.name(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.push((field.name(), value.to_string()));
    }
}

/// Install [`SimFormat`] with an `EnvFilter` read from `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(SimFormat)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_grouped() {
        assert_eq!(fmt_grouped(0), "0");
        assert_eq!(fmt_grouped(999), "999");
        assert_eq!(fmt_grouped(1_000), "1_000");
        assert_eq!(fmt_grouped(1_234_567), "1_234_567");
    }

    #[test]
    fn test_fmt_tick() {
        let stamp = FmtTick {
            tick: 1_250,
            core: Some(CoreId(2)),
        };
        assert_eq!(stamp.to_string(), "      1_250:C2");
        let stamp = FmtTick {
            tick: 40,
            core: None,
        };
        assert_eq!(stamp.to_string(), "         40:P");
    }

    #[test]
    fn clock_is_thread_local() {
        set_sim_clock(77);
        set_sim_core(Some(CoreId(1)));
        std::thread::spawn(|| {
            assert_eq!(sim_clock(), 0);
            assert_eq!(sim_core(), None);
        })
        .join()
        .unwrap();
        assert_eq!(sim_clock(), 77);
        assert_eq!(sim_core(), Some(CoreId(1)));
    }
}
