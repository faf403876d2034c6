use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use colored::*;
use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

fn style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

/// A span that shows a spinner for as long as it is entered.
pub fn start(name: &'static str, message: &str) -> Span {
    let span = info_span!("spinner", task = name, indicatif.pb_show = true);
    span.pb_set_style(&style());
    span.pb_set_message(message);
    span
}

/// Progress callback for the reachability scan: updates `span` with the
/// number of hosts that answered so far.
pub fn host_counter(span: Span) -> impl Fn(std::net::Ipv4Addr) + Send + Sync + 'static {
    let found = Arc::new(AtomicUsize::new(0));
    move |_addr| {
        let count = found.fetch_add(1, Ordering::Relaxed) + 1;
        span.pb_set_message(&format!(
            "Found {} reachable hosts so far...",
            count.to_string().green().bold()
        ));
    }
}
