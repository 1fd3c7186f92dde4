// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize the process-wide tracing subscriber.
///
/// `log_level` comes from config or the CLI. Anything unparsable falls
/// back to INFO, with a warning once the subscriber is up.
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();

    if let Some(requested) = log_level {
        if requested.parse::<Level>().is_err() {
            tracing::warn!("unknown log level {:?}, using {}", requested, level);
        }
    }
}
