//! Formatting helpers for durations, ETAs, and compact counts.

/// Format a millisecond duration as `5s`, `1m 30s`, or `1h 1m`.
///
/// Seconds are dropped once the duration reaches an hour.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Estimate time to finish the remaining tasks from the mean iteration
/// duration. `None` when there is nothing to extrapolate from (or left).
pub fn calculate_eta(iteration_times_ms: &[u64], remaining_tasks: usize) -> Option<u64> {
    if iteration_times_ms.is_empty() || remaining_tasks == 0 {
        return None;
    }
    let mean = iteration_times_ms.iter().sum::<u64>() / iteration_times_ms.len() as u64;
    Some(mean * remaining_tasks as u64)
}

pub fn format_eta(eta_ms: Option<u64>) -> String {
    match eta_ms {
        Some(ms) => format!("eta {}", format_duration(ms)),
        None => "eta --".to_string(),
    }
}

/// Compact count display: `950`, `1.2k`, `3.4M`.
pub fn format_number(n: u64) -> String {
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    }
}
