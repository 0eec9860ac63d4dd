#![cfg(feature = "metrics")]

use once_cell::sync::Lazy;
use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

/* ───────────── Roh‑Latenzen ─────────────────────────── */

static TIMES: Lazy<Mutex<Vec<(&'static str, u128)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Records the time elapsed since `start` under `name`, e.g.
/// `record("enqueue_write", t)`.
pub fn record(name: &'static str, start: Instant) {
    let dur = start.elapsed().as_micros();
    if let Ok(mut times) = TIMES.lock() {
        times.push((name, dur));
    }
}

/* ───────────── Buffer‑Allokationen ───────────────────── */

/// Live device buffers.
pub static ALLOCS: AtomicUsize = AtomicUsize::new(0);
/// Bytes held by live device buffers.
pub static ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
/// High-water mark of `ALLOC_BYTES`.
pub static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn track_alloc(bytes: usize) {
    ALLOCS.fetch_add(1, Ordering::Relaxed);
    let now = ALLOC_BYTES.fetch_add(bytes, Ordering::Relaxed) + bytes;
    PEAK_BYTES.fetch_max(now, Ordering::Relaxed);
}

pub(crate) fn track_free(bytes: usize) {
    ALLOCS.fetch_sub(1, Ordering::Relaxed);
    ALLOC_BYTES.fetch_sub(bytes, Ordering::Relaxed);
}

/// mean and p95 per name, sorted by name.
pub fn latencies() -> Vec<(&'static str, u128, u128)> {
    let mut map: BTreeMap<&'static str, Vec<u128>> = BTreeMap::new();
    if let Ok(mut times) = TIMES.lock() {
        for (name, us) in times.drain(..) {
            map.entry(name).or_default().push(us);
        }
    }

    map.into_iter()
        .map(|(name, mut v)| {
            v.sort_unstable();
            let mean = v.iter().sum::<u128>() / v.len() as u128;
            let p95 = v[((v.len() * 95) / 100).saturating_sub(1)];
            (name, mean, p95)
        })
        .collect()
}

/* ───────────── Zusammenfassung ausgeben ─────────────── */

/// Call once at the end of `main`.
pub fn summary() {
    println!("── metrics summary ──");
    for (name, mean, p95) in latencies() {
        println!("{:<18} mean={:>7} µs   p95={:>7} µs", name, mean, p95);
    }

    let allocs = ALLOCS.load(Ordering::Relaxed);
    let bytes = ALLOC_BYTES.load(Ordering::Relaxed);
    let peak = PEAK_BYTES.load(Ordering::Relaxed);
    println!(
        "GPU allocations: {}   ({} MiB live, {} MiB peak)",
        allocs,
        bytes / 1024 / 1024,
        peak / 1024 / 1024
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn latencies_group_by_name() {
        let t = Instant::now() - Duration::from_millis(2);
        record("metrics_test_a", t);
        record("metrics_test_a", t);
        record("metrics_test_b", t);

        let rows = latencies();
        let a = rows.iter().find(|r| r.0 == "metrics_test_a").unwrap();
        assert!(a.1 >= 2000);
        assert!(rows.iter().any(|r| r.0 == "metrics_test_b"));
    }

    #[test]
    fn peak_tracks_high_water_mark() {
        track_alloc(4096);
        track_free(4096);
        assert!(PEAK_BYTES.load(Ordering::Relaxed) >= 4096);
    }
}
