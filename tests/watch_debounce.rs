// tests/watch_debounce.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;

use assetwatch::watch::Debouncer;

const WINDOW: Duration = Duration::from_millis(100);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn path_is_ready_only_after_a_quiet_window() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.push(PathBuf::from("src/a.scss"), t0);
    assert!(d.drain_ready(t0 + ms(99)).is_empty());
    assert_eq!(d.next_deadline(), Some(t0 + WINDOW));

    assert_eq!(d.drain_ready(t0 + WINDOW), vec![PathBuf::from("src/a.scss")]);
    assert!(d.is_empty());
    assert_eq!(d.next_deadline(), None);
}

#[test]
fn repeated_events_push_the_deadline_back() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.push(PathBuf::from("a"), t0);
    d.push(PathBuf::from("a"), t0 + ms(80));
    d.push(PathBuf::from("a"), t0 + ms(160));

    assert!(d.drain_ready(t0 + ms(200)).is_empty());
    assert_eq!(d.drain_ready(t0 + ms(260)), vec![PathBuf::from("a")]);
}

#[test]
fn paths_are_debounced_independently_and_drained_in_arrival_order() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.push(PathBuf::from("b"), t0);
    d.push(PathBuf::from("a"), t0 + ms(10));
    d.push(PathBuf::from("c"), t0 + ms(90));
    // `b` is touched again but keeps its place in line.
    d.push(PathBuf::from("b"), t0 + ms(20));

    assert_eq!(
        d.drain_ready(t0 + ms(150)),
        vec![PathBuf::from("b"), PathBuf::from("a")]
    );
    assert_eq!(d.drain_ready(t0 + ms(190)), vec![PathBuf::from("c")]);
}

proptest! {
    // No path is lost, whatever the interleaving of events.
    #[test]
    fn every_pushed_path_is_eventually_emitted(
        events in proptest::collection::vec((0..6usize, 0..500u64), 1..60),
    ) {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        let mut events = events;
        events.sort_by_key(|(_, at)| *at);

        let mut seen = HashSet::new();
        let mut drained = Vec::new();
        for (idx, at) in &events {
            let now = t0 + ms(*at);
            drained.extend(d.drain_ready(now));
            let path = PathBuf::from(format!("file{idx}"));
            seen.insert(path.clone());
            d.push(path, now);
        }
        drained.extend(d.drain_ready(t0 + ms(10_000)));

        prop_assert!(d.is_empty());
        let unique: HashSet<_> = drained.iter().cloned().collect();
        prop_assert_eq!(&unique, &seen);

        // A path re-appears in the output only if it was pushed again after
        // being drained, so the drain count never exceeds the push count.
        prop_assert!(drained.len() <= events.len());
    }
}
