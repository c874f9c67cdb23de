// tests/relay_properties.rs

use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use devloop::watch::{DEFAULT_DEBOUNCE, WatchEvent, run_relay};

/// Gaps between consecutive changes, kept clear of the window edge.
fn gap_ms() -> impl Strategy<Value = u64> {
    prop_oneof![1..40u64, 60..200u64]
}

/// Count restart signals for changes separated by `gaps`.
fn signals_for(gaps: &[u64]) -> usize {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");

    rt.block_on(async {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (restart_tx, mut restart_rx) = mpsc::channel(1);
        let abort = CancellationToken::new();
        let relay = tokio::spawn(run_relay(event_rx, restart_tx, abort.clone(), DEFAULT_DEBOUNCE));

        let mut count = 0;
        event_tx
            .send(WatchEvent::Changed(PathBuf::from("first")))
            .expect("relay alive");
        for gap in gaps {
            tokio::time::sleep(Duration::from_millis(*gap)).await;
            while restart_rx.try_recv().is_ok() {
                count += 1;
            }
            event_tx
                .send(WatchEvent::Changed(PathBuf::from("next")))
                .expect("relay alive");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        while restart_rx.try_recv().is_ok() {
            count += 1;
        }

        drop(event_tx);
        relay.await.expect("relay panicked").expect("relay failed");
        assert!(!abort.is_cancelled());
        count
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_signal_per_burst(gaps in proptest::collection::vec(gap_ms(), 0..20)) {
        let window = DEFAULT_DEBOUNCE.as_millis() as u64;
        let bursts = 1 + gaps.iter().filter(|g| **g > window).count();
        prop_assert_eq!(signals_for(&gaps), bursts);
    }
}
