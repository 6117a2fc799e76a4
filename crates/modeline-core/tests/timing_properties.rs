//! Invariant sweeps for the timing synthesizer.
//!
//! Every positive size must either produce a timing whose sync boundaries are
//! strictly ordered and whose clock lies inside the constraint window, or be
//! reported as an impossible mode.  Nothing else is acceptable.

use modeline_core::{clock_range, synthesize, ModeTiming, TimingError};

fn assert_valid(timing: &ModeTiming) {
    assert!(timing.h_sync_start >= timing.width);
    assert!(timing.v_sync_start > timing.height);
    assert!(
        timing.h_sync_start < timing.h_sync_end && timing.h_sync_end < timing.h_total,
        "horizontal ordering violated for {}",
        timing.name
    );
    assert!(
        timing.v_sync_start < timing.v_sync_end && timing.v_sync_end < timing.v_total,
        "vertical ordering violated for {}",
        timing.name
    );
    let range = clock_range(u64::from(timing.h_total), u64::from(timing.v_total));
    assert!(
        range.contains(timing.pixel_clock_hz),
        "clock {} outside {range} for {}",
        timing.pixel_clock_hz,
        timing.name
    );
    assert_eq!(timing.name, format!("{}x{}", timing.width, timing.height));
}

#[test]
fn test_every_size_in_sweep_is_valid_or_impossible() {
    let widths = (1..=64).chain((100..=8000).step_by(97));
    for width in widths {
        for height in (1..=48).chain((100..=8000).step_by(113)) {
            match synthesize(width, height) {
                Ok(timing) => assert_valid(&timing),
                Err(TimingError::ImpossibleMode { .. }) => {}
                Err(other) => panic!("{width}x{height}: unexpected error {other:?}"),
            }
        }
    }
}

#[test]
fn test_common_desktop_resolutions_are_all_possible() {
    let common = [
        (640, 480),
        (800, 600),
        (1024, 768),
        (1280, 720),
        (1280, 1024),
        (1366, 768),
        (1600, 900),
        (1920, 1080),
        (1920, 1200),
        (2560, 1440),
        (3840, 2160),
    ];
    for (w, h) in common {
        let timing = synthesize(w, h).unwrap_or_else(|e| panic!("{w}x{h}: {e}"));
        assert_valid(&timing);
    }
}

#[test]
fn test_refresh_never_exceeds_ideal_rate() {
    // Frames taller than 200 lines never hit the horizontal-sync floor, so
    // clamping can only pull the rate down from the 50 Hz target.
    for (w, h) in [(320, 240), (1920, 1080), (3840, 2160), (5120, 2880)] {
        if let Ok(timing) = synthesize(w, h) {
            let hz = timing.refresh_hz().expect("non-empty frame");
            assert!((10..=50).contains(&hz), "{w}x{h} refreshes at {hz} Hz");
        }
    }
}
