//! Resolution ladder arithmetic

/// Every height the pipeline can publish, ascending.
pub const CANDIDATE_RESOLUTIONS: [u32; 8] = [240, 360, 480, 720, 1080, 1440, 2160, 4320];

/// Bandwidth advertised for heights missing from the table
pub const DEFAULT_BANDWIDTH: u64 = 1_000_000;

/// Candidate heights that do not upscale the source, ascending.
pub fn build_ladder(source_height: u32) -> Vec<u32> {
    CANDIDATE_RESOLUTIONS
        .iter()
        .copied()
        .filter(|&resolution| resolution <= source_height)
        .collect()
}

/// Nominal bits per second advertised in the master playlist. Looked up, not
/// measured from the encoded output.
pub fn estimate_bandwidth(resolution: u32) -> u64 {
    match resolution {
        240 => 400_000,
        360 => 800_000,
        480 => 1_400_000,
        720 => 2_800_000,
        1080 => 5_000_000,
        1440 => 8_000_000,
        2160 => 16_000_000,
        4320 => 40_000_000,
        _ => DEFAULT_BANDWIDTH,
    }
}

/// Width of a 16:9 frame of the given height.
pub fn width_for_height(height: u32) -> u32 {
    (f64::from(height) * 16.0 / 9.0).round() as u32
}

/// Probe duration in seconds to whole milliseconds, rounding half away from
/// zero.
pub fn duration_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_stops_at_source_height() {
        assert_eq!(build_ladder(1000), vec![240, 360, 480, 720]);
        assert_eq!(build_ladder(1080), vec![240, 360, 480, 720, 1080]);
        assert_eq!(build_ladder(240), vec![240]);
        assert_eq!(build_ladder(8000), CANDIDATE_RESOLUTIONS.to_vec());
    }

    #[test]
    fn ladder_empty_below_smallest_candidate() {
        assert!(build_ladder(239).is_empty());
        assert!(build_ladder(0).is_empty());
    }

    #[test]
    fn ladder_is_subsequence_of_candidates() {
        for height in [1, 300, 719, 720, 1500, 2159, 4320] {
            let ladder = build_ladder(height);
            assert!(ladder.windows(2).all(|w| w[0] < w[1]));
            assert!(ladder.iter().all(|r| CANDIDATE_RESOLUTIONS.contains(r) && *r <= height));
        }
    }

    #[test]
    fn bandwidth_table() {
        assert_eq!(estimate_bandwidth(240), 400_000);
        assert_eq!(estimate_bandwidth(720), 2_800_000);
        assert_eq!(estimate_bandwidth(4320), 40_000_000);
        assert_eq!(estimate_bandwidth(1000), DEFAULT_BANDWIDTH);
    }

    #[test]
    fn widths_assume_sixteen_by_nine() {
        assert_eq!(width_for_height(720), 1280);
        assert_eq!(width_for_height(1080), 1920);
        assert_eq!(width_for_height(240), 427);
        assert_eq!(width_for_height(480), 853);
    }

    #[test]
    fn duration_rounds_to_nearest_millisecond() {
        assert_eq!(duration_millis(125.4), 125_400);
        assert_eq!(duration_millis(0.0006), 1);
        assert_eq!(duration_millis(0.0004), 0);
        assert_eq!(duration_millis(61.25), 61_250);
    }
}
