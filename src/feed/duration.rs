//! Episode duration estimates for `itunes:duration`.
//!
//! The duration is derived from the file size and an assumed constant
//! bitrate. No audio is downloaded or decoded, so VBR files or files with
//! large ID3 artwork will be off by a few seconds; podcast clients correct the
//! value once playback starts.

/// Assumed MP3 encoding bitrate in bits per second.
pub const DEFAULT_BITRATE_BPS: u64 = 192_000;

/// Whole seconds of audio in `size_bytes` at `bitrate_bps`, rounded down.
///
/// A zero bitrate yields 0 rather than dividing by zero.
pub fn estimate_seconds(size_bytes: u64, bitrate_bps: u64) -> u64 {
    if bitrate_bps == 0 {
        return 0;
    }
    // u128 so `size * 8` cannot overflow for any u64 size
    (u128::from(size_bytes) * 8 / u128::from(bitrate_bps)) as u64
}

/// Formats seconds as `MM:SS` below one hour and `HH:MM:SS` from one hour on.
///
/// Components are zero-padded to two digits; hours keep growing past 99.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Estimated `itunes:duration` value for a file of `size_bytes`.
///
/// # Examples
///
/// ```
/// use nhk_podcast_feed::feed::estimate_duration;
///
/// assert_eq!(estimate_duration(0, 192_000), "00:00");
/// assert_eq!(estimate_duration(2_160_000, 192_000), "01:30");
/// assert_eq!(estimate_duration(86_400_000, 192_000), "01:00:00");
/// ```
pub fn estimate_duration(size_bytes: u64, bitrate_bps: u64) -> String {
    format_duration(estimate_seconds(size_bytes, bitrate_bps))
}
