//! HLS master playlist

use salingtau_core::constants::{
    HLS_PLAYLIST_CONTENT_TYPE, HLS_SEGMENT_CONTENT_TYPE, VARIANT_PLAYLIST_NAME,
};

use super::ladder::{estimate_bandwidth, width_for_height};

/// One variant stream referenced by the master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPlaylistEntry {
    pub resolution: u32,
    pub width: u32,
    pub bandwidth: u64,
}

impl MasterPlaylistEntry {
    pub fn for_resolution(resolution: u32) -> Self {
        Self {
            resolution,
            width: width_for_height(resolution),
            bandwidth: estimate_bandwidth(resolution),
        }
    }

    /// Variant playlist location relative to the master playlist
    pub fn uri(&self) -> String {
        format!("{}p/{}", self.resolution, VARIANT_PLAYLIST_NAME)
    }
}

/// Render the master playlist, entries in the order given.
pub fn build_master_playlist(entries: &[MasterPlaylistEntry]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for entry in entries {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}\n",
            entry.bandwidth,
            entry.width,
            entry.resolution,
            entry.uri()
        ));
    }

    playlist
}

/// Content type for a file produced by the segmenter.
pub fn segment_content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".m3u8") {
        HLS_PLAYLIST_CONTENT_TYPE
    } else {
        HLS_SEGMENT_CONTENT_TYPE
    }
}
