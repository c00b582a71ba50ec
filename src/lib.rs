//! Republishes the NHK Easier article feed as a podcast feed.
//!
//! The library half of `nhk-podcast-feed`: [`feed`] holds the fetch, probe and
//! repair pipeline, [`config`] the settings file, [`output`] the writer.

pub mod config;
pub mod feed;
pub mod output;
pub mod util;
