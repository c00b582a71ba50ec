//! Utility functions shared by the fetcher and the transformer.
//!
//! - **URL handling**: source URL validation and resolution of references
//!   found inside item descriptions
//! - **HTML scanning**: entity decoding, relative-link repair and audio tag
//!   extraction over description markup
//!
//! # Examples
//!
//! ```
//! use nhk_podcast_feed::util::{find_audio_src, resolve_reference, validate_url};
//!
//! let base = validate_url("https://nhkeasier.com").unwrap();
//! let src = find_audio_src("&lt;audio src=\"/audio/a.mp3\"&gt;").unwrap();
//! assert_eq!(
//!     resolve_reference(&base, &src).as_deref(),
//!     Some("https://nhkeasier.com/audio/a.mp3")
//! );
//! ```

mod html;
mod urls;

pub use html::{decode_entities, find_audio_src, repair_relative_links};
pub use urls::{is_site_relative, resolve_reference, site_prefix, validate_url, UrlValidationError};
