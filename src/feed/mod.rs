//! Feed fetching and podcast repair.
//!
//! - **Fetching**: HTTP retrieval of the source feed with a timeout and size limit
//! - **Probing**: `HEAD` requests that learn each episode's byte length
//! - **Transforming**: the repair pipeline that turns the article feed into a
//!   podcast feed
//!
//! # Architecture
//!
//! - [`document`] - Owned XML element tree on top of `quick-xml`
//! - [`namespace`] - Namespace declaration clean-up and prefix lookup
//! - [`duration`] - Bitrate-based duration estimates
//! - [`transform`] - The repair pipeline
//! - [`fetcher`] / [`probe`] - Network collaborators
//!
//! # Example
//!
//! ```ignore
//! use nhk_podcast_feed::feed::{build_client, fetch_feed, transform, HttpProber};
//!
//! let client = build_client(timeout)?;
//! let source = fetch_feed(&client, url, timeout).await?;
//! let output = transform(&source, &options, &HttpProber::new(client, timeout)).await?;
//! println!("{}", output.xml);
//! ```

pub mod document;
pub mod duration;
mod fetcher;
pub mod namespace;
mod probe;
mod transform;

pub use document::{Document, DocumentError, Element, Node};
pub use duration::{estimate_duration, DEFAULT_BITRATE_BPS};
pub use fetcher::{build_client, fetch_feed, FetchError, DEFAULT_TIMEOUT};
pub use probe::{HttpProber, LengthProbe};
pub use transform::{
    transform, ChannelMetadata, TransformError, TransformOptions, TransformOutput,
};
