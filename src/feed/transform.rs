use std::borrow::Cow;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::document::{Document, DocumentError, Element, Node};
use super::duration::estimate_duration;
use super::namespace::{
    dedupe_namespace_declarations, ensure_namespace, qualified, ITUNES_NS, ITUNES_PREFIX,
};
use super::probe::LengthProbe;
use crate::util::{find_audio_src, repair_relative_links, resolve_reference, site_prefix};

/// MIME type written on synthesized enclosures.
const AUDIO_MIME: &str = "audio/mpeg";

/// Errors that abort a transformation. No output is produced for any of them.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The source is not well-formed XML.
    #[error("Failed to parse source feed: {0}")]
    Parse(#[source] DocumentError),

    /// The root element has no `<channel>` child.
    #[error("No channel element found in the feed")]
    MissingChannel,

    /// The repaired document could not be written back out.
    #[error("Failed to serialize transformed feed: {0}")]
    Serialize(#[source] DocumentError),
}

/// Channel-level podcast metadata added when the source lacks it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelMetadata {
    /// `itunes:author` text.
    pub author: String,
    /// `itunes:summary` text.
    pub summary: String,
    /// `itunes:explicit` text ("no", "yes", "true", "false").
    pub explicit: String,
    /// `text` attribute of `itunes:category`.
    pub category: String,
}

impl Default for ChannelMetadata {
    fn default() -> Self {
        Self {
            author: "NHK Easier".to_string(),
            summary: "Audio version of NHK Easier articles".to_string(),
            explicit: "no".to_string(),
            category: "News".to_string(),
        }
    }
}

/// Settings for one transformation run.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Site origin that site-relative links and audio paths resolve against.
    pub base_url: Url,
    /// Assumed encoding bitrate for duration estimates, in bits per second.
    pub bitrate_bps: u64,
    pub channel: ChannelMetadata,
}

/// Result of a successful transformation.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// The repaired feed, with XML declaration.
    pub xml: String,
    /// Items that carry an audio enclosure in the output.
    pub items_kept: usize,
    /// Items removed for lacking a description or an `.mp3` audio reference.
    pub items_dropped: usize,
    /// Size probes issued.
    pub probes: usize,
}

/// Per-item result of [`process_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Kept,
    NoDescription,
    NoAudio,
}

/// Values shared by every item in one run.
struct ItemContext<'a> {
    base_url: &'a Url,
    site_prefix: &'a str,
    duration_name: &'a str,
    bitrate_bps: u64,
}

/// Repairs a feed so podcast clients can subscribe to it.
///
/// Steps, in order:
///
/// 1. Collapse repeated namespace declarations in the raw text
/// 2. Parse, and require a `<channel>` under the root element
/// 3. Add missing `itunes:` channel metadata
/// 4. For each item: repair site-relative links in the description, find the
///    first `<audio src="...mp3">`, and add an enclosure and an estimated
///    duration where missing
/// 5. Drop items without a description or without audio
/// 6. Serialize with an XML declaration
///
/// The transformation is idempotent: feeding its output back in yields the
/// same document and issues no probes.
///
/// # Errors
///
/// - [`TransformError::Parse`] if the source is not well-formed XML
/// - [`TransformError::MissingChannel`] if there is no channel element
/// - [`TransformError::Serialize`] if writing the result fails
pub async fn transform<P: LengthProbe>(
    source: &str,
    options: &TransformOptions,
    prober: &P,
) -> Result<TransformOutput, TransformError> {
    let source = dedupe_namespace_declarations(source);
    let mut document = Document::parse(&source).map_err(TransformError::Parse)?;

    if !document.root.has_child("channel") {
        return Err(TransformError::MissingChannel);
    }

    let prefix = ensure_namespace(&mut document.root, ITUNES_PREFIX, ITUNES_NS);
    let channel = document
        .root
        .child_mut("channel")
        .ok_or(TransformError::MissingChannel)?;

    let added = complete_channel_metadata(channel, &prefix, &options.channel);
    if added > 0 {
        tracing::debug!(fields = added, "Added missing channel metadata");
    }

    let duration_name = qualified(&prefix, "duration");
    let ctx = ItemContext {
        base_url: &options.base_url,
        site_prefix: site_prefix(&options.base_url),
        duration_name: &duration_name,
        bitrate_bps: options.bitrate_bps,
    };

    let mut outcomes = Vec::new();
    let mut probes = 0usize;
    for item in channel.elements_mut().filter(|el| el.name == "item") {
        outcomes.push(process_item(item, &ctx, prober, &mut probes).await);
    }

    let items_kept = outcomes.iter().filter(|o| **o == ItemOutcome::Kept).count();
    let items_dropped = outcomes.len() - items_kept;
    remove_items(channel, &outcomes);

    tracing::debug!(
        kept = items_kept,
        dropped = items_dropped,
        probes = probes,
        "Transformed feed items"
    );

    let xml = document.to_xml().map_err(TransformError::Serialize)?;

    Ok(TransformOutput {
        xml,
        items_kept,
        items_dropped,
        probes,
    })
}

/// Adds each missing `itunes:` channel field; returns how many were added.
///
/// New fields go before the first item so the channel header stays together.
/// Fields already present, whatever their value, are left alone.
fn complete_channel_metadata(
    channel: &mut Element,
    prefix: &str,
    metadata: &ChannelMetadata,
) -> usize {
    let fields = [
        Element::new(qualified(prefix, "author")).with_text(metadata.author.as_str()),
        Element::new(qualified(prefix, "summary")).with_text(metadata.summary.as_str()),
        Element::new(qualified(prefix, "explicit")).with_text(metadata.explicit.as_str()),
        Element::new(qualified(prefix, "category"))
            .with_attribute("text", metadata.category.as_str()),
    ];

    let mut added = 0;
    for field in fields {
        if !channel.has_child(&field.name) {
            channel.insert_before("item", field);
            added += 1;
        }
    }
    added
}

async fn process_item<P: LengthProbe>(
    item: &mut Element,
    ctx: &ItemContext<'_>,
    prober: &P,
    probes: &mut usize,
) -> ItemOutcome {
    let Some(description) = item.child_mut("description") else {
        return ItemOutcome::NoDescription;
    };
    if description.text().trim().is_empty() {
        return ItemOutcome::NoDescription;
    }

    // Repair the stored text, so both the output and the audio scan see absolute links
    for text in description.text_nodes_mut() {
        let repaired = match repair_relative_links(text, ctx.site_prefix) {
            Cow::Owned(repaired) => Some(repaired),
            Cow::Borrowed(_) => None,
        };
        if let Some(repaired) = repaired {
            *text = repaired;
        }
    }

    let Some(audio_url) = find_audio_src(&description.text())
        .and_then(|src| resolve_reference(ctx.base_url, &src))
    else {
        tracing::debug!(title = %item_title(item), "No mp3 audio in description, dropping item");
        return ItemOutcome::NoAudio;
    };

    let has_duration = item.has_child(ctx.duration_name);
    let existing_length = match item.child_mut("enclosure") {
        Some(enclosure) => {
            if enclosure.attribute("url").map_or(true, |u| u.trim().is_empty()) {
                enclosure.set_attribute("url", audio_url.as_str());
            }
            if has_duration {
                return ItemOutcome::Kept;
            }
            Some(
                enclosure
                    .attribute("length")
                    .and_then(|l| l.trim().parse::<u64>().ok())
                    .filter(|&l| l > 0),
            )
        }
        None => None,
    };

    let size = match existing_length {
        Some(Some(length)) => length,
        _ => {
            *probes += 1;
            prober.probe_length(&audio_url).await
        }
    };

    if existing_length.is_none() {
        item.append(
            Element::new("enclosure")
                .with_attribute("url", audio_url.as_str())
                .with_attribute("length", size.to_string())
                .with_attribute("type", AUDIO_MIME),
        );
    }

    if !has_duration {
        item.append(
            Element::new(ctx.duration_name).with_text(estimate_duration(size, ctx.bitrate_bps)),
        );
    }

    ItemOutcome::Kept
}

/// Removes dropped items; `outcomes` lines up with the channel's items in order.
fn remove_items(channel: &mut Element, outcomes: &[ItemOutcome]) {
    let mut outcomes = outcomes.iter();
    channel.children.retain(|node| match node {
        Node::Element(el) if el.name == "item" => {
            outcomes.next().map_or(true, |o| *o == ItemOutcome::Kept)
        }
        _ => true,
    });
}

fn item_title(item: &Element) -> String {
    item.child("title")
        .map(Element::text)
        .unwrap_or_else(|| "(untitled)".to_string())
}
