//! Message classification and tokenization
//!
//! Turns one [`Message`] into a [`Classification`]: which kinds of media it
//! carries and, for plain text messages only, the word tokens it contributes.
//! A media message never contributes words, so a captioned image counts as
//! media rather than discussion.

use crate::{Attachment, Message};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Custom emoji, user/role/channel mentions and timestamp tags
static PLATFORM_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<a?:[A-Za-z0-9_~]+:\d+>|<@[!&]?\d+>|<#\d+>|<t:\d+(?::[A-Za-z])?>")
        .expect("hardcoded regex is valid")
});

static RAW_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<?\bhttps?://\S+").expect("hardcoded regex is valid"));

/// Letters/digits with internal apostrophes, hyphens or underscores
static WORD_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['_-][\p{L}\p{N}]+)*").expect("hardcoded regex is valid")
});

static ANIMATED_HOST_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:[a-z0-9-]+\.)*(?:tenor\.com|giphy\.com|gfycat\.com)(?:/\S*)?")
        .expect("hardcoded regex is valid")
});

static PLATFORM_MEDIA_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)https?://(?:cdn\.discordapp\.com|media\.discordapp\.net)/attachments/\S+?\.(?:png|jpe?g|gifv?|webp|bmp|mp4|webm|mov)(?:[?#][^\s)>]*)?(?:[\s)>,.]|$)",
    )
    .expect("hardcoded regex is valid")
});

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff", "heic", "heif", "avif",
];

const ANIMATED_EXTENSIONS: &[&str] = &["gif", "gifv"];

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "doing", "don't", "for", "from", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's",
    "its", "just", "me", "more", "most", "my", "no", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she", "so", "some",
    "such", "than", "that", "that's", "the", "their", "theirs", "them", "then", "there", "these",
    "they", "this", "those", "to", "too", "under", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "you're", "your", "yours",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Result of classifying one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Any media present (`has_image || has_animated || has_sticker`)
    pub is_media: bool,
    /// Static image attachment
    pub has_image: bool,
    /// Animated media (GIF attachment, media embed or animated link)
    pub has_animated: bool,
    /// Sticker
    pub has_sticker: bool,
    /// Word tokens; always empty for media messages
    pub words: Vec<String>,
}

/// Stateless message classifier
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    use_stopwords: bool,
}

impl Classifier {
    /// Create a classifier, optionally dropping stopwords from token output
    pub fn new(use_stopwords: bool) -> Self {
        Self { use_stopwords }
    }

    /// Classify a single message
    pub fn classify(&self, message: &Message) -> Classification {
        let has_image = message.attachments.iter().any(is_image_attachment);
        let has_animated = message.attachments.iter().any(is_animated_attachment)
            || message.embeds.iter().any(|embed| embed.has_media())
            || has_animated_link(&message.content);
        let has_sticker = !message.stickers.is_empty();
        let is_media = has_image || has_animated || has_sticker;

        let words = if is_media {
            Vec::new()
        } else {
            tokenize(&message.content, self.use_stopwords)
        };

        Classification {
            is_media,
            has_image,
            has_animated,
            has_sticker,
            words,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Strip platform markup and links, then extract lowercase word tokens.
pub fn tokenize(text: &str, drop_stopwords: bool) -> Vec<String> {
    let normalized = text.replace(['\u{2019}', '\u{2018}'], "'");
    let without_markup = PLATFORM_MARKUP.replace_all(&normalized, " ");
    let without_links = RAW_LINK.replace_all(&without_markup, " ");

    WORD_TOKEN
        .find_iter(&without_links)
        .map(|m| m.as_str().to_lowercase())
        .filter(|word| !(drop_stopwords && STOPWORD_SET.contains(word.as_str())))
        .collect()
}

fn extension(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn attachment_extension(attachment: &Attachment) -> Option<String> {
    attachment
        .name
        .as_deref()
        .and_then(extension)
        .or_else(|| attachment.url.as_deref().and_then(extension))
}

fn content_type(attachment: &Attachment) -> Option<String> {
    attachment
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase())
}

fn is_animated_attachment(attachment: &Attachment) -> bool {
    if content_type(attachment).is_some_and(|ct| ct.starts_with("image/gif")) {
        return true;
    }
    attachment_extension(attachment).is_some_and(|ext| ANIMATED_EXTENSIONS.contains(&ext.as_str()))
}

fn is_image_attachment(attachment: &Attachment) -> bool {
    if is_animated_attachment(attachment) {
        return false;
    }
    if content_type(attachment).is_some_and(|ct| ct.starts_with("image/")) {
        return true;
    }
    attachment_extension(attachment).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn has_animated_link(text: &str) -> bool {
    ANIMATED_HOST_LINK.is_match(text) || PLATFORM_MEDIA_LINK.is_match(text)
}
