//! Locator checks for the platform strategies.
//!
//! Matching is by substring on the raw locator, the same test the unified
//! entry point uses to dispatch.

use crate::domain::Platform;

pub fn is_youtube(locator: &str) -> bool {
    locator.contains("youtube.com") || locator.contains("youtu.be")
}

pub fn is_instagram(locator: &str) -> bool {
    locator.contains("instagram.com")
}

/// Platform a locator belongs to, YouTube first
pub fn detect_platform(locator: &str) -> Option<Platform> {
    if is_youtube(locator) {
        Some(Platform::YouTube)
    } else if is_instagram(locator) {
        Some(Platform::Instagram)
    } else {
        None
    }
}

/// Whether a locator is an absolute http(s) URL
pub fn is_web_url(locator: &str) -> bool {
    url::Url::parse(locator)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
