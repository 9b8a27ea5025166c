//! Same-site / external classification by raw authority comparison.
//!
//! The authority is taken verbatim from the URL text: no case folding, no
//! default-port removal and no `www.` stripping. `www.example.com` and
//! `example.com` are different sites here.

use crate::error::{Result, ScanError};

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// How a candidate link relates to the page that referenced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    SameSite,
    External,
    NonHttp,
}

/// Return the `host[:port]` part of `url`: everything after the first `//`
/// up to, but not including, the next `/`.
pub fn authority_of(url: &str) -> Result<&str> {
    let (_, rest) = url
        .split_once("//")
        .ok_or_else(|| ScanError::MalformedUrl(url.to_string()))?;

    Ok(rest.split_once('/').map_or(rest, |(authority, _)| authority))
}

pub fn is_http_link(href: &str) -> bool {
    href.starts_with(HTTP_PREFIX) || href.starts_with(HTTPS_PREFIX)
}

/// True iff the candidate's authority is byte-equal to `reference_authority`.
///
/// A candidate without a scheme separator has no authority and therefore
/// never matches.
pub fn is_same_site(candidate_url: &str, reference_authority: &str) -> bool {
    authority_of(candidate_url).is_ok_and(|authority| authority == reference_authority)
}

pub fn classify(href: &str, reference_authority: &str) -> LinkClass {
    if !is_http_link(href) {
        LinkClass::NonHttp
    } else if is_same_site(href, reference_authority) {
        LinkClass::SameSite
    } else {
        LinkClass::External
    }
}
