//! Range source loading: local CIDR files and the remote provider feed.

use ipnet::IpNet;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Well-known URL of the provider-published IP range feed.
pub const PROVIDER_RANGE_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";

/// Describes where exception ranges are loaded from.
///
/// Supplied by the hosting service; this crate does not parse configuration
/// files itself. Each file is a newline-delimited list of CIDR strings, one
/// per line, blank lines ignored.
#[derive(Debug, Clone, Default)]
pub struct ExceptionSources {
    /// Local files holding one CIDR range per line.
    pub files: Vec<PathBuf>,
    /// Whether to pull the provider range feed as well.
    pub provider_feed: bool,
}

/// Provider feed payload: a list of objects carrying a CIDR prefix string.
/// Fields the feed publishes beyond the prefix are ignored.
#[derive(Debug, Deserialize)]
struct ProviderRanges {
    prefixes: Vec<ProviderPrefix>,
}

#[derive(Debug, Deserialize)]
struct ProviderPrefix {
    ip_prefix: String,
}

/// Collect the full list of prefixes for the next exception set.
///
/// Any unreadable file, malformed line, feed transport failure, or malformed
/// feed entry fails the whole load; no partial list is ever returned, so a
/// failed cycle leaves the previously published set untouched.
pub fn load_prefixes(sources: &ExceptionSources) -> Result<Vec<IpNet>> {
    let mut prefixes = Vec::new();

    for path in &sources.files {
        log::info!("loading file exceptions from {}", path.display());
        let file = File::open(path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let net = line
                .parse::<IpNet>()
                .map_err(|_| Error::InvalidCidrPattern(line.to_string()))?;
            prefixes.push(net);
        }
    }

    if sources.provider_feed {
        log::info!("loading provider exceptions from {}", PROVIDER_RANGE_URL);
        prefixes.extend(fetch_provider_prefixes(PROVIDER_RANGE_URL)?);
    }

    Ok(prefixes)
}

/// Fetch and parse the provider range feed with a single blocking GET.
fn fetch_provider_prefixes(url: &str) -> Result<Vec<IpNet>> {
    let response = ureq::get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => Error::Feed(format!("HTTP error: {}", code)),
        ureq::Error::Transport(t) => Error::Feed(format!("transport error: {}", t)),
    })?;

    parse_provider_payload(response.into_reader())
}

/// Parse a provider feed payload into validated prefixes.
fn parse_provider_payload<R: Read>(reader: R) -> Result<Vec<IpNet>> {
    let ranges: ProviderRanges = serde_json::from_reader(reader)
        .map_err(|e| Error::Feed(format!("malformed payload: {}", e)))?;

    ranges
        .prefixes
        .into_iter()
        .map(|p| {
            p.ip_prefix
                .parse::<IpNet>()
                .map_err(|_| Error::InvalidCidrPattern(p.ip_prefix))
        })
        .collect()
}
