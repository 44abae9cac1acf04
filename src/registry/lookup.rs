//! Resolving user queries to devices and building device URLs.

use url::form_urlencoded::byte_serialize;

use super::schema::Device;

/// Outcome of a device lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Exactly one device matched.
    Found(&'a Device),
    /// Several devices partially matched.
    Ambiguous(Vec<&'a Device>),
    /// Nothing matched.
    NoMatch,
}

/// Find a device by alias or host.
///
/// A case-insensitive exact match on alias or host wins outright (first in
/// registry order). Otherwise substring matches are collected.
pub fn find_device<'a>(devices: &'a [Device], query: &str) -> Lookup<'a> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Lookup::NoMatch;
    }

    let alias_of = |d: &Device| d.alias.as_deref().unwrap_or_default().to_lowercase();

    if let Some(device) = devices
        .iter()
        .find(|d| alias_of(d) == query || d.host.to_lowercase() == query)
    {
        return Lookup::Found(device);
    }

    let mut matches: Vec<&Device> = devices
        .iter()
        .filter(|d| alias_of(d).contains(&query) || d.host.to_lowercase().contains(&query))
        .collect();

    match matches.len() {
        0 => Lookup::NoMatch,
        1 => Lookup::Found(matches.remove(0)),
        _ => Lookup::Ambiguous(matches),
    }
}

fn escape(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Browser URL for a device, with embedded credentials when both are set.
///
/// Only for handing to a browser. Anything printed or returned to a caller
/// uses [`public_url`].
pub fn redirect_url(device: &Device) -> String {
    match (device.username.as_deref(), device.password.as_deref()) {
        (Some(user), Some(pass)) => {
            format!("http://{}:{}@{}/", escape(user), escape(pass), device.host)
        }
        _ => public_url(device),
    }
}

/// Credential-free URL of a device's web interface.
pub fn public_url(device: &Device) -> String {
    format!("http://{}/", device.host)
}
