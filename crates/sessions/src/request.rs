//! Request-channel access.
//!
//! Values are addressed as `<channel>.<name>` (`cookie.SID`, `get.page`).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// The channels a request value can arrive through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Merged view over query, body and cookies.
    Request,
    Get,
    Post,
    Put,
    Delete,
    Cookie,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Request,
        Channel::Get,
        Channel::Post,
        Channel::Put,
        Channel::Delete,
        Channel::Cookie,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Cookie => "cookie",
        }
    }

    /// The accessor key for `name` in this channel.
    pub fn key(self, name: &str) -> String {
        format!("{}.{name}", self.as_str())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown request channel {s:?}"))
    }
}

/// Narrow view of the request the session manager needs.
pub trait RequestChannels {
    fn lookup(&self, key: &str) -> Option<String>;

    /// Remove the value at `key`.  Returns whether it was present.
    fn unregister(&mut self, key: &str) -> bool;
}

/// Plain in-memory request parameters, one map per channel.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    channels: HashMap<Channel, BTreeMap<String, String>>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Channel, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(channel, name, value);
        self
    }

    pub fn insert(&mut self, channel: Channel, name: impl Into<String>, value: impl Into<String>) {
        self.channels
            .entry(channel)
            .or_default()
            .insert(name.into(), value.into());
    }

    pub fn get(&self, channel: Channel, name: &str) -> Option<&str> {
        self.channels.get(&channel)?.get(name).map(String::as_str)
    }

    /// Whether `name` is present in any channel.
    pub fn contains_anywhere(&self, name: &str) -> bool {
        self.channels.values().any(|values| values.contains_key(name))
    }

    fn split_key(key: &str) -> Option<(Channel, &str)> {
        let (channel, name) = key.split_once('.')?;
        Some((channel.parse().ok()?, name))
    }
}

impl RequestChannels for RequestParams {
    fn lookup(&self, key: &str) -> Option<String> {
        let (channel, name) = Self::split_key(key)?;
        self.get(channel, name).map(str::to_owned)
    }

    fn unregister(&mut self, key: &str) -> bool {
        let Some((channel, name)) = Self::split_key(key) else {
            return false;
        };
        self.channels
            .get_mut(&channel)
            .is_some_and(|values| values.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("header".parse::<Channel>().is_err());
    }

    #[test]
    fn lookup_and_unregister_by_key() {
        let mut params = RequestParams::new()
            .with(Channel::Cookie, "SID", "abc")
            .with(Channel::Get, "page", "2");

        assert_eq!(params.lookup("cookie.SID").as_deref(), Some("abc"));
        assert!(params.unregister("cookie.SID"));
        assert!(!params.unregister("cookie.SID"));
        assert!(params.lookup("cookie.SID").is_none());
        assert_eq!(params.get(Channel::Get, "page"), Some("2"));
    }

    #[test]
    fn malformed_keys_are_ignored() {
        let mut params = RequestParams::new().with(Channel::Post, "a", "1");
        assert!(params.lookup("a").is_none());
        assert!(!params.unregister("header.a"));
        assert!(params.contains_anywhere("a"));
    }
}
