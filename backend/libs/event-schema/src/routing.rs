//! Routing keys and topic-style binding patterns
//!
//! Every message on the tweet topic carries its action in the `event_type`
//! header (`tweet.create`, `tweet.update`, `tweet.delete`). A consumer binds
//! with a pattern using topic-exchange syntax: `*` matches exactly one word,
//! `#` matches zero or more words.

use std::fmt;

/// Header holding the routing key of a message
pub const EVENT_TYPE_HEADER: &str = "event_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingKey {
    TweetCreate,
    TweetUpdate,
    TweetDelete,
}

impl RoutingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingKey::TweetCreate => "tweet.create",
            RoutingKey::TweetUpdate => "tweet.update",
            RoutingKey::TweetDelete => "tweet.delete",
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding pattern such as `tweet.create`, `tweet.*` or `#`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
}

impl TopicPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            raw: pattern.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a routing key is selected by this binding
    pub fn matches(&self, routing_key: &str) -> bool {
        let pattern: Vec<&str> = self.raw.split('.').collect();
        let key: Vec<&str> = routing_key.split('.').collect();
        matches_words(&pattern, &key)
    }
}

impl Default for TopicPattern {
    fn default() -> Self {
        Self::new(RoutingKey::TweetCreate.as_str())
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&"*", rest)) => match key.split_first() {
            Some((_, key_rest)) => matches_words(rest, key_rest),
            None => false,
        },
        Some((word, rest)) => match key.split_first() {
            Some((head, key_rest)) => head == word && matches_words(rest, key_rest),
            None => false,
        },
    }
}
