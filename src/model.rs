//! Domain data models for chirp.
//!
//! These structures mirror the relational schema one-to-one; the store
//! layer maps rows into them and nothing else carries persistent state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub usr: i64,
    pub name: String,
    pub email: String,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

/// Registration input. The password is hashed before it ever reaches the
/// store; the plaintext lives only in this struct for the duration of the
/// registration call.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub password: String,
}

/// A tweet (top-level or reply)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub tid: i64,
    pub writer: i64,
    pub tdate: DateTime<Utc>,
    pub text: String,
    pub replyto: Option<i64>,
}

/// One entry in a user's feed: either a followee's own tweet or a tweet
/// reshared by a followee. Carries the original text but, for retweets,
/// the retweet's date as the effective date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub tid: i64,
    pub writer: i64,
    pub text: String,
    /// Tweet date for originals, retweet date for reshares.
    pub effective_date: DateTime<Utc>,
    /// Set when this entry is a reshare; the user who retweeted.
    pub retweeter: Option<i64>,
}

impl FeedItem {
    #[must_use]
    pub const fn is_retweet(&self) -> bool {
        self.retweeter.is_some()
    }
}

/// Compact user row for search results and follower listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub usr: i64,
    pub name: String,
    pub city: Option<String>,
}

/// Reply/retweet counts for a single tweet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TweetStats {
    pub retweet_count: i64,
    pub reply_count: i64,
}

/// Profile view: fields, aggregate counts, and the most recent tweets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub user: User,
    pub tweet_count: i64,
    pub following_count: i64,
    pub follower_count: i64,
    pub recent_tweets: Vec<Tweet>,
}

/// Network-wide counts, backing the `stats` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    pub users_count: i64,
    pub tweets_count: i64,
    pub replies_count: i64,
    pub follows_count: i64,
    pub retweets_count: i64,
    pub hashtags_count: i64,
    pub first_tweet_date: Option<DateTime<Utc>>,
    pub last_tweet_date: Option<DateTime<Utc>>,
}
