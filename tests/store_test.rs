//! Integration tests for the chirp store.
//!
//! Exercises registration, authentication, feed assembly, search,
//! statistics, and the social graph against an in-memory database.

use chirp::model::NewUser;
use chirp::{ChirpError, Store};
use tempfile::TempDir;

fn new_user(name: &str, email: &str, city: Option<&str>) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        city: city.map(ToString::to_string),
        timezone: Some("UTC".to_string()),
        password: format!("{name}-secret"),
    }
}

fn register(store: &Store, name: &str) -> i64 {
    store
        .register_user(&new_user(name, &format!("{name}@example.com"), Some("Calgary")))
        .unwrap()
}

// =============================================================================
// Registration and authentication
// =============================================================================

#[test]
fn registration_assigns_strictly_increasing_ids() {
    let store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");
    let c = register(&store, "carol");
    assert!(a < b && b < c);
}

#[test]
fn duplicate_emails_are_accepted() {
    // Documented behavior: no uniqueness check on email or name.
    let store = Store::open_memory().unwrap();
    let shared = new_user("alice", "shared@example.com", None);
    let a = store.register_user(&shared).unwrap();
    let b = store.register_user(&shared).unwrap();
    assert_ne!(a, b);
}

#[test]
fn login_succeeds_only_on_exact_credentials() {
    let store = Store::open_memory().unwrap();
    let a = register(&store, "alice");

    let user = store.authenticate(a, "alice-secret").unwrap();
    assert_eq!(user.usr, a);
    assert_eq!(user.name, "alice");

    assert!(matches!(
        store.authenticate(a, "wrong"),
        Err(ChirpError::AuthenticationFailed)
    ));
    assert!(matches!(
        store.authenticate(9999, "alice-secret"),
        Err(ChirpError::AuthenticationFailed)
    ));
}

// =============================================================================
// Feed assembly
// =============================================================================

#[test]
fn feed_is_empty_for_a_user_following_nobody() {
    let store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    assert!(store.feed_page(a, 0).unwrap().is_empty());
}

#[test]
fn feed_contains_followee_tweets_and_excludes_others() {
    let mut store = Store::open_memory().unwrap();
    let me = register(&store, "me");
    let a = register(&store, "alice");
    let b = register(&store, "bob");

    store.follow(me, a).unwrap();
    let a_tid = store.compose_tweet(a, "from alice").unwrap();
    let b_tid = store.compose_tweet(b, "from bob").unwrap();

    let feed = store.feed_page(me, 0).unwrap();
    assert!(feed.iter().any(|item| item.tid == a_tid));
    assert!(!feed.iter().any(|item| item.tid == b_tid));
}

#[test]
fn feed_shows_followee_retweets_with_the_retweet_date() {
    let mut store = Store::open_memory().unwrap();
    let me = register(&store, "me");
    let a = register(&store, "alice");
    let b = register(&store, "bob");

    // b is not followed; his tweet reaches the feed only through a's retweet.
    let tid = store.compose_tweet(b, "original from bob").unwrap();
    store.follow(me, a).unwrap();
    let later = store.compose_tweet(a, "alice's own tweet").unwrap();
    store.retweet(a, tid).unwrap();

    let feed = store.feed_page(me, 0).unwrap();
    assert_eq!(feed.len(), 2);

    // The retweet is newest; it carries the original text and writer but
    // flags the retweeter.
    assert_eq!(feed[0].tid, tid);
    assert_eq!(feed[0].writer, b);
    assert_eq!(feed[0].retweeter, Some(a));
    assert_eq!(feed[0].text, "original from bob");
    assert!(feed[0].effective_date >= feed[1].effective_date);

    assert_eq!(feed[1].tid, later);
    assert!(feed[1].retweeter.is_none());
}

#[test]
fn feed_paginates_five_per_page() {
    let mut store = Store::open_memory().unwrap();
    let me = register(&store, "me");
    let a = register(&store, "alice");
    store.follow(me, a).unwrap();

    for i in 0..7 {
        store.compose_tweet(a, &format!("tweet {i}")).unwrap();
    }

    assert_eq!(store.feed_page(me, 0).unwrap().len(), 5);
    assert_eq!(store.feed_page(me, 1).unwrap().len(), 2);
    assert!(store.feed_page(me, 2).unwrap().is_empty());
}

// =============================================================================
// Content creation
// =============================================================================

#[test]
fn hashtag_set_gains_one_row_per_distinct_term() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");

    store.compose_tweet(a, "hello #foo #bar").unwrap();
    store.compose_tweet(a, "again #foo").unwrap();

    let stats = store.network_stats().unwrap();
    assert_eq!(stats.hashtags_count, 2);
    assert_eq!(stats.tweets_count, 2);
}

#[test]
fn replies_set_replyto_and_count_in_stats() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");

    let parent = store.compose_tweet(a, "parent").unwrap();
    let reply = store.compose_reply(parent, b, "child").unwrap();

    let fetched = store.get_tweet(reply).unwrap().unwrap();
    assert_eq!(fetched.replyto, Some(parent));

    let stats = store.network_stats().unwrap();
    assert_eq!(stats.replies_count, 1);
}

#[test]
fn tweet_stats_counts_retweets_and_replies() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");
    let c = register(&store, "carol");

    let tid = store.compose_tweet(a, "popular tweet").unwrap();
    store.retweet(b, tid).unwrap();
    store.retweet(c, tid).unwrap();
    store.compose_reply(tid, b, "nice one").unwrap();

    let stats = store.tweet_stats(tid).unwrap();
    assert_eq!(stats.retweet_count, 2);
    assert_eq!(stats.reply_count, 1);
}

#[test]
fn tweet_stats_for_missing_tweet_is_not_found() {
    let store = Store::open_memory().unwrap();
    assert!(matches!(
        store.tweet_stats(123),
        Err(ChirpError::NotFound { .. })
    ));
}

#[test]
fn retweeting_a_missing_tweet_is_not_found() {
    let store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    assert!(matches!(
        store.retweet(a, 42),
        Err(ChirpError::NotFound { .. })
    ));
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn tweet_search_matches_substrings_case_insensitively() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");

    store.compose_tweet(a, "My Cat is sleeping").unwrap();
    store.compose_tweet(a, "concatenate all the things").unwrap();
    store.compose_tweet(a, "dogs only here").unwrap();

    // lowercase query matches uppercase text, and vice versa
    let lower = store
        .search_tweets(&["cat".to_string()], 0)
        .unwrap();
    assert_eq!(lower.len(), 2);

    let upper = store
        .search_tweets(&["CAT".to_string()], 0)
        .unwrap();
    assert_eq!(upper.len(), 2);

    // newest first
    assert!(upper[0].tdate >= upper[1].tdate);
    assert_eq!(upper[0].text, "concatenate all the things");
}

#[test]
fn tweet_search_ors_multiple_keywords() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");

    store.compose_tweet(a, "about cats").unwrap();
    store.compose_tweet(a, "about dogs").unwrap();
    store.compose_tweet(a, "about birds").unwrap();

    let results = store
        .search_tweets(&["cat".to_string(), "dog".to_string()], 0)
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn tweet_search_page_beyond_results_is_empty_not_an_error() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    store.compose_tweet(a, "only one cat here").unwrap();

    let page_five = store.search_tweets(&["cat".to_string()], 5).unwrap();
    assert!(page_five.is_empty());
}

#[test]
fn tweet_search_binds_hostile_input_safely() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    store.compose_tweet(a, "harmless tweet").unwrap();

    // Would break a string-interpolated query; must simply match nothing.
    let results = store
        .search_tweets(&["'; DROP TABLE tweets;--".to_string()], 0)
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(store.network_stats().unwrap().tweets_count, 1);
}

#[test]
fn user_search_orders_name_matches_before_city_matches() {
    let store = Store::open_memory().unwrap();
    store
        .register_user(&new_user("Ann", "ann@example.com", Some("Paris")))
        .unwrap();
    store
        .register_user(&new_user("Annabelle", "annabelle@example.com", Some("Rome")))
        .unwrap();
    store
        .register_user(&new_user("Bob", "bob@example.com", Some("Annecy")))
        .unwrap();
    store
        .register_user(&new_user("Carl", "carl@example.com", Some("Savannah-on-Sea")))
        .unwrap();

    let results = store.search_users("ann").unwrap();
    let names: Vec<&str> = results.iter().map(|u| u.name.as_str()).collect();

    // Name matches sorted by name length, then city-only matches sorted by
    // city length.
    assert_eq!(names, vec!["Ann", "Annabelle", "Bob", "Carl"]);
}

#[test]
fn user_search_with_no_matches_is_empty() {
    let store = Store::open_memory().unwrap();
    register(&store, "alice");
    assert!(store.search_users("zzz").unwrap().is_empty());
}

// =============================================================================
// Social graph
// =============================================================================

#[test]
fn duplicate_follows_and_retweets_are_accepted() {
    // Open question preserved from the source: no dedup on either edge.
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");

    store.follow(a, b).unwrap();
    store.follow(a, b).unwrap();
    assert_eq!(store.network_stats().unwrap().follows_count, 2);

    let tid = store.compose_tweet(b, "hi").unwrap();
    store.retweet(a, tid).unwrap();
    store.retweet(a, tid).unwrap();
    assert_eq!(store.tweet_stats(tid).unwrap().retweet_count, 2);

    // Listings still collapse duplicate edges to one row per follower.
    let followers = store.followers_of(b).unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].usr, a);
}

#[test]
fn followers_lists_only_users_targeting_the_account() {
    let store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");
    let c = register(&store, "carol");

    store.follow(b, a).unwrap();
    store.follow(c, a).unwrap();
    store.follow(a, b).unwrap();

    let followers = store.followers_of(a).unwrap();
    let ids: Vec<i64> = followers.iter().map(|f| f.usr).collect();
    assert_eq!(ids, vec![b, c]);
}

// =============================================================================
// User detail view
// =============================================================================

#[test]
fn user_details_returns_profile_counts_and_three_recent_tweets() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");
    let b = register(&store, "bob");
    store.follow(b, a).unwrap();

    for i in 0..4 {
        store.compose_tweet(a, &format!("tweet {i}")).unwrap();
    }

    let details = store.user_details(a).unwrap();
    assert_eq!(details.user.name, "alice");
    assert_eq!(details.tweet_count, 4);
    assert_eq!(details.following_count, 0);
    assert_eq!(details.follower_count, 1);
    assert_eq!(details.recent_tweets.len(), 3);
    assert_eq!(details.recent_tweets[0].text, "tweet 3");
}

#[test]
fn user_details_for_missing_user_is_not_found() {
    let store = Store::open_memory().unwrap();
    assert!(matches!(
        store.user_details(77),
        Err(ChirpError::NotFound { .. })
    ));
}

#[test]
fn tweets_by_returns_everything_newest_first() {
    let mut store = Store::open_memory().unwrap();
    let a = register(&store, "alice");

    for i in 0..7 {
        store.compose_tweet(a, &format!("tweet {i}")).unwrap();
    }

    let tweets = store.tweets_by(a).unwrap();
    assert_eq!(tweets.len(), 7);
    assert_eq!(tweets[0].text, "tweet 6");
    assert_eq!(tweets[6].text, "tweet 0");
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn data_survives_reopen_of_a_file_backed_store() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("chirp.db");

    let a = {
        let mut store = Store::open(&db_path).unwrap();
        let a = register(&store, "alice");
        store.compose_tweet(a, "persistent #tag").unwrap();
        a
    };

    let store = Store::open(&db_path).unwrap();
    let details = store.user_details(a).unwrap();
    assert_eq!(details.tweet_count, 1);
    assert_eq!(store.network_stats().unwrap().hashtags_count, 1);
    store.authenticate(a, "alice-secret").unwrap();
}
