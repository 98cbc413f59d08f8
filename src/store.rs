//! `SQLite` repository for chirp.
//!
//! All reads and writes go through [`Store`]; nothing else touches the
//! connection. Every statement binds user-supplied values as parameters.

use crate::auth::{hash_password, verify_password};
use crate::error::{ChirpError, Result};
use crate::hashtags::extract_hashtags;
use crate::model::{
    FeedItem, NetworkStats, NewUser, Tweet, TweetStats, User, UserDetails, UserSummary,
};
use crate::PAGE_SIZE;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

fn parse_rfc3339_or_epoch(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value).map_or_else(
        |_| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default(),
        |dt| dt.with_timezone(&Utc),
    )
}

fn parse_rfc3339_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        tid: row.get(0)?,
        writer: row.get(1)?,
        tdate: parse_rfc3339_or_epoch(row.get(2)?),
        text: row.get(3)?,
        replyto: row.get(4)?,
    })
}

/// `SQLite` repository
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        // Set pragmas for performance and integrity
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let current_version = self.get_schema_version();

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(ChirpError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            });
        }

        Ok(())
    }

    fn get_schema_version(&self) -> i32 {
        let result: std::result::Result<i32, _> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Treat a missing meta table as version 0.
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            -- Metadata table
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Users. pwd holds an argon2id PHC string, never plaintext.
            CREATE TABLE IF NOT EXISTS users (
                usr INTEGER PRIMARY KEY AUTOINCREMENT,
                pwd TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                city TEXT,
                timezone TEXT
            );

            -- Tweets; replyto is NULL for top-level tweets.
            CREATE TABLE IF NOT EXISTS tweets (
                tid INTEGER PRIMARY KEY AUTOINCREMENT,
                writer INTEGER NOT NULL REFERENCES users(usr),
                tdate TEXT NOT NULL,
                text TEXT NOT NULL,
                replyto INTEGER REFERENCES tweets(tid)
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_writer ON tweets(writer);
            CREATE INDEX IF NOT EXISTS idx_tweets_tdate ON tweets(tdate);
            CREATE INDEX IF NOT EXISTS idx_tweets_replyto ON tweets(replyto);

            -- Follow edges. Duplicate pairs are allowed; whether to dedup
            -- is an open product question.
            CREATE TABLE IF NOT EXISTS follows (
                flwer INTEGER NOT NULL REFERENCES users(usr),
                flwee INTEGER NOT NULL REFERENCES users(usr),
                start_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_follows_flwer ON follows(flwer);
            CREATE INDEX IF NOT EXISTS idx_follows_flwee ON follows(flwee);

            -- Retweets. Duplicates allowed, same open question as follows.
            CREATE TABLE IF NOT EXISTS retweets (
                usr INTEGER NOT NULL REFERENCES users(usr),
                tid INTEGER NOT NULL REFERENCES tweets(tid),
                rdate TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_retweets_tid ON retweets(tid);

            -- Hashtag terms, created lazily on first use.
            CREATE TABLE IF NOT EXISTS hashtags (
                term TEXT PRIMARY KEY
            );

            -- Tweet-to-hashtag links.
            CREATE TABLE IF NOT EXISTS mentions (
                tid INTEGER NOT NULL REFERENCES tweets(tid),
                term TEXT NOT NULL REFERENCES hashtags(term),
                PRIMARY KEY (tid, term)
            );
            ",
        )?;

        Ok(())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Register a new user and return the assigned id.
    ///
    /// Ids come from the store's AUTOINCREMENT sequence, so they are
    /// strictly increasing even across deletes. Name and email are not
    /// checked for uniqueness; duplicate registrations are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, hashing, or the insert fails.
    pub fn register_user(&self, new_user: &NewUser) -> Result<i64> {
        if new_user.name.trim().is_empty() {
            return Err(ChirpError::validation("name must not be empty"));
        }
        if new_user.password.is_empty() {
            return Err(ChirpError::validation("password must not be empty"));
        }

        let pwd = hash_password(&new_user.password)?;
        self.conn.execute(
            "INSERT INTO users (pwd, name, email, city, timezone) VALUES (?, ?, ?, ?, ?)",
            params![
                pwd,
                new_user.name,
                new_user.email,
                new_user.city,
                new_user.timezone,
            ],
        )?;

        let usr = self.conn.last_insert_rowid();
        info!("Registered user {}", usr);
        Ok(usr)
    }

    /// Verify credentials and return the user on success.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::AuthenticationFailed`] for an unknown id or a
    /// wrong password; the two cases are indistinguishable by design.
    pub fn authenticate(&self, usr: i64, password: &str) -> Result<User> {
        let result = self.conn.query_row(
            "SELECT usr, pwd, name, email, city, timezone FROM users WHERE usr = ?",
            params![usr],
            |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    User {
                        usr: row.get(0)?,
                        name: row.get(2)?,
                        email: row.get(3)?,
                        city: row.get(4)?,
                        timezone: row.get(5)?,
                    },
                ))
            },
        );

        match result {
            Ok((stored_hash, user)) if verify_password(password, &stored_hash) => {
                debug!("User {} authenticated", usr);
                Ok(user)
            }
            Ok(_) | Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(ChirpError::AuthenticationFailed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a user's profile fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_user(&self, usr: i64) -> Result<Option<User>> {
        let result = self.conn.query_row(
            "SELECT usr, name, email, city, timezone FROM users WHERE usr = ?",
            params![usr],
            |row| {
                Ok(User {
                    usr: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    city: row.get(3)?,
                    timezone: row.get(4)?,
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Feed assembly
    // =========================================================================

    /// One page of the session user's feed, newest first.
    ///
    /// The feed is the union of tweets authored by followees and retweets
    /// made by followees; a retweet carries the original text but its own
    /// date. Five items per page.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn feed_page(&self, usr: i64, page: usize) -> Result<Vec<FeedItem>> {
        let offset = page * PAGE_SIZE;
        let mut stmt = self.conn.prepare(
            r"
            SELECT t.tid, t.writer, t.text, t.tdate AS edate, NULL AS retweeter
              FROM tweets t
              JOIN follows f ON t.writer = f.flwee
             WHERE f.flwer = ?1
            UNION
            SELECT t.tid, t.writer, t.text, r.rdate AS edate, r.usr AS retweeter
              FROM retweets r
              JOIN tweets t ON r.tid = t.tid
              JOIN follows f ON r.usr = f.flwee
             WHERE f.flwer = ?1
             ORDER BY edate DESC, tid DESC
             LIMIT ?2 OFFSET ?3
            ",
        )?;

        let items = stmt
            .query_map(
                params![usr, PAGE_SIZE as i64, offset as i64],
                |row| {
                    Ok(FeedItem {
                        tid: row.get(0)?,
                        writer: row.get(1)?,
                        text: row.get(2)?,
                        effective_date: parse_rfc3339_or_epoch(row.get(3)?),
                        retweeter: row.get(4)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// One page of tweets whose text contains ANY of the keywords
    /// (case-insensitive substring match), newest first.
    ///
    /// The OR condition is built from a placeholder list; keywords are
    /// always bound, never spliced into the SQL.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty keyword list, otherwise any
    /// query failure.
    pub fn search_tweets(&self, keywords: &[String], page: usize) -> Result<Vec<Tweet>> {
        if keywords.is_empty() {
            return Err(ChirpError::validation("enter at least one keyword"));
        }

        let conditions: String = keywords
            .iter()
            .map(|_| "LOWER(text) LIKE ?")
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT tid, writer, tdate, text, replyto FROM tweets \
             WHERE {conditions} ORDER BY tdate DESC, tid DESC \
             LIMIT {limit} OFFSET {offset}",
            limit = PAGE_SIZE,
            offset = page * PAGE_SIZE,
        );

        let patterns: Vec<String> = keywords
            .iter()
            .map(|kw| format!("%{}%", kw.to_lowercase()))
            .collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(rusqlite::params_from_iter(patterns.iter()), tweet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tweets)
    }

    /// Search users by keyword: name matches first (shortest matched name
    /// first), then users whose city matches but whose name does not
    /// (shortest matched city first).
    ///
    /// The whole result is returned eagerly; callers slice it into pages.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn search_users(&self, keyword: &str) -> Result<Vec<UserSummary>> {
        let pattern = format!("%{}%", keyword.to_lowercase());

        let mut stmt = self.conn.prepare(
            "SELECT usr, name, city FROM users \
             WHERE LOWER(name) LIKE ?1 \
             ORDER BY LENGTH(name) ASC, usr ASC",
        )?;
        let mut users = stmt
            .query_map(params![pattern], |row| {
                Ok(UserSummary {
                    usr: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT usr, name, city FROM users \
             WHERE LOWER(name) NOT LIKE ?1 AND LOWER(city) LIKE ?1 \
             ORDER BY LENGTH(city) ASC, usr ASC",
        )?;
        let city_matches = stmt
            .query_map(params![pattern], |row| {
                Ok(UserSummary {
                    usr: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        users.extend(city_matches);
        Ok(users)
    }

    // =========================================================================
    // Tweet statistics
    // =========================================================================

    /// Retweet and reply counts for a tweet.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] if the tweet does not exist.
    pub fn tweet_stats(&self, tid: i64) -> Result<TweetStats> {
        if self.get_tweet(tid)?.is_none() {
            return Err(ChirpError::not_found("Tweet", tid));
        }

        let stats = self.conn.query_row(
            r"
            SELECT
                (SELECT COUNT(*) FROM retweets WHERE tid = ?1),
                (SELECT COUNT(*) FROM tweets WHERE replyto = ?1)
            ",
            params![tid],
            |row| {
                Ok(TweetStats {
                    retweet_count: row.get(0)?,
                    reply_count: row.get(1)?,
                })
            },
        )?;

        Ok(stats)
    }

    /// Fetch a single tweet.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tweet(&self, tid: i64) -> Result<Option<Tweet>> {
        let result = self.conn.query_row(
            "SELECT tid, writer, tdate, text, replyto FROM tweets WHERE tid = ?",
            params![tid],
            tweet_from_row,
        );

        match result {
            Ok(tweet) => Ok(Some(tweet)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Social graph
    // =========================================================================

    /// Record that `flwer` follows `flwee`, dated now.
    ///
    /// Duplicate edges are deliberately not prevented.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a self-follow, [`ChirpError::NotFound`]
    /// for an unknown followee, otherwise any insert failure.
    pub fn follow(&self, flwer: i64, flwee: i64) -> Result<()> {
        if flwer == flwee {
            return Err(ChirpError::validation("you cannot follow yourself"));
        }
        if self.get_user(flwee)?.is_none() {
            return Err(ChirpError::not_found("User", flwee));
        }

        self.conn.execute(
            "INSERT INTO follows (flwer, flwee, start_date) VALUES (?, ?, ?)",
            params![flwer, flwee, Utc::now().to_rfc3339()],
        )?;
        info!("User {} now follows {}", flwer, flwee);
        Ok(())
    }

    /// All users with a follow edge targeting `usr`.
    ///
    /// Duplicate edges collapse to one listing per follower.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn followers_of(&self, usr: i64) -> Result<Vec<UserSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT usr, name, city FROM users \
             WHERE usr IN (SELECT flwer FROM follows WHERE flwee = ?) \
             ORDER BY usr ASC",
        )?;

        let followers = stmt
            .query_map(params![usr], |row| {
                Ok(UserSummary {
                    usr: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(followers)
    }

    // =========================================================================
    // User detail view
    // =========================================================================

    /// Profile fields, aggregate counts, and the three most recent tweets.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] if the user does not exist.
    pub fn user_details(&self, usr: i64) -> Result<UserDetails> {
        let user = self
            .get_user(usr)?
            .ok_or_else(|| ChirpError::not_found("User", usr))?;

        let (tweet_count, following_count, follower_count) = self.conn.query_row(
            r"
            SELECT
                (SELECT COUNT(*) FROM tweets WHERE writer = ?1),
                (SELECT COUNT(*) FROM follows WHERE flwer = ?1),
                (SELECT COUNT(*) FROM follows WHERE flwee = ?1)
            ",
            params![usr],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT tid, writer, tdate, text, replyto FROM tweets \
             WHERE writer = ? ORDER BY tdate DESC, tid DESC LIMIT 3",
        )?;
        let recent_tweets = stmt
            .query_map(params![usr], tweet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(UserDetails {
            user,
            tweet_count,
            following_count,
            follower_count,
            recent_tweets,
        })
    }

    /// All tweets by a user, newest first. Loaded eagerly; the session
    /// layer slices this into pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tweets_by(&self, usr: i64) -> Result<Vec<Tweet>> {
        let mut stmt = self.conn.prepare(
            "SELECT tid, writer, tdate, text, replyto FROM tweets \
             WHERE writer = ? ORDER BY tdate DESC, tid DESC",
        )?;
        let tweets = stmt
            .query_map(params![usr], tweet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tweets)
    }

    // =========================================================================
    // Content creation
    // =========================================================================

    /// Post a tweet, extracting hashtags and linking mention rows.
    ///
    /// The tweet, hashtag upserts, and mention links commit in a single
    /// transaction; none of them can be observed without the others.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty text, otherwise any insert
    /// failure (the transaction rolls back).
    pub fn compose_tweet(&mut self, writer: i64, text: &str) -> Result<i64> {
        if text.trim().is_empty() {
            return Err(ChirpError::validation("tweet text must not be empty"));
        }

        let terms = extract_hashtags(text);
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO tweets (writer, tdate, text, replyto) VALUES (?, ?, ?, NULL)",
            params![writer, Utc::now().to_rfc3339(), text],
        )?;
        let tid = tx.last_insert_rowid();

        {
            let mut tag_stmt = tx.prepare("INSERT OR IGNORE INTO hashtags (term) VALUES (?)")?;
            let mut mention_stmt = tx.prepare("INSERT INTO mentions (tid, term) VALUES (?, ?)")?;
            for term in &terms {
                tag_stmt.execute(params![term])?;
                mention_stmt.execute(params![tid, term])?;
            }
        }

        tx.commit()?;
        info!("User {} posted tweet {} ({} hashtags)", writer, tid, terms.len());
        Ok(tid)
    }

    /// Post a reply to an existing tweet.
    ///
    /// Replies do not get hashtag extraction; only top-level tweets feed
    /// the hashtag tables.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty text, [`ChirpError::NotFound`]
    /// for an unknown parent, otherwise any insert failure.
    pub fn compose_reply(&self, parent: i64, writer: i64, text: &str) -> Result<i64> {
        if text.trim().is_empty() {
            return Err(ChirpError::validation("reply text must not be empty"));
        }
        if self.get_tweet(parent)?.is_none() {
            return Err(ChirpError::not_found("Tweet", parent));
        }

        self.conn.execute(
            "INSERT INTO tweets (writer, tdate, text, replyto) VALUES (?, ?, ?, ?)",
            params![writer, Utc::now().to_rfc3339(), text, parent],
        )?;

        let tid = self.conn.last_insert_rowid();
        info!("User {} replied to tweet {} with {}", writer, parent, tid);
        Ok(tid)
    }

    /// Record a retweet, dated now.
    ///
    /// Duplicate retweets are deliberately not prevented.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown tweet, otherwise
    /// any insert failure.
    pub fn retweet(&self, usr: i64, tid: i64) -> Result<()> {
        if self.get_tweet(tid)?.is_none() {
            return Err(ChirpError::not_found("Tweet", tid));
        }

        self.conn.execute(
            "INSERT INTO retweets (usr, tid, rdate) VALUES (?, ?, ?)",
            params![usr, tid, Utc::now().to_rfc3339()],
        )?;
        info!("User {} retweeted {}", usr, tid);
        Ok(())
    }

    // =========================================================================
    // Network statistics
    // =========================================================================

    /// Table counts and tweet date bounds for the whole network.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn network_stats(&self) -> Result<NetworkStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let (first, last) = self.conn.query_row(
            "SELECT MIN(tdate), MAX(tdate) FROM tweets",
            [],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            },
        )?;

        Ok(NetworkStats {
            users_count: count("SELECT COUNT(*) FROM users")?,
            tweets_count: count("SELECT COUNT(*) FROM tweets")?,
            replies_count: count("SELECT COUNT(*) FROM tweets WHERE replyto IS NOT NULL")?,
            follows_count: count("SELECT COUNT(*) FROM follows")?,
            retweets_count: count("SELECT COUNT(*) FROM retweets")?,
            hashtags_count: count("SELECT COUNT(*) FROM hashtags")?,
            first_tweet_date: parse_rfc3339_opt(first),
            last_tweet_date: parse_rfc3339_opt(last),
        })
    }
}
