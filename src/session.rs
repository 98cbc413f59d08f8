//! Interactive session loop for chirp.
//!
//! An explicit finite-state machine over rustyline: a main menu
//! (login/register/exit), a logged-in menu, and bounded drill-down loops
//! for the feed, searches, and follower views. Control always returns by
//! falling out of a loop, never by re-entering the menu recursively.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{find_closest_match, format_did_you_mean, ChirpError, Result};
use crate::model::{FeedItem, Tweet, User, UserSummary};
use crate::store::Store;
use crate::{format_relative_date, truncate_text, CONTENT_DIVIDER_WIDTH, PAGE_SIZE};

const MENU_COMMANDS: &[&str] = &[
    "feed",
    "search-tweets",
    "search-users",
    "compose",
    "followers",
    "stats",
    "help",
    "logout",
];

/// Session state and resources.
pub struct SessionLoop {
    store: Store,
    editor: Editor<(), DefaultHistory>,
    history_path: PathBuf,
}

/// Top-level menu commands.
#[derive(Debug, PartialEq, Eq)]
enum MainCommand {
    Login,
    Register,
    Exit,
}

/// Logged-in menu commands.
#[derive(Debug, PartialEq, Eq)]
enum MenuCommand {
    Feed,
    SearchTweets,
    SearchUsers,
    Compose,
    Followers,
    Stats,
    Help,
    Logout,
}

/// What the user chose on a paginated listing.
#[derive(Debug, PartialEq, Eq)]
enum PageAction {
    Next,
    Back,
    Item(usize),
    Invalid,
}

/// Run the interactive session until the user exits.
///
/// # Errors
///
/// Returns an error if readline setup or history persistence fails, or if
/// a non-recoverable store error occurs.
pub fn run(store: Store) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .map_err(readline_error)?
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let editor: Editor<(), DefaultHistory> =
        Editor::with_config(config).map_err(readline_error)?;

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chirp_history");

    let mut session = SessionLoop {
        store,
        editor,
        history_path,
    };

    let _ = session.editor.load_history(&session.history_path);

    info!("Starting chirp session");
    println!(
        "{}",
        "Welcome to chirp. Commands: login, register, exit.".cyan()
    );

    loop {
        let Some(line) = session.read_line("chirp> ")? else {
            break;
        };
        if line.is_empty() {
            continue;
        }

        debug!(command = %line, "main menu command");
        match parse_main_command(&line) {
            Some(MainCommand::Login) => session.login_flow()?,
            Some(MainCommand::Register) => session.register_flow()?,
            Some(MainCommand::Exit) => break,
            None => {
                print_unknown_command(&line, &["login", "register", "exit"]);
            }
        }
    }

    let _ = session.editor.save_history(&session.history_path);
    info!("Ended chirp session");
    println!("Goodbye!");
    Ok(())
}

fn readline_error(e: ReadlineError) -> ChirpError {
    ChirpError::Other(anyhow::Error::new(e))
}

fn parse_main_command(input: &str) -> Option<MainCommand> {
    match input.to_lowercase().as_str() {
        "login" | "1" => Some(MainCommand::Login),
        "register" | "2" => Some(MainCommand::Register),
        "exit" | "quit" | "3" => Some(MainCommand::Exit),
        _ => None,
    }
}

fn parse_menu_command(input: &str) -> Option<MenuCommand> {
    match input.to_lowercase().as_str() {
        "feed" | "d" => Some(MenuCommand::Feed),
        "search-tweets" | "s" => Some(MenuCommand::SearchTweets),
        "search-users" | "u" => Some(MenuCommand::SearchUsers),
        "compose" | "c" => Some(MenuCommand::Compose),
        "followers" | "l" => Some(MenuCommand::Followers),
        "stats" => Some(MenuCommand::Stats),
        "help" | "h" | "?" => Some(MenuCommand::Help),
        "logout" | "q" => Some(MenuCommand::Logout),
        _ => None,
    }
}

/// Interpret input on a paginated listing with `page_len` visible items.
fn parse_page_action(input: &str, page_len: usize) -> PageAction {
    match input.to_lowercase().as_str() {
        "n" | "next" => PageAction::Next,
        "b" | "back" => PageAction::Back,
        other => match other.parse::<usize>() {
            Ok(n) if n >= 1 && n <= page_len => PageAction::Item(n - 1),
            _ => PageAction::Invalid,
        },
    }
}

fn print_unknown_command(input: &str, candidates: &[&str]) {
    let mut message = format!("Unknown command: '{input}'.");
    if let Some(closest) = find_closest_match(input, candidates) {
        message.push(' ');
        message.push_str(&format_did_you_mean(closest));
    }
    println!("{message}");
}

/// Print a recoverable error and keep the session going; escalate
/// anything else.
fn report(result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "session action failed");
            eprintln!("{}: {e}", "Error".red());
            if let Some(hint) = e.suggestion() {
                eprintln!("{} {hint}", "Hint:".cyan());
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

impl SessionLoop {
    /// Read one trimmed line. `None` means end-of-input for the current
    /// state (Ctrl-D); Ctrl-C clears the line and reads again.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        loop {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    return Ok(Some(line));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(e) => return Err(readline_error(e)),
            }
        }
    }

    /// Read a line and parse it as a positive integer id.
    fn read_id(&mut self, prompt: &str) -> Result<Option<i64>> {
        let Some(line) = self.read_line(prompt)? else {
            return Ok(None);
        };
        match line.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Some(id)),
            _ => Err(ChirpError::validation(format!(
                "'{line}' is not a valid numeric id"
            ))),
        }
    }

    // =========================================================================
    // Authentication flows
    // =========================================================================

    fn login_flow(&mut self) -> Result<()> {
        let id = match self.read_id("Enter user id: ") {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(()),
            Err(e) => return report(Err(e)),
        };
        let password = rpassword::prompt_password("Enter password: ")?;

        match self.store.authenticate(id, &password) {
            Ok(user) => {
                println!();
                println!("{}", format!("Login successful! Welcome, {}.", user.name).green());
                self.menu_loop(&user)
            }
            Err(e) => report(Err(e)),
        }
    }

    fn register_flow(&mut self) -> Result<()> {
        println!();
        println!("{}", "Registration".bold());
        let Some(name) = self.read_line("Enter your name: ")? else {
            return Ok(());
        };
        let Some(email) = self.read_line("Enter your email: ")? else {
            return Ok(());
        };
        let Some(city) = self.read_line("Enter your city: ")? else {
            return Ok(());
        };
        let Some(timezone) = self.read_line("Enter your timezone: ")? else {
            return Ok(());
        };
        let password = rpassword::prompt_password("Create a password: ")?;

        let new_user = crate::model::NewUser {
            name,
            email,
            city: if city.is_empty() { None } else { Some(city) },
            timezone: if timezone.is_empty() {
                None
            } else {
                Some(timezone)
            },
            password,
        };

        match self.store.register_user(&new_user) {
            Ok(usr) => {
                println!(
                    "{}",
                    format!("Registration successful. Your user id is: {usr}").green()
                );
                Ok(())
            }
            Err(e) => report(Err(e)),
        }
    }

    // =========================================================================
    // Logged-in menu
    // =========================================================================

    fn menu_loop(&mut self, user: &User) -> Result<()> {
        print_menu_help();
        let prompt = format!("chirp(@{})> ", user.usr);

        loop {
            let Some(line) = self.read_line(&prompt)? else {
                println!("You have been logged out.");
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }

            debug!(user = user.usr, command = %line, "menu command");
            let command = match parse_menu_command(&line) {
                Some(command) => command,
                None => {
                    print_unknown_command(&line, MENU_COMMANDS);
                    continue;
                }
            };

            match command {
                MenuCommand::Feed => report(self.feed_view(user.usr))?,
                MenuCommand::SearchTweets => report(self.search_tweets_view(user.usr))?,
                MenuCommand::SearchUsers => report(self.search_users_view(user.usr))?,
                MenuCommand::Compose => report(self.compose_view(user.usr))?,
                MenuCommand::Followers => report(self.followers_view(user.usr))?,
                MenuCommand::Stats => report(self.network_stats_view())?,
                MenuCommand::Help => print_menu_help(),
                MenuCommand::Logout => {
                    println!("You have been logged out.");
                    return Ok(());
                }
            }
        }
    }

    // =========================================================================
    // Feed
    // =========================================================================

    fn feed_view(&mut self, usr: i64) -> Result<()> {
        let mut page = 0usize;

        loop {
            let items = self.store.feed_page(usr, page)?;
            if items.is_empty() {
                if page == 0 {
                    println!("Your feed is empty. Follow users to see their tweets here.");
                } else {
                    println!("No more tweets to display.");
                }
                return Ok(());
            }

            println!();
            for (idx, item) in items.iter().enumerate() {
                print_feed_item(idx + 1, item);
            }

            let Some(line) =
                self.read_line("Select a tweet number for options, 'n' next, 'b' back: ")?
            else {
                return Ok(());
            };

            match parse_page_action(&line, items.len()) {
                PageAction::Next => page += 1,
                PageAction::Back => {
                    if page == 0 {
                        return Ok(());
                    }
                    page -= 1;
                }
                PageAction::Item(idx) => {
                    let tid = items[idx].tid;
                    report(self.tweet_stats_view(tid))?;
                    report(self.tweet_action_prompt(usr, tid))?;
                }
                PageAction::Invalid => {
                    println!("Invalid selection. Please try again.");
                }
            }
        }
    }

    // =========================================================================
    // Tweet search
    // =========================================================================

    fn search_tweets_view(&mut self, usr: i64) -> Result<()> {
        let Some(line) = self.read_line("Enter keyword(s) separated by space: ")? else {
            return Ok(());
        };
        let keywords: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
        if keywords.is_empty() {
            println!("No keywords given.");
            return Ok(());
        }

        let mut page = 0usize;
        loop {
            let tweets = self.store.search_tweets(&keywords, page)?;
            if tweets.is_empty() {
                if page == 0 {
                    println!("No tweets found.");
                } else {
                    println!("No more tweets found.");
                }
                return Ok(());
            }

            println!();
            for (idx, tweet) in tweets.iter().enumerate() {
                print_tweet_line(idx + 1, tweet);
            }

            let Some(line) =
                self.read_line("Select a tweet number for options, 'n' next, 'b' back: ")?
            else {
                return Ok(());
            };

            match parse_page_action(&line, tweets.len()) {
                PageAction::Next => page += 1,
                PageAction::Back => {
                    if page == 0 {
                        return Ok(());
                    }
                    page -= 1;
                }
                PageAction::Item(idx) => {
                    let tweet = &tweets[idx];
                    println!("Selected tweet:");
                    println!(
                        "{}",
                        textwrap::indent(
                            &textwrap::fill(&tweet.text, CONTENT_DIVIDER_WIDTH),
                            "  "
                        )
                    );
                    let tid = tweet.tid;
                    report(self.selected_tweet_prompt(usr, tid))?;
                }
                PageAction::Invalid => {
                    println!("Invalid selection. Please try again.");
                }
            }
        }
    }

    /// Action prompt after picking a search result: stats, reply, retweet.
    fn selected_tweet_prompt(&mut self, usr: i64, tid: i64) -> Result<()> {
        let Some(action) =
            self.read_line("Choose 'stats', 'reply', 'retweet', or 'back': ")?
        else {
            return Ok(());
        };

        match action.to_lowercase().as_str() {
            "stats" => self.tweet_stats_view(tid),
            "reply" => self.reply_flow(usr, tid),
            "retweet" => self.retweet_flow(usr, tid),
            "back" | "" => Ok(()),
            other => {
                print_unknown_command(other, &["stats", "reply", "retweet", "back"]);
                Ok(())
            }
        }
    }

    /// Reply/retweet prompt used from the feed, after stats were shown.
    fn tweet_action_prompt(&mut self, usr: i64, tid: i64) -> Result<()> {
        println!("1. Reply to tweet");
        println!("2. Retweet");
        let Some(action) = self.read_line("Choose an action (1-2) or 'back': ")? else {
            return Ok(());
        };

        match action.as_str() {
            "1" => self.reply_flow(usr, tid),
            "2" => self.retweet_flow(usr, tid),
            _ => Ok(()),
        }
    }

    fn tweet_stats_view(&mut self, tid: i64) -> Result<()> {
        let stats = self.store.tweet_stats(tid)?;
        println!(
            "Retweets: {}, Replies: {}",
            stats.retweet_count.to_string().cyan(),
            stats.reply_count.to_string().cyan()
        );
        Ok(())
    }

    // =========================================================================
    // User search and detail view
    // =========================================================================

    fn search_users_view(&mut self, viewer: i64) -> Result<()> {
        let Some(keyword) = self.read_line("Enter a keyword to search for users: ")? else {
            return Ok(());
        };
        if keyword.is_empty() {
            println!("No keyword given.");
            return Ok(());
        }

        let users = self.store.search_users(&keyword)?;
        if users.is_empty() {
            println!("No users found.");
            return Ok(());
        }

        let mut page = 0usize;
        loop {
            let start = page * PAGE_SIZE;
            if start >= users.len() {
                println!("No more users to display.");
                return Ok(());
            }
            let page_users = &users[start..users.len().min(start + PAGE_SIZE)];

            println!();
            for user in page_users {
                print_user_summary(user);
            }

            let Some(line) = self
                .read_line("Enter a user id for details, 'n' next, 'b' back: ")?
            else {
                return Ok(());
            };

            match line.to_lowercase().as_str() {
                "n" | "next" => page += 1,
                "b" | "back" => {
                    if page == 0 {
                        return Ok(());
                    }
                    page -= 1;
                }
                other => match other.parse::<i64>() {
                    Ok(id) => report(self.user_detail_view(viewer, id))?,
                    Err(_) => println!("Invalid input, please try again."),
                },
            }
        }
    }

    fn user_detail_view(&mut self, viewer: i64, target: i64) -> Result<()> {
        let details = self.store.user_details(target)?;

        println!();
        println!("{}", format!("User {} details:", details.user.usr).bold());
        println!("  Name:      {}", details.user.name);
        println!("  Email:     {}", details.user.email);
        println!("  City:      {}", details.user.city.as_deref().unwrap_or("-"));
        println!(
            "  Timezone:  {}",
            details.user.timezone.as_deref().unwrap_or("-")
        );
        println!("  Tweets:    {}", details.tweet_count);
        println!("  Following: {}", details.following_count);
        println!("  Followers: {}", details.follower_count);
        if !details.recent_tweets.is_empty() {
            println!("Most recent tweets:");
            for tweet in &details.recent_tweets {
                println!(
                    "  [{}] {} ({})",
                    tweet.tid,
                    truncate_text(&tweet.text, 60),
                    format_relative_date(tweet.tdate).dimmed()
                );
            }
        }

        loop {
            let Some(line) = self.read_line(
                "Choose 'follow', 'reply <tid>', 'retweet <tid>', 'tweets', or 'back': ",
            )?
            else {
                return Ok(());
            };

            let mut parts = line.split_whitespace();
            let action = parts.next().unwrap_or("").to_lowercase();
            let arg = parts.next();

            match action.as_str() {
                "follow" => {
                    report(self.follow_flow(viewer, target))?;
                }
                "reply" => {
                    let tid = match self.tweet_id_arg(arg, "Enter the tweet id to reply to: ")? {
                        Some(tid) => tid,
                        None => continue,
                    };
                    report(self.reply_flow(viewer, tid))?;
                }
                "retweet" => {
                    let tid = match self.tweet_id_arg(arg, "Enter the tweet id to retweet: ")? {
                        Some(tid) => tid,
                        None => continue,
                    };
                    report(self.retweet_flow(viewer, tid))?;
                }
                "tweets" => {
                    report(self.more_tweets_view(target))?;
                }
                "back" | "" => return Ok(()),
                other => {
                    print_unknown_command(
                        other,
                        &["follow", "reply", "retweet", "tweets", "back"],
                    );
                }
            }
        }
    }

    /// Tweet id from an inline argument, prompting when absent.
    fn tweet_id_arg(&mut self, arg: Option<&str>, prompt: &str) -> Result<Option<i64>> {
        if let Some(raw) = arg {
            return match raw.parse::<i64>() {
                Ok(tid) if tid > 0 => Ok(Some(tid)),
                _ => {
                    println!("Invalid tweet id. Please enter a numeric value.");
                    Ok(None)
                }
            };
        }
        match self.read_id(prompt) {
            Ok(id) => Ok(id),
            Err(e) => {
                report(Err(e))?;
                Ok(None)
            }
        }
    }

    fn more_tweets_view(&mut self, target: i64) -> Result<()> {
        let tweets = self.store.tweets_by(target)?;
        if tweets.is_empty() {
            println!("This user has no tweets.");
            return Ok(());
        }

        let mut page = 0usize;
        loop {
            let start = page * PAGE_SIZE;
            let end = tweets.len().min(start + PAGE_SIZE);
            println!();
            for tweet in &tweets[start..end] {
                println!(
                    "  [{}] {} ({})",
                    tweet.tid,
                    truncate_text(&tweet.text, 60),
                    format_relative_date(tweet.tdate).dimmed()
                );
            }

            if end >= tweets.len() {
                println!("End of tweets.");
                return Ok(());
            }

            let Some(line) = self.read_line("Show more tweets? (y/n): ")? else {
                return Ok(());
            };
            if line.eq_ignore_ascii_case("y") {
                page += 1;
            } else {
                return Ok(());
            }
        }
    }

    // =========================================================================
    // Followers
    // =========================================================================

    fn followers_view(&mut self, viewer: i64) -> Result<()> {
        let followers = self.store.followers_of(viewer)?;
        if followers.is_empty() {
            println!("You have no followers yet.");
            return Ok(());
        }

        println!("Your followers:");
        for (idx, follower) in followers.iter().enumerate() {
            println!(
                "{:>3}. {} (user id: {})",
                idx + 1,
                follower.name,
                follower.usr
            );
        }

        loop {
            let Some(line) =
                self.read_line("Select a follower number for details, or 'back': ")?
            else {
                return Ok(());
            };

            match parse_page_action(&line, followers.len()) {
                PageAction::Back => return Ok(()),
                PageAction::Item(idx) => {
                    let target = followers[idx].usr;
                    report(self.user_detail_view(viewer, target))?;
                    return Ok(());
                }
                _ => println!("Invalid selection. Please try again."),
            }
        }
    }

    // =========================================================================
    // Content creation
    // =========================================================================

    fn compose_view(&mut self, usr: i64) -> Result<()> {
        let Some(text) = self.read_line("Compose your tweet (hashtags with #): ")? else {
            return Ok(());
        };

        let tid = self.store.compose_tweet(usr, &text)?;
        println!("{}", format!("Tweet {tid} posted successfully!").green());
        Ok(())
    }

    fn reply_flow(&mut self, usr: i64, parent: i64) -> Result<()> {
        let Some(text) = self.read_line("Type your reply (or 'back' to cancel): ")? else {
            return Ok(());
        };
        if text.eq_ignore_ascii_case("back") || text.is_empty() {
            return Ok(());
        }

        let tid = self.store.compose_reply(parent, usr, &text)?;
        println!("{}", format!("Reply {tid} posted successfully.").green());
        Ok(())
    }

    fn retweet_flow(&mut self, usr: i64, tid: i64) -> Result<()> {
        let Some(confirm) = self.read_line("Press 'y' to retweet or 'back' to cancel: ")? else {
            return Ok(());
        };
        if !confirm.eq_ignore_ascii_case("y") {
            return Ok(());
        }

        self.store.retweet(usr, tid)?;
        println!("{}", "The tweet was retweeted successfully.".green());
        Ok(())
    }

    fn follow_flow(&mut self, viewer: i64, target: i64) -> Result<()> {
        self.store.follow(viewer, target)?;
        println!("{}", "You are now following this user.".green());
        Ok(())
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    fn network_stats_view(&mut self) -> Result<()> {
        let stats = self.store.network_stats()?;
        println!("{}", "Network Statistics".bold().cyan());
        println!("{}", "─".repeat(40));
        println!("  {:<20} {}", "Users:", stats.users_count);
        println!("  {:<20} {}", "Tweets:", stats.tweets_count);
        println!("  {:<20} {}", "Replies:", stats.replies_count);
        println!("  {:<20} {}", "Follows:", stats.follows_count);
        println!("  {:<20} {}", "Retweets:", stats.retweets_count);
        println!("  {:<20} {}", "Hashtags:", stats.hashtags_count);
        Ok(())
    }
}

// =============================================================================
// Display helpers
// =============================================================================

fn print_menu_help() {
    println!();
    println!("{}", "Commands:".bold().cyan());
    println!("  feed (d)           - display your feed");
    println!("  search-tweets (s)  - search for tweets");
    println!("  search-users (u)   - search for users");
    println!("  compose (c)        - compose a tweet");
    println!("  followers (l)      - list your followers");
    println!("  stats              - show network statistics");
    println!("  help               - show this help");
    println!("  logout (q)         - log out");
}

fn print_feed_item(num: usize, item: &FeedItem) {
    let badge = if item.is_retweet() {
        format!("RT by @{} ", item.retweeter.unwrap_or_default()).magenta()
    } else {
        String::new().normal()
    };
    println!(
        "{:>3}. {}@{}: {} ({})",
        num,
        badge,
        item.writer,
        truncate_text(&item.text, CONTENT_DIVIDER_WIDTH),
        format_relative_date(item.effective_date).dimmed()
    );
}

fn print_tweet_line(num: usize, tweet: &Tweet) {
    println!(
        "{:>3}. @{}: {} ({})",
        num,
        tweet.writer,
        truncate_text(&tweet.text, CONTENT_DIVIDER_WIDTH),
        format_relative_date(tweet.tdate).dimmed()
    );
}

fn print_user_summary(user: &UserSummary) {
    println!(
        "  id: {:<6} name: {:<20} city: {}",
        user.usr,
        user.name,
        user.city.as_deref().unwrap_or("-")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_commands_parse_words_and_digits() {
        assert_eq!(parse_main_command("login"), Some(MainCommand::Login));
        assert_eq!(parse_main_command("1"), Some(MainCommand::Login));
        assert_eq!(parse_main_command("REGISTER"), Some(MainCommand::Register));
        assert_eq!(parse_main_command("3"), Some(MainCommand::Exit));
        assert_eq!(parse_main_command("bogus"), None);
    }

    #[test]
    fn menu_commands_accept_short_aliases() {
        assert_eq!(parse_menu_command("d"), Some(MenuCommand::Feed));
        assert_eq!(parse_menu_command("search-tweets"), Some(MenuCommand::SearchTweets));
        assert_eq!(parse_menu_command("u"), Some(MenuCommand::SearchUsers));
        assert_eq!(parse_menu_command("q"), Some(MenuCommand::Logout));
        assert_eq!(parse_menu_command("display"), None);
    }

    #[test]
    fn page_actions_bound_check_selections() {
        assert_eq!(parse_page_action("n", 5), PageAction::Next);
        assert_eq!(parse_page_action("BACK", 5), PageAction::Back);
        assert_eq!(parse_page_action("1", 5), PageAction::Item(0));
        assert_eq!(parse_page_action("5", 5), PageAction::Item(4));
        assert_eq!(parse_page_action("6", 5), PageAction::Invalid);
        assert_eq!(parse_page_action("0", 5), PageAction::Invalid);
        assert_eq!(parse_page_action("x", 5), PageAction::Invalid);
    }
}
