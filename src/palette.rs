//! Command palette
//!
//! Fuzzy subsequence search over a fixed command list, plus a short list of
//! recent picks kept in [`Preferences`]. Commands either navigate to a view
//! or run a named action; actions are bound at runtime by whoever owns the
//! capability behind them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nucleo_matcher::pattern::{Atom, AtomKind, CaseMatching, Normalization};
use nucleo_matcher::{Config as MatcherConfig, Matcher, Utf32Str};
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::storage::{lock, StateStore};
use crate::error::Result;
use crate::notify::ToastStore;
use crate::prefs::Preferences;

/// Reserved shortcut that opens the palette
pub const OPEN_SHORTCUT: &str = "Ctrl+K";
/// Same shortcut on macOS
pub const OPEN_SHORTCUT_MAC: &str = "Cmd+K";

/// Whether a key press is the palette shortcut
pub fn is_open_shortcut(key: char, ctrl: bool, meta: bool) -> bool {
    (ctrl || meta) && key.eq_ignore_ascii_case(&'k')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum CommandAction {
    /// Switch to a view
    Navigate(String),
    /// Run a named action
    Action(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteCommand {
    pub id: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub section: String,
    pub action: CommandAction,
}

impl PaletteCommand {
    pub fn navigate(id: &str, title: &str, view: &str, keywords: &[&str]) -> Self {
        PaletteCommand {
            id: id.to_string(),
            title: title.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            section: "Navigation".to_string(),
            action: CommandAction::Navigate(view.to_string()),
        }
    }

    pub fn action(id: &str, title: &str, action: &str, keywords: &[&str]) -> Self {
        PaletteCommand {
            id: id.to_string(),
            title: title.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            section: "Actions".to_string(),
            action: CommandAction::Action(action.to_string()),
        }
    }
}

/// Stock command list
pub fn default_commands() -> Vec<PaletteCommand> {
    vec![
        PaletteCommand::navigate("go-dashboard", "Go to Dashboard", "dashboard", &["home", "overview"]),
        PaletteCommand::navigate("go-sessions", "Go to Sessions", "sessions", &["agents", "runs"]),
        PaletteCommand::navigate("go-activity", "Go to Activity", "activity", &["events", "feed", "log"]),
        PaletteCommand::navigate(
            "go-notifications",
            "Go to Notifications",
            "notifications",
            &["inbox", "alerts"],
        ),
        PaletteCommand::navigate("go-settings", "Go to Settings", "settings", &["preferences", "config"]),
        PaletteCommand::action("reconnect", "Reconnect to Gateway", "reconnect", &["socket", "retry"]),
        PaletteCommand::action("check-health", "Check Gateway Health", "check-health", &["ping", "status"]),
        PaletteCommand::action(
            "refresh-sessions",
            "Refresh Sessions",
            "refresh-sessions",
            &["reload", "poll"],
        ),
        PaletteCommand::action(
            "mark-all-read",
            "Mark All Notifications Read",
            "mark-all-read",
            &["inbox", "read"],
        ),
        PaletteCommand::action(
            "clear-notifications",
            "Clear Notifications",
            "clear-notifications",
            &["inbox", "delete"],
        ),
    ]
}

/// Added when the title starts with the query
const PREFIX_BONUS: u32 = 1_000;
/// Keyword hits rank below equal title hits
const KEYWORD_PENALTY: u32 = 2;

/// A compiled fuzzy query.
///
/// Every query character must appear in order (case-insensitive).
/// Consecutive runs and hits at word starts score higher and gaps cost
/// points; a title prefix beats everything else.
pub struct FuzzyQuery {
    atom: Atom,
    needle: String,
    matcher: Matcher,
    buf: Vec<char>,
}

impl FuzzyQuery {
    pub fn new(query: &str) -> Self {
        let needle: String = query
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        FuzzyQuery {
            atom: Atom::new(
                &needle,
                CaseMatching::Ignore,
                Normalization::Smart,
                AtomKind::Fuzzy,
                false,
            ),
            needle,
            matcher: Matcher::new(MatcherConfig::DEFAULT),
            buf: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// `None` when the query is not a subsequence of `target`
    pub fn score(&mut self, target: &str) -> Option<u32> {
        if self.needle.is_empty() {
            return Some(0);
        }
        let score = u32::from(
            self.atom
                .score(Utf32Str::new(target, &mut self.buf), &mut self.matcher)?,
        );
        if target.to_lowercase().starts_with(&self.needle) {
            Some(score + PREFIX_BONUS)
        } else {
            Some(score)
        }
    }

    /// Best score over a command's title and keywords
    pub fn score_command(&mut self, command: &PaletteCommand) -> Option<u32> {
        let title = self.score(&command.title);
        let keywords = command
            .keywords
            .iter()
            .filter_map(|k| self.score(k))
            .map(|s| s.saturating_sub(KEYWORD_PENALTY))
            .max();
        title.max(keywords)
    }
}

/// One-off score of `query` against `target`
pub fn fuzzy_score(query: &str, target: &str) -> Option<u32> {
    FuzzyQuery::new(query).score(target)
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteMatch {
    pub command: PaletteCommand,
    pub score: u32,
    /// Listed because it was picked recently
    pub recent: bool,
}

/// What running a command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// The caller should switch to this view
    Navigate(String),
    /// The action ran
    Ran,
    /// The action was unavailable or failed; an error toast was shown
    Failed,
}

/// Runtime binding for an action
pub type ActionHandler = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Command palette service
#[derive(Clone)]
pub struct CommandPalette {
    commands: Arc<Vec<PaletteCommand>>,
    handlers: Arc<Mutex<HashMap<String, ActionHandler>>>,
    /// Loaded once; storage only mirrors it
    prefs: Arc<Mutex<Preferences>>,
    storage: StateStore,
    toasts: ToastStore,
}

impl CommandPalette {
    pub fn new(commands: Vec<PaletteCommand>, storage: StateStore, toasts: ToastStore) -> Self {
        CommandPalette {
            commands: Arc::new(commands),
            handlers: Arc::default(),
            prefs: Arc::new(Mutex::new(Preferences::load(&storage))),
            storage,
            toasts,
        }
    }

    pub fn commands(&self) -> &[PaletteCommand] {
        &self.commands
    }

    pub fn get(&self, id: &str) -> Option<&PaletteCommand> {
        self.commands.iter().find(|c| c.id == id)
    }

    /// Bind an action name to a handler, replacing any previous binding
    pub fn bind<F>(&self, action: &str, handler: F)
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(action.to_string(), Arc::new(handler));
    }

    pub fn unbind(&self, action: &str) -> bool {
        lock(&self.handlers).remove(action).is_some()
    }

    /// Recent picks, most recent first
    pub fn recent(&self) -> Vec<String> {
        lock(&self.prefs).recent_commands.clone()
    }

    /// Remember a pick.
    ///
    /// Kept for the session even when it cannot be persisted.
    pub fn record_pick(&self, id: &str) {
        let mut prefs = lock(&self.prefs);
        prefs.push_recent(id);
        prefs.save(&self.storage);
    }

    /// Matching commands, best first.
    ///
    /// An empty query lists recent picks first, then everything else in
    /// list order.
    pub fn search(&self, query: &str) -> Vec<PaletteMatch> {
        if query.trim().is_empty() {
            let recent = self.recent();
            let mut out: Vec<PaletteMatch> = recent
                .iter()
                .filter_map(|id| self.get(id))
                .map(|c| PaletteMatch {
                    command: c.clone(),
                    score: 0,
                    recent: true,
                })
                .collect();
            out.extend(
                self.commands
                    .iter()
                    .filter(|c| !recent.contains(&c.id))
                    .map(|c| PaletteMatch {
                        command: c.clone(),
                        score: 0,
                        recent: false,
                    }),
            );
            return out;
        }

        let mut fuzzy = FuzzyQuery::new(query);
        let mut out: Vec<PaletteMatch> = self
            .commands
            .iter()
            .filter_map(|c| {
                fuzzy.score_command(c).map(|score| PaletteMatch {
                    command: c.clone(),
                    score,
                    recent: false,
                })
            })
            .collect();
        // Stable: ties keep list order
        out.sort_by(|a, b| b.score.cmp(&a.score));
        out
    }

    /// Run a command by id and record the pick.
    ///
    /// Failures are reported as an error toast, never returned.
    pub fn execute(&self, id: &str) -> Execution {
        let Some(command) = self.get(id).cloned() else {
            self.toasts.error(format!("Unknown command: {}", id));
            return Execution::Failed;
        };
        self.record_pick(&command.id);

        match command.action {
            CommandAction::Navigate(view) => {
                debug!(view = %view, "Palette navigation");
                Execution::Navigate(view)
            }
            CommandAction::Action(name) => {
                let handler = lock(&self.handlers).get(&name).cloned();
                let Some(handler) = handler else {
                    self.toasts
                        .error(format!("{} is not available right now", command.title));
                    return Execution::Failed;
                };
                match handler() {
                    Ok(()) => Execution::Ran,
                    Err(e) => {
                        warn!(action = %name, "Palette action failed: {}", e);
                        self.toasts.error(format!("{} failed: {}", command.title, e));
                        Execution::Failed
                    }
                }
            }
        }
    }
}
