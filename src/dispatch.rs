//! Command dispatch
//!
//! The central reasoning loop over the utterance stream. Each utterance
//! runs through a fixed sequence: rolling timers, the profanity filter,
//! media commands, bare wake-name detection, pending disambiguation,
//! then the main wake-gated path with conjunction splitting and verb
//! classification. Every recoverable failure becomes a cue plus a log
//! line; nothing stops the loop except an explicit stop request.
//!
//! Two bits of conversational state survive between utterances: a
//! pending action verb waiting for its target (7 s window, fixed at
//! creation, a failed follow-up does not extend it) and the wake-name
//! mention flag (30 s window).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::builtin::{self, BuiltinTarget};
use crate::config::AssistantConfig;
use crate::error::{Error, Result};
use crate::feedback::{CueId, DesktopHooks, Notifier};
use crate::launcher::{Action, Resolver};
use crate::media::{self, MediaKeys};
use crate::proc::ProcessControl;
use crate::swear::SwearFilter;
use crate::table::{CommandTable, CommandTableHandle, CommandTarget};

struct PendingAction {
    verb: String,
    action: Action,
    original_text: String,
    expires_at: Instant,
}

/// In-memory conversational state, owned exclusively by the dispatcher.
struct ConversationContext {
    pending: Option<PendingAction>,
    name_mention: Option<Instant>,
}

impl ConversationContext {
    fn new() -> Self {
        Self {
            pending: None,
            name_mention: None,
        }
    }

    /// Expire whatever has outlived its window.
    fn tick(&mut self, now: Instant, mention_timeout: Duration) {
        if let Some(pending) = &self.pending {
            if now > pending.expires_at {
                tracing::debug!(verb = %pending.verb, "disambiguation window expired");
                self.pending = None;
            }
        }
        if let Some(mentioned) = self.name_mention {
            if now.saturating_duration_since(mentioned) > mention_timeout {
                self.name_mention = None;
            }
        }
    }
}

enum SubOutcome {
    Handled,
    NoTarget,
}

pub struct CommandDispatcher {
    config: Arc<AssistantConfig>,
    table: CommandTableHandle,
    resolver: Box<dyn Resolver>,
    proc: Arc<dyn ProcessControl>,
    media: Box<dyn MediaKeys>,
    hooks: Box<dyn DesktopHooks>,
    notifier: Arc<dyn Notifier>,
    swear: SwearFilter,
    wake_names: Vec<String>,
    ctx: ConversationContext,
}

impl CommandDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AssistantConfig>,
        table: CommandTableHandle,
        resolver: Box<dyn Resolver>,
        proc: Arc<dyn ProcessControl>,
        media: Box<dyn MediaKeys>,
        hooks: Box<dyn DesktopHooks>,
        notifier: Arc<dyn Notifier>,
        swear: SwearFilter,
    ) -> Self {
        let wake_names = config.wake_names();
        Self {
            config,
            table,
            resolver,
            proc,
            media,
            hooks,
            notifier,
            swear,
            wake_names,
            ctx: ConversationContext::new(),
        }
    }

    /// Block on the utterance channel until asked to stop. The 1 s poll
    /// keeps the loop responsive to the stop flag.
    pub fn run(&mut self, utterances: &Receiver<String>, running: &AtomicBool) {
        tracing::info!("dispatcher loop started");
        while running.load(Ordering::SeqCst) {
            match utterances.recv_timeout(Duration::from_secs(1)) {
                Ok(text) => self.handle_utterance(&text, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("utterance channel closed");
                    break;
                }
            }
        }
        tracing::info!("dispatcher loop stopped");
    }

    pub fn awaiting_disambiguation(&self) -> bool {
        self.ctx.pending.is_some()
    }

    pub fn name_mentioned(&self) -> bool {
        self.ctx.name_mention.is_some()
    }

    /// Process one finalized utterance. `now` is threaded through so the
    /// timer rules stay testable.
    pub fn handle_utterance(&mut self, raw: &str, now: Instant) {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return;
        }
        tracing::debug!(%text, "utterance");

        // Rolling timers run before anything else sees the utterance.
        self.ctx.tick(now, self.config.name_mention_timeout());

        // The counters are kept regardless of what happens next;
        // censorship mode additionally swallows the utterance.
        match self.swear.record(&text) {
            Ok(true) if self.config.censorship => {
                self.notifier.on_cue(CueId::Censored);
                return;
            }
            Ok(_) => {}
            Err(e) => self.notifier.on_error(&e),
        }

        // Media commands work anywhere, with or without the wake name.
        if let Some(action) = media::media_action(&text) {
            tracing::info!(?action, "media command");
            if let Err(e) = self.media.tap(action) {
                self.report(&e);
            }
            return;
        }

        // A bare name is an invitation: acknowledge and wait.
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() <= 2 && self.wake_names.iter().any(|n| words[0] == n) {
            self.notifier.on_cue(CueId::Acknowledge);
            self.ctx.name_mention = Some(now);
            return;
        }

        // A remembered verb is waiting for its target.
        if let Some(pending) = self.ctx.pending.take() {
            self.handle_disambiguation(&text, pending);
            return;
        }

        self.handle_main(&text, now);
    }

    /// The follow-up to an utterance that had a verb but no target.
    fn handle_disambiguation(&mut self, text: &str, pending: PendingAction) {
        if let Some(target) = builtin::find_target(text) {
            tracing::info!(verb = %pending.verb, ?target, "disambiguated to builtin");
            self.execute_builtin(target, pending.action);
            return;
        }

        let table = self.table.current();
        if let Some((keyword, target)) = table.match_any(text) {
            let synthesized = format!("{} {}", pending.verb, keyword);
            tracing::info!(
                command = %synthesized,
                was = %pending.original_text,
                "disambiguated"
            );
            let target = target.clone();
            self.execute_target(keyword.to_string(), &target, pending.action);
            return;
        }

        // Still nothing: complain, keep waiting out the original window.
        self.notifier.on_cue(CueId::NotUnderstood);
        self.ctx.pending = Some(pending);
    }

    /// The wake-gated path: global commands, then conjunction-split
    /// sub-commands with verb propagation.
    fn handle_main(&mut self, text: &str, now: Instant) {
        let named = self.wake_names.iter().any(|n| text.contains(n.as_str()));
        if !named && self.ctx.name_mention.is_none() {
            return;
        }

        if builtin::is_shutdown(text) {
            tracing::warn!("shutdown requested by voice");
            self.notifier.on_cue(CueId::Shutdown);
            if let Err(e) = self.proc.shutdown() {
                self.report(&e);
            }
            return;
        }
        if builtin::is_restart(text) {
            tracing::warn!("restart requested by voice");
            self.notifier.on_cue(CueId::Shutdown);
            if let Err(e) = self.proc.restart() {
                self.report(&e);
            }
            return;
        }

        let subs = split_subcommands(text, &self.config.conjunctions);
        let mut carried_verb: Option<(String, Action)> = None;
        let mut any_unresolved = false;

        for sub in subs {
            let classified = classify_action(&sub, &self.config.open_verbs, &self.config.close_verbs)
                .or_else(|| carried_verb.clone());

            let Some((verb, action)) = classified else {
                // No verb anywhere: not a command. Search and screenshot
                // requests are still honored; everything else is casual
                // speech and stays unanswered on purpose.
                self.handle_non_command(&sub);
                continue;
            };
            carried_verb = Some((verb.clone(), action));

            match self.try_dispatch_target(&sub, action) {
                SubOutcome::Handled => {}
                SubOutcome::NoTarget => {
                    tracing::debug!(%sub, %verb, "no target recognized, remembering verb");
                    self.ctx.pending = Some(PendingAction {
                        verb: verb.clone(),
                        action,
                        original_text: sub.clone(),
                        expires_at: now + self.config.disambiguation_timeout(),
                    });
                    any_unresolved = true;
                }
            }
        }

        // One "what?" per utterance, however many sub-commands missed.
        if any_unresolved {
            self.notifier.on_cue(CueId::What);
        }
    }

    fn handle_non_command(&mut self, sub: &str) {
        if let Some(query) = builtin::search_query(sub) {
            tracing::info!(%query, "web search");
            let url = format!(
                "https://www.google.com/search?q={}",
                urlencoding::encode(&query)
            );
            match self.proc.open_uri(&url) {
                Ok(()) => self.notifier.on_cue(CueId::Search),
                Err(e) => self.report(&e),
            }
        } else if builtin::is_screenshot(sub) {
            tracing::info!("screenshot requested");
            self.hooks.screenshot();
        }
        // Anything else is conversation that happened to contain the
        // assistant's name; stay quiet.
    }

    /// Built-ins first, then the user table as an application command,
    /// then the user table as a folder command.
    fn try_dispatch_target(&mut self, text: &str, action: Action) -> SubOutcome {
        if let Some(target) = builtin::find_target(text) {
            self.execute_builtin(target, action);
            return SubOutcome::Handled;
        }

        let table = self.table.current();
        if let Some((keyword, target)) = table.match_app(text) {
            let (keyword, target) = (keyword.to_string(), target.clone());
            self.execute_target(keyword, &target, action);
            return SubOutcome::Handled;
        }
        if let Some((keyword, target)) = table.match_folder(text) {
            let (keyword, target) = (keyword.to_string(), target.clone());
            self.execute_target(keyword, &target, action);
            return SubOutcome::Handled;
        }

        SubOutcome::NoTarget
    }

    fn execute_target(&mut self, keyword: String, target: &CommandTarget, action: Action) {
        let result = match action {
            Action::Open => self.resolver.open(&keyword, target),
            Action::Close => self.resolver.close(&keyword, target),
        };
        match result {
            Ok(()) => self.notifier.on_cue(match action {
                Action::Open => CueId::Start,
                Action::Close => CueId::Close,
            }),
            Err(e) => self.report(&e),
        }
    }

    fn execute_builtin(&mut self, target: BuiltinTarget, action: Action) {
        if target.is_panel() {
            self.hooks.toggle_widgets(action == Action::Open);
            self.notifier.on_cue(match action {
                Action::Open => CueId::Start,
                Action::Close => CueId::Close,
            });
            return;
        }

        let result = match action {
            Action::Open => {
                if let Some(cmdline) = target.open_utility() {
                    self.proc.spawn_utility(cmdline)
                } else if let Some(env) = target.open_folder_env() {
                    match std::env::var(env) {
                        Ok(dir) => self.proc.open_folder(Path::new(&dir)),
                        Err(_) => Err(Error::Process(format!("{env} is not set"))),
                    }
                } else {
                    Err(Error::CommandNotFound(format!("{target:?}")))
                }
            }
            Action::Close => {
                if let Some(name) = target.close_process() {
                    self.proc.kill_by_name(name)
                } else if let Some(fragment) = target.close_window_fragment() {
                    self.close_window_containing(fragment)
                } else {
                    Err(Error::CommandNotFound(format!("{target:?}")))
                }
            }
        };

        match result {
            Ok(()) => self.notifier.on_cue(match action {
                Action::Open => CueId::Start,
                Action::Close => CueId::Close,
            }),
            Err(e) => self.report(&e),
        }
    }

    fn close_window_containing(&self, fragment: &str) -> Result<()> {
        let titles = self.proc.window_titles()?;
        match titles
            .iter()
            .find(|title| title.to_lowercase().contains(fragment))
        {
            Some(title) => self.proc.close_window(title),
            None => Err(Error::CommandNotFound(format!("open window for '{fragment}'"))),
        }
    }

    /// Convert a recoverable failure into its cue and keep going. An
    /// unconfirmed launch gets its own reaction so the user knows the
    /// command is still usable.
    fn report(&self, error: &Error) {
        self.notifier.on_error(error);
        let cue = match error {
            Error::DetectionFailed(_) => CueId::StillLoading,
            _ => CueId::Error,
        };
        self.notifier.on_cue(cue);
    }

    /// Read the live table (tests and embedding shells use this to see
    /// what the dispatcher currently matches against).
    pub fn current_table(&self) -> Arc<CommandTable> {
        self.table.current()
    }
}

/// Split an utterance into sub-commands on the conjunction list,
/// defaulting to the whole utterance when none is present.
pub fn split_subcommands(text: &str, conjunctions: &[String]) -> Vec<String> {
    let mut parts = vec![text.to_string()];
    for conj in conjunctions {
        parts = parts
            .iter()
            .flat_map(|part| part.split(conj.as_str()).map(str::to_string))
            .collect();
    }
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// First open-class verb contained in `text`, else first close-class
/// verb, else nothing.
pub fn classify_action(
    text: &str,
    open_verbs: &[String],
    close_verbs: &[String],
) -> Option<(String, Action)> {
    if let Some(verb) = open_verbs.iter().find(|v| text.contains(v.as_str())) {
        return Some((verb.clone(), Action::Open));
    }
    if let Some(verb) = close_verbs.iter().find(|v| text.contains(v.as_str())) {
        return Some((verb.clone(), Action::Close));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AssistantConfig {
        AssistantConfig::default()
    }

    #[test]
    fn splitting_on_conjunctions() {
        let cfg = config();
        assert_eq!(
            split_subcommands("джо открой браузер и закрой паинт", &cfg.conjunctions),
            vec!["джо открой браузер", "закрой паинт"]
        );
        assert_eq!(
            split_subcommands("открой браузер потом калькулятор ещё паинт", &cfg.conjunctions),
            vec!["открой браузер", "калькулятор", "паинт"]
        );
    }

    #[test]
    fn no_conjunction_keeps_the_whole_utterance() {
        let cfg = config();
        assert_eq!(
            split_subcommands("джо открой браузер", &cfg.conjunctions),
            vec!["джо открой браузер"]
        );
    }

    #[test]
    fn verbs_classify_open_and_close() {
        let cfg = config();
        let (verb, action) =
            classify_action("открой браузер", &cfg.open_verbs, &cfg.close_verbs).unwrap();
        assert_eq!(verb, "открой");
        assert_eq!(action, Action::Open);

        let (verb, action) =
            classify_action("закрой паинт", &cfg.open_verbs, &cfg.close_verbs).unwrap();
        assert_eq!(verb, "закрой");
        assert_eq!(action, Action::Close);

        assert!(classify_action("какая погода", &cfg.open_verbs, &cfg.close_verbs).is_none());
    }
}
