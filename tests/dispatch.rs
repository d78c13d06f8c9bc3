//! Dispatcher state-machine tests
//!
//! Everything below drives the dispatcher through canned utterances
//! with the OS boundaries mocked out, so no audio hardware, whisper
//! model or real process list is needed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use golos::config::AssistantConfig;
use golos::dispatch::CommandDispatcher;
use golos::error::{Error, Result};
use golos::feedback::{CueId, DesktopHooks, Notifier, Severity};
use golos::launcher::{Action, Resolver};
use golos::media::{MediaAction, MediaKeys};
use golos::proc::ProcessControl;
use golos::swear::SwearFilter;
use golos::table::{CommandTable, CommandTableHandle, CommandTarget};

#[derive(Default)]
struct MockResolver {
    calls: Arc<Mutex<Vec<(String, CommandTarget, Action)>>>,
    fail_with_detection: AtomicBool,
}

impl Resolver for MockResolver {
    fn open(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((keyword.to_string(), target.clone(), Action::Open));
        if self.fail_with_detection.load(Ordering::SeqCst) {
            return Err(Error::DetectionFailed(keyword.to_string()));
        }
        Ok(())
    }

    fn close(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((keyword.to_string(), target.clone(), Action::Close));
        Ok(())
    }
}

#[derive(Default)]
struct MockProc {
    kills: Mutex<Vec<String>>,
    uris: Mutex<Vec<String>>,
    utilities: Mutex<Vec<String>>,
    shutdowns: Mutex<u32>,
    restarts: Mutex<u32>,
}

impl ProcessControl for MockProc {
    fn process_names(&self) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }

    fn kill_by_name(&self, name: &str) -> Result<()> {
        self.kills.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn launch(&self, _exe: &Path, _args: &[String], _workdir: &Path) -> Result<()> {
        Ok(())
    }

    fn open_uri(&self, uri: &str) -> Result<()> {
        self.uris.lock().unwrap().push(uri.to_string());
        Ok(())
    }

    fn open_folder(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn window_titles(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn close_window(&self, _title: &str) -> Result<()> {
        Ok(())
    }

    fn spawn_utility(&self, cmdline: &str) -> Result<()> {
        self.utilities.lock().unwrap().push(cmdline.to_string());
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        *self.shutdowns.lock().unwrap() += 1;
        Ok(())
    }

    fn restart(&self) -> Result<()> {
        *self.restarts.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct MockMedia {
    taps: Mutex<Vec<MediaAction>>,
}

impl MediaKeys for MockMedia {
    fn tap(&self, action: MediaAction) -> Result<()> {
        self.taps.lock().unwrap().push(action);
        Ok(())
    }
}

struct RecordingNotifier {
    cues: Mutex<Vec<CueId>>,
}

impl Notifier for RecordingNotifier {
    fn on_cue(&self, cue: CueId) {
        self.cues.lock().unwrap().push(cue);
    }

    fn on_log(&self, _severity: Severity, _message: &str) {}

    fn on_error(&self, _error: &Error) {}
}

struct NoHooks;
impl DesktopHooks for NoHooks {}

struct Harness {
    dispatcher: CommandDispatcher,
    resolver_calls: Arc<Mutex<Vec<(String, CommandTarget, Action)>>>,
    resolver_fail: Arc<MockResolver>,
    cues: Arc<RecordingNotifier>,
    proc: Arc<MockProc>,
    media: Arc<MockMedia>,
    _tmp: tempfile::TempDir,
}

impl Harness {
    fn new(mut mutate: impl FnMut(&mut AssistantConfig)) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AssistantConfig::default();
        mutate(&mut config);
        let config = Arc::new(config);

        let (table, conflicts) = CommandTable::from_json(
            r#"{"браузер": "C:/shortcuts/browser.lnk",
                "раст": "C:/shortcuts/Rust.url",
                "загрузки": "C:/Users/me/Downloads"}"#,
        )
        .unwrap();
        assert!(conflicts.is_empty());

        let resolver = Arc::new(MockResolver::default());
        let resolver_calls = Arc::clone(&resolver.calls);
        let notifier = Arc::new(RecordingNotifier {
            cues: Mutex::new(Vec::new()),
        });
        let proc = Arc::new(MockProc::default());
        let media = Arc::new(MockMedia::default());

        struct SharedResolver(Arc<MockResolver>);
        impl Resolver for SharedResolver {
            fn open(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
                self.0.open(keyword, target)
            }
            fn close(&self, keyword: &str, target: &CommandTarget) -> Result<()> {
                self.0.close(keyword, target)
            }
        }
        struct SharedMedia(Arc<MockMedia>);
        impl MediaKeys for SharedMedia {
            fn tap(&self, action: MediaAction) -> Result<()> {
                self.0.tap(action)
            }
        }

        let dispatcher = CommandDispatcher::new(
            Arc::clone(&config),
            CommandTableHandle::fixed(table),
            Box::new(SharedResolver(Arc::clone(&resolver))),
            Arc::clone(&proc) as Arc<dyn ProcessControl>,
            Box::new(SharedMedia(Arc::clone(&media))),
            Box::new(NoHooks),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            SwearFilter::new(
                vec!["блин".to_string()],
                tmp.path().join("counters.json"),
            ),
        );

        Self {
            dispatcher,
            resolver_calls,
            resolver_fail: resolver,
            cues: notifier,
            proc,
            media,
            _tmp: tmp,
        }
    }

    fn cues(&self) -> Vec<CueId> {
        self.cues.cues.lock().unwrap().clone()
    }

    fn resolver_calls(&self) -> Vec<(String, CommandTarget, Action)> {
        self.resolver_calls.lock().unwrap().clone()
    }
}

#[test]
fn wake_plus_verb_plus_keyword_resolves_exactly_once() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо открой браузер", Instant::now());

    let calls = h.resolver_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "браузер");
    assert_eq!(
        calls[0].1,
        CommandTarget::ShortcutFile(PathBuf::from("C:/shortcuts/browser.lnk"))
    );
    assert_eq!(calls[0].2, Action::Open);

    let cues = h.cues();
    assert!(cues.contains(&CueId::Start));
    assert!(!cues.contains(&CueId::NotUnderstood));
    assert!(!cues.contains(&CueId::What));
}

#[test]
fn every_table_keyword_resolves_with_open() {
    for keyword in ["браузер", "раст", "загрузки"] {
        let mut h = Harness::new(|_| {});
        h.dispatcher
            .handle_utterance(&format!("джо открой {keyword}"), Instant::now());

        let calls = h.resolver_calls();
        assert_eq!(calls.len(), 1, "{keyword}");
        assert_eq!(calls[0].0, keyword);
        assert_eq!(calls[0].2, Action::Open);
        let cues = h.cues();
        assert!(!cues.contains(&CueId::What), "{keyword}");
        assert!(!cues.contains(&CueId::NotUnderstood), "{keyword}");
    }
}

#[test]
fn compound_utterance_splits_into_open_and_close() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо открой браузер и закрой паинт", Instant::now());

    // The user-table half went through the resolver...
    let calls = h.resolver_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "браузер");
    assert_eq!(calls[0].2, Action::Open);

    // ...and the built-in half killed the paint process directly.
    assert_eq!(h.proc.kills.lock().unwrap().as_slice(), ["mspaint.exe"]);

    let cues = h.cues();
    assert!(cues.contains(&CueId::Start));
    assert!(cues.contains(&CueId::Close));
    assert!(!cues.contains(&CueId::What));
}

#[test]
fn bare_wake_name_acknowledges_once_and_launches_nothing() {
    let mut h = Harness::new(|_| {});
    h.dispatcher.handle_utterance("джо", Instant::now());

    assert_eq!(h.cues(), vec![CueId::Acknowledge]);
    assert!(h.resolver_calls().is_empty());
    assert!(h.dispatcher.name_mentioned());
}

#[test]
fn mention_window_allows_a_nameless_command() {
    let mut h = Harness::new(|_| {});
    let t0 = Instant::now();
    h.dispatcher.handle_utterance("джо", t0);
    h.dispatcher
        .handle_utterance("открой браузер", t0 + Duration::from_secs(5));

    assert_eq!(h.resolver_calls().len(), 1);
}

#[test]
fn mention_flag_expires_after_thirty_seconds() {
    let mut h = Harness::new(|_| {});
    let t0 = Instant::now();
    h.dispatcher.handle_utterance("джо", t0);
    h.dispatcher
        .handle_utterance("открой браузер", t0 + Duration::from_secs(31));

    assert!(h.resolver_calls().is_empty());
    assert!(!h.dispatcher.name_mentioned());
}

#[test]
fn unknown_target_enters_disambiguation_with_one_what_cue() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо открой гараж и открой сарай", Instant::now());

    assert!(h.dispatcher.awaiting_disambiguation());
    let what_count = h.cues().iter().filter(|c| **c == CueId::What).count();
    assert_eq!(what_count, 1);
}

#[test]
fn disambiguation_follow_up_supplies_the_target() {
    let mut h = Harness::new(|_| {});
    let t0 = Instant::now();
    h.dispatcher.handle_utterance("джо открой гараж", t0);
    assert!(h.dispatcher.awaiting_disambiguation());

    h.dispatcher
        .handle_utterance("браузер", t0 + Duration::from_secs(3));

    let calls = h.resolver_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "браузер");
    assert_eq!(calls[0].2, Action::Open);
    assert!(!h.dispatcher.awaiting_disambiguation());
}

#[test]
fn disambiguation_context_expires_after_seven_seconds() {
    let mut h = Harness::new(|_| {});
    let t0 = Instant::now();
    h.dispatcher.handle_utterance("джо открой гараж", t0);
    assert!(h.dispatcher.awaiting_disambiguation());

    // Past the window the bare keyword is just conversation.
    h.dispatcher
        .handle_utterance("браузер", t0 + Duration::from_secs(8));

    assert!(h.resolver_calls().is_empty());
    assert!(!h.dispatcher.awaiting_disambiguation());
}

#[test]
fn failed_follow_up_keeps_waiting_without_extending() {
    let mut h = Harness::new(|_| {});
    let t0 = Instant::now();
    h.dispatcher.handle_utterance("джо открой гараж", t0);
    h.dispatcher
        .handle_utterance("ерунда какая-то", t0 + Duration::from_secs(3));

    assert!(h.cues().contains(&CueId::NotUnderstood));
    assert!(h.dispatcher.awaiting_disambiguation());

    // The deadline still counts from the original utterance.
    h.dispatcher
        .handle_utterance("браузер", t0 + Duration::from_secs(8));
    assert!(h.resolver_calls().is_empty());
}

#[test]
fn censorship_swallows_the_whole_utterance() {
    let mut h = Harness::new(|c| c.censorship = true);
    h.dispatcher
        .handle_utterance("джо блин открой браузер", Instant::now());

    assert_eq!(h.cues(), vec![CueId::Censored]);
    assert!(h.resolver_calls().is_empty());
}

#[test]
fn profanity_is_counted_but_not_blocking_without_censorship() {
    let mut h = Harness::new(|c| c.censorship = false);
    h.dispatcher
        .handle_utterance("джо блин открой браузер", Instant::now());

    assert_eq!(h.resolver_calls().len(), 1);
    assert!(!h.cues().contains(&CueId::Censored));
}

#[test]
fn media_commands_work_without_the_wake_name() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("поставь на паузу", Instant::now());

    assert_eq!(
        h.media.taps.lock().unwrap().as_slice(),
        [MediaAction::PlayPause]
    );
    assert!(h.resolver_calls().is_empty());
}

#[test]
fn unconfirmed_launch_gets_the_loading_cue_not_the_error_cue() {
    let mut h = Harness::new(|_| {});
    h.resolver_fail
        .fail_with_detection
        .store(true, Ordering::SeqCst);
    h.dispatcher
        .handle_utterance("джо открой раст", Instant::now());

    let cues = h.cues();
    assert!(cues.contains(&CueId::StillLoading));
    assert!(!cues.contains(&CueId::Error));
}

#[test]
fn casual_speech_with_the_name_stays_silent() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо ты как вообще", Instant::now());

    assert!(h.cues().is_empty());
    assert!(h.resolver_calls().is_empty());
    assert!(!h.dispatcher.awaiting_disambiguation());
}

#[test]
fn search_request_opens_an_encoded_query() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо загугли погода москва", Instant::now());

    let uris = h.proc.uris.lock().unwrap();
    assert_eq!(uris.len(), 1);
    assert!(uris[0].starts_with("https://www.google.com/search?q="));
    assert!(uris[0].contains("%20"));
    assert!(h.cues().contains(&CueId::Search));
}

#[test]
fn voice_shutdown_is_unconditional() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо выключи компьютер", Instant::now());

    assert_eq!(*h.proc.shutdowns.lock().unwrap(), 1);
    assert!(h.cues().contains(&CueId::Shutdown));
    assert!(h.resolver_calls().is_empty());
}

#[test]
fn verb_propagates_across_conjunctions() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо открой браузер и калькулятор", Instant::now());

    // "калькулятор" has no verb of its own; the carried "открой"
    // makes it a built-in open.
    assert_eq!(h.resolver_calls().len(), 1);
    assert_eq!(h.proc.utilities.lock().unwrap().as_slice(), ["calc"]);
}

#[test]
fn folder_command_resolves_as_folder() {
    let mut h = Harness::new(|_| {});
    h.dispatcher
        .handle_utterance("джо открой загрузки", Instant::now());

    let calls = h.resolver_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].1,
        CommandTarget::FolderPath(PathBuf::from("C:/Users/me/Downloads"))
    );
}

#[test]
fn stop_flag_ends_the_loop() {
    let h = Harness::new(|_| {});
    let mut dispatcher = h.dispatcher;
    let (tx, rx) = std::sync::mpsc::channel::<String>();
    let running = Arc::new(AtomicBool::new(true));

    let loop_running = Arc::clone(&running);
    let handle = std::thread::spawn(move || {
        dispatcher.run(&rx, &loop_running);
    });

    tx.send("джо".to_string()).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    running.store(false, Ordering::SeqCst);

    let deadline = Instant::now() + Duration::from_secs(3);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(handle.is_finished(), "dispatcher loop failed to stop");
    handle.join().unwrap();
}
