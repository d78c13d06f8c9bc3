use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use golos::config::AssistantConfig;
use golos::dispatch::CommandDispatcher;
use golos::feedback::{ConsoleNotifier, Notifier, NullHooks};
use golos::launcher::{LaunchResolver, SettleDelays};
use golos::media::EnigoMediaKeys;
use golos::model;
use golos::pipeline::SpeechRecognitionPipeline;
use golos::proc::{ProcessControl, SystemProcessControl};
use golos::registry::ProcessRegistry;
use golos::shortcut::FileShortcutReader;
use golos::stt::DualRecognizer;
use golos::swear::SwearFilter;
use golos::table::CommandTableHandle;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, config_path) = AssistantConfig::load();
    let config = Arc::new(config);
    tracing::info!(
        names = ?config.wake_names(),
        model = %config.model,
        language = %config.language,
        "golos starting"
    );
    if let Some(path) = config_path {
        tracing::info!(path = %path.display(), "config file");
    }

    // Both language models must be present before listening starts.
    let primary_model = model::ensure_model(
        &config.primary_model_filename(),
        &config.model_url(&config.primary_model_filename()),
    )
    .context("primary model")?;
    let english_model = model::ensure_model(
        &config.english_model_filename(),
        &config.model_url(&config.english_model_filename()),
    )
    .context("english model")?;

    tracing::info!(
        primary = %primary_model.display(),
        english = %english_model.display(),
        "loading whisper models"
    );
    let recognizers = Arc::new(
        DualRecognizer::new(
            &primary_model,
            &english_model,
            &config.language,
            config.threads,
        )
        .context("loading recognizers")?,
    );

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    let table = CommandTableHandle::watch(&config.commands_path(), Arc::clone(&notifier))
        .context("command table")?;
    tracing::info!(commands = table.current().len(), "command table loaded");

    let proc = Arc::new(SystemProcessControl);
    let registry = ProcessRegistry::new(config.registry_path());
    let resolver = LaunchResolver::new(
        Arc::clone(&proc) as Arc<dyn ProcessControl>,
        Box::new(FileShortcutReader),
        registry,
        PathBuf::from(shellexpand::tilde(&config.steam_path).into_owned()),
        SettleDelays::from_config(&config),
        Arc::clone(&notifier),
    );
    let swear = SwearFilter::new(config.profanity.clone(), config.counters_path());

    let mut dispatcher = CommandDispatcher::new(
        Arc::clone(&config),
        table,
        Box::new(resolver),
        Arc::clone(&proc) as Arc<dyn ProcessControl>,
        Box::new(EnigoMediaKeys),
        Box::new(NullHooks),
        Arc::clone(&notifier),
        swear,
    );

    // A start with no usable input device at all lands here; the
    // assistant reports the degraded state and waits for a microphone
    // instead of dying. Once up, the pipeline self-heals on its own.
    let (pipeline, utterances) = loop {
        match SpeechRecognitionPipeline::start(
            Arc::clone(&config),
            Arc::clone(&recognizers),
            Arc::clone(&notifier),
            config.device_index,
        ) {
            Ok(started) => break started,
            Err(e) => {
                notifier.on_error(&e);
                tracing::warn!("no microphone; retrying in 10s");
                std::thread::sleep(Duration::from_secs(10));
            }
        }
    };

    tracing::info!("golos is listening");

    // The dispatcher owns the main thread; it returns when the
    // utterance channel dies. Killing the process is the stop switch
    // for interactive use, and embedding shells stop via the flag.
    let running = AtomicBool::new(true);
    dispatcher.run(&utterances, &running);

    tracing::info!("stopping");
    pipeline.stop();
    Ok(())
}
