//! Ozone Shell (headless)
//!
//! Line-oriented front end over `ozone-core`: mounts the core panels, keeps the
//! connection and affect pollers running, drives pipeline panels from the
//! backend task list and sends everything that is not a slash command as a prompt.
//! Typed text and final voice transcriptions share the prompt field; an empty
//! line sends the field as it stands.
//! Logs go to stderr so stdout stays readable.

mod commands;
mod driver;
mod panels;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use ozone_core::{
    ConversationOrchestrator, ConversationState, HttpBackend, InjectOptions, InjectOutcome, PanelView, RejectReason, Shell,
    ShellConfig, SubmitOutcome, UninjectOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Command;
use crate::driver::TaskDriver;

/// How often the task list is synced into panels.
const DEFAULT_TASK_SYNC_SECS: u64 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[ozone-shell] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ShellConfig::load().context("load shell configuration")?;
    let task_sync = std::env::var("OZONE_TASK_SYNC_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TASK_SYNC_SECS)
        .max(1);

    let backend = Arc::new(HttpBackend::with_timeout(
        config.backend_url.clone(),
        config.request_timeout(),
    ));
    tracing::info!(
        backend_url = %backend.base_url(),
        task_sync_secs = task_sync,
        affect = config.affect_enabled,
        "Ozone shell starting"
    );

    let shell = Shell::builder(config, backend.clone())
        .with_orchestrator(backend)
        .with_modules(panels::builtin_modules())
        .build()
        .context("assemble shell")?;
    shell.start();

    let mut driver = TaskDriver::new(shell.backend(), shell.lifecycle().clone());
    let mut interval = tokio::time::interval(Duration::from_secs(task_sync));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut transcripts = shell.voice().subscribe_transcriptions();

    println!("{} ready. /help lists commands.", shell.config().app_name);
    if let Some(view) = shell.injector().read().await.render_active() {
        print_view(&view);
    }

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if shell.connection().is_connected() {
                    if let Err(e) = driver.sync().await {
                        tracing::warn!(error = %e, "task sync failed");
                    }
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match commands::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => {
                            if let Err(e) = run(&shell, command).await {
                                println!("error: {:#}", e);
                            }
                        }
                        Err(hint) => println!("{}", hint),
                    },
                    Ok(None) => {
                        tracing::info!("stdin closed; shutting down shell");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; shutting down shell");
                        break;
                    }
                }
            }
            Ok(()) = transcripts.changed() => {
                let heard = transcripts.borrow_and_update().clone();
                if let Some(text) = heard {
                    println!("🎤 {}", text);
                    println!("prompt: {} (empty line or /send to submit)", shell.conversation().prompt().get());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down shell");
                break;
            }
        }
    }

    shell.shutdown();
    Ok(())
}

async fn run(shell: &Shell, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
        Command::Panels => {
            let injector = shell.injector();
            let injector = injector.read().await;
            for panel in injector.panels() {
                let marker = if panel.id == injector.active_panel_id() { "*" } else { " " };
                let badge = panel.badge.map(|b| format!(" ({})", b)).unwrap_or_default();
                let core = if panel.is_core { " [core]" } else { "" };
                println!("{} {} {} {}{}{}", marker, panel.icon, panel.id, panel.label, badge, core);
            }
        }
        Command::Show(panel_id) => {
            let injector = shell.injector();
            let mut injector = injector.write().await;
            if !injector.set_active(&panel_id) {
                bail!("no panel named {}", panel_id);
            }
            if let Some(view) = injector.render_active() {
                print_view(&view);
            }
        }
        Command::Inject { pipeline_id, data } => {
            let mut opts = InjectOptions::active();
            opts.initial_data = data;
            let injector = shell.injector();
            let mut injector = injector.write().await;
            match injector.inject(pipeline_id, opts) {
                InjectOutcome::Failed => bail!("pipeline {} has no loadable UI", pipeline_id),
                InjectOutcome::Injected(id) | InjectOutcome::AlreadyMounted(id) => {
                    if let Some(view) = injector.render(&id) {
                        print_view(&view);
                    }
                }
            }
        }
        Command::Uninject(panel_id) => {
            let outcome = shell.injector().write().await.uninject(&panel_id);
            match outcome {
                UninjectOutcome::Removed => println!("removed {}", panel_id),
                UninjectOutcome::RejectedCore => bail!("{} is a core panel and stays mounted", panel_id),
                UninjectOutcome::NotFound => bail!("no panel named {}", panel_id),
            }
        }
        Command::Tasks => {
            let tasks = shell.backend().task_list().await?;
            if tasks.is_empty() {
                println!("no tasks");
            }
            for task in tasks {
                println!("{}  pipeline {}  {:?}", task.id, task.pipeline_id, task.status);
            }
        }
        Command::Cancel(task_id) => {
            shell.backend().task_cancel(&task_id).await?;
            println!("cancel requested for {}", task_id);
        }
        Command::Voice => {
            let state = shell.voice().toggle_voice().await?;
            println!("voice: {:?}", state);
        }
        Command::Affect(enabled) => {
            shell.set_affect_enabled(enabled);
            println!("affect {}", if enabled { "on" } else { "off" });
        }
        Command::Status => {
            let stats = shell.connection().stats();
            println!(
                "backend: {} (latency {:?} ms, {} active tasks)",
                if stats.connected { "connected" } else { "disconnected" },
                stats.latency_ms,
                stats.active_tasks
            );
            match shell.affect().affect() {
                Some(a) => println!(
                    "affect: {} {:.2} (valence {:.2}, arousal {:.2})",
                    a.primary_emotion, a.intensity, a.valence, a.arousal
                ),
                None => println!("affect: unknown"),
            }
            if let Some(r) = shell.affect().reflection().filter(|r| r.is_active) {
                println!("reflecting: {} ({} questions)", r.current_question, r.questions_asked);
            }
        }
        Command::Config => {
            let cfg = shell.backend().config_get().await?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Command::ShowPrompt => {
            let text = shell.conversation().prompt().get();
            if text.is_empty() {
                println!("prompt: (empty)");
            } else {
                println!("prompt: {}", text);
            }
        }
        Command::Prompt(text) => {
            let conversation = shell.conversation();
            conversation.prompt().append(&text);
            if conversation.state() == ConversationState::Submitting {
                println!("(request in flight; text kept in the prompt, send it with an empty line)");
            } else {
                send(conversation);
            }
        }
        Command::Send => send(shell.conversation()),
    }
    Ok(())
}

/// Submit whatever the prompt field holds, reporting the answer when it lands.
fn send(conversation: Arc<ConversationOrchestrator>) {
    tokio::spawn(async move {
        let outcome = conversation.handle_submit().await;
        report(&conversation, outcome).await;
    });
}

async fn report(conversation: &ConversationOrchestrator, outcome: SubmitOutcome) {
    let assistant_turn = match outcome {
        SubmitOutcome::Rejected(RejectReason::EmptyInput) => return,
        SubmitOutcome::Rejected(RejectReason::Disconnected) => {
            println!("(backend not connected; prompt not sent)");
            return;
        }
        SubmitOutcome::Answered { assistant_turn, .. } | SubmitOutcome::Failed { assistant_turn, .. } => {
            assistant_turn
        }
    };
    let transcript = conversation.transcript();
    let transcript = transcript.read().await;
    if let Some(turn) = transcript.get(assistant_turn) {
        match &turn.emotion {
            Some(emotion) => println!("ozone [{}]> {}", emotion, turn.content),
            None => println!("ozone> {}", turn.content),
        }
    }
}

fn print_view(view: &PanelView) {
    println!("── {} ──", view.title);
    for line in &view.lines {
        println!("  {}", line);
    }
}
