//! End-to-end submissions through an assembled shell.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{build_shell, config, init_tracing, modules, tick, ScriptedBackend};
use ozone_core::{
    well_known, AudioPlayer, BufferedAudio, ConversationState, RejectReason, Role, Shell, ShellConfig, SubmitOutcome,
    SubmitPath, VoiceResult,
};

fn affect_config() -> ShellConfig {
    ShellConfig {
        affect_enabled: true,
        ..ShellConfig::default()
    }
}

struct SlowPlayer(Duration);

#[async_trait]
impl AudioPlayer for SlowPlayer {
    async fn play(&self, _audio: Vec<u8>) -> VoiceResult<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_primary_hello_hi_reacts_once() {
    init_tracing();
    let backend = Arc::new(ScriptedBackend::default());
    let shell = build_shell(&backend, affect_config(), &[], true);
    shell.connection().set_connected(true);

    let conversation = shell.conversation();
    assert_eq!(conversation.path(), SubmitPath::Primary);
    conversation.prompt().set("hello");
    assert!(matches!(conversation.handle_submit().await, SubmitOutcome::Answered { .. }));

    let turns = conversation.turns().await;
    let pairs: Vec<(Role, &str)> = turns.iter().map(|t| (t.role, t.content.as_str())).collect();
    assert_eq!(pairs, vec![(Role::User, "hello"), (Role::Assistant, "hi")]);
    assert_eq!(conversation.prompt().get(), "");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.count(well_known::EMOTIONAL_STATE, "GetCurrent"), 1);
    assert_eq!(backend.count(well_known::EMOTIONAL_STATE, "ProcessTrigger"), 1);
    assert_eq!(backend.count(well_known::PROMPT, "prompt"), 0);
    assert!(shell.affect().affect().is_some());

    let sent = backend.orchestrations();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].prompt, "hello");
    assert_eq!(sent[0].user_id, "local-user");
    assert!(sent[0].consciousness_enabled);
    assert_eq!(sent[0].token_budget, ShellConfig::default().token_budget);
}

#[tokio::test]
async fn test_fallback_path_when_primary_disabled() {
    let backend = Arc::new(ScriptedBackend::default());
    let shell = build_shell(
        &backend,
        ShellConfig {
            primary_orchestration: false,
            ..config()
        },
        &[],
        true,
    );
    shell.connection().set_connected(true);

    let conversation = shell.conversation();
    assert_eq!(conversation.path(), SubmitPath::Fallback);
    assert!(matches!(conversation.submit("hello").await, SubmitOutcome::Answered { .. }));

    let contents: Vec<String> = conversation.turns().await.into_iter().map(|t| t.content).collect();
    assert_eq!(contents, vec!["hello", "fallback: hello"]);
    assert!(backend.orchestrations().is_empty());
    assert_eq!(backend.count(well_known::PROMPT, "prompt"), 1);
}

#[tokio::test]
async fn test_submit_before_first_connection_check_is_rejected() {
    let backend = Arc::new(ScriptedBackend::default());
    let shell = build_shell(&backend, config(), &[], true);

    let conversation = shell.conversation();
    conversation.prompt().set("hello");
    assert_eq!(
        conversation.handle_submit().await,
        SubmitOutcome::Rejected(RejectReason::Disconnected)
    );
    assert!(conversation.turns().await.is_empty());
    assert!(backend.orchestrations().is_empty());
}

#[tokio::test]
async fn test_affect_off_skips_affect_and_speech() {
    let backend = Arc::new(ScriptedBackend {
        speech_output_enabled: true,
        speak_audio: Some("AAAA".into()),
        ..Default::default()
    });
    let shell = build_shell(&backend, config(), &[], true);
    shell.connection().set_connected(true);

    assert!(matches!(shell.conversation().submit("hello").await, SubmitOutcome::Answered { .. }));
    tokio::time::sleep(tick()).await;

    assert!(backend.actions_for(well_known::EMOTIONAL_STATE).is_empty());
    assert!(backend.actions_for(well_known::VOICE).is_empty());
    assert!(!backend.orchestrations()[0].consciousness_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_speaking_state_lasts_for_playback() {
    let backend = Arc::new(ScriptedBackend {
        speech_output_enabled: true,
        speak_audio: Some("AAAA".into()),
        ..Default::default()
    });
    let shell = Shell::builder(affect_config(), backend.clone())
        .with_orchestrator(backend.clone())
        .with_modules(modules(&[]))
        .with_player(Arc::new(SlowPlayer(Duration::from_secs(1))))
        .build()
        .expect("shell builds");
    shell.connection().set_connected(true);

    let conversation = shell.conversation();
    assert!(matches!(conversation.submit("hello").await, SubmitOutcome::Answered { .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(conversation.state(), ConversationState::Speaking);
    assert_eq!(
        backend.actions_for(well_known::VOICE),
        vec!["GetStatus".to_string(), "Speak".to_string()]
    );
    assert_eq!(backend.count(well_known::VOICE_IDENTITY, "GetVoice"), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[tokio::test]
async fn test_unsuccessful_reply_is_concerned_turn() {
    let backend = Arc::new(ScriptedBackend::default());
    {
        let mut reply = backend.reply.lock().unwrap();
        reply.success = false;
        reply.error = Some("budget exceeded".into());
    }
    let shell = build_shell(&backend, affect_config(), &[], true);
    shell.connection().set_connected(true);

    let conversation = shell.conversation();
    conversation.prompt().set("hello");
    assert!(matches!(conversation.handle_submit().await, SubmitOutcome::Failed { .. }));

    let turns = conversation.turns().await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].emotion.as_deref(), Some("concerned"));
    assert_eq!(conversation.prompt().get(), "hello");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.count(well_known::EMOTIONAL_STATE, "ProcessTrigger"), 1);
    assert_eq!(backend.count(well_known::EMOTIONAL_STATE, "GetCurrent"), 0);
    assert!(backend.actions_for(well_known::VOICE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dictated_prompt_is_submitted_from_the_field() {
    let backend = Arc::new(ScriptedBackend::default());
    *backend.transcript.lock().unwrap() = Some("what is on my calendar".into());
    let audio = BufferedAudio::new();
    let shell = Shell::builder(config(), backend.clone())
        .with_orchestrator(backend.clone())
        .with_modules(modules(&[]))
        .with_audio(Arc::new(audio.clone()))
        .build()
        .expect("shell builds");
    shell.connection().set_connected(true);

    let voice = shell.voice();
    tokio_test::assert_ok!(voice.toggle_voice().await);
    audio.push(b"pcm");
    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio_test::assert_ok!(voice.toggle_voice().await);

    let conversation = shell.conversation();
    assert_eq!(conversation.prompt().get(), "what is on my calendar");
    assert!(matches!(conversation.handle_submit().await, SubmitOutcome::Answered { .. }));
    assert_eq!(backend.orchestrations()[0].prompt, "what is on my calendar");
    assert_eq!(conversation.prompt().get(), "");
}
