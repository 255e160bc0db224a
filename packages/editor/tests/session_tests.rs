use anyhow::Result;
use serde_json::json;
use stagesync_document::{FieldDecl, Path, Value};
use stagesync_editor::{ActiveView, ChangeOutcome, LiveSession, SyncCoordinator, YamlCodec};
use stagesync_preview::{
    ChannelConfig, ChannelState, ManualScheduler, MemoryBus, MessageKind, PreviewChannel,
    PreviewEndpoint,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ORIGIN: &str = "http://localhost:5173";

const SOURCE: &str = "\
name: Memory study
phases:
- id: p1
  stages:
  - id: s1
    type: consent_form
    title: Consent
  - id: s2
    type: questionnaire
    title: Questions
";

struct Fixture {
    session: LiveSession,
    bus: MemoryBus,
    clock: Arc<ManualScheduler>,
    written: Arc<Mutex<Vec<String>>>,
}

fn fixture() -> Result<Fixture> {
    let bus = MemoryBus::new();
    let clock = Arc::new(ManualScheduler::new());

    let mut coordinator = SyncCoordinator::new(Box::new(YamlCodec), clock.clone(), SOURCE);
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();
    coordinator.set_sink(move |text| sink.lock().unwrap().push(text.to_string()));

    let channel = PreviewChannel::new(
        ChannelConfig::new("exp-42", format!("{ORIGIN}/preview/exp-42")),
        Arc::new(bus.clone()),
        clock.clone(),
    )?;

    let mut session = LiveSession::new(coordinator, channel);
    session.open();
    Ok(Fixture {
        session,
        bus,
        clock,
        written,
    })
}

impl Fixture {
    fn connect(&self) -> PreviewEndpoint {
        let endpoint = self.bus.open_peer(ORIGIN);
        self.session.channel().attach_peer(endpoint.peer());
        endpoint.reply(MessageKind::PreviewConnected, "exp-42");
        endpoint
    }

    fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }
}

fn updates(endpoint: &mut PreviewEndpoint) -> Vec<(Vec<String>, bool)> {
    endpoint
        .drain()
        .into_iter()
        .filter_map(|message| match message.kind {
            MessageKind::ConfigUpdate {
                changed_paths,
                is_structural_change,
                ..
            } => Some((changed_paths, is_structural_change)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_connecting_preview_receives_loaded_document() -> Result<()> {
    let f = fixture()?;
    let mut preview = f.connect();

    assert_eq!(f.session.state(), ChannelState::PreviewConnected);
    assert_eq!(updates(&mut preview), vec![(vec!["root".to_string()], false)]);
    Ok(())
}

#[test]
fn test_form_edit_reaches_preview_as_content_change() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    f.session.set_view(ActiveView::item(Path::parse("phases[0].stages")?, 1));
    assert_eq!(
        f.session.handle_change("title", Value::from("Your answers"))?,
        ChangeOutcome::Applied
    );
    assert!(f.written.lock().unwrap()[0].contains("title: Your answers"));

    f.advance_ms(1500);
    assert_eq!(
        updates(&mut preview),
        vec![(vec!["phases[0].stages[1].title".to_string()], false)]
    );
    Ok(())
}

#[test]
fn test_type_change_is_structural() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    f.session
        .handle_change("phases[0].stages[0].type", Value::from("content_display"))?;
    f.advance_ms(1500);
    assert_eq!(
        updates(&mut preview),
        vec![(vec!["phases[0].stages[0].type".to_string()], true)]
    );
    Ok(())
}

#[test]
fn test_echo_of_own_write_is_not_republished() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    f.session.handle_change("name", Value::from("Pilot"))?;
    let echoed = f.written.lock().unwrap()[0].clone();
    assert_eq!(f.session.set_source(echoed), ChangeOutcome::Suppressed);

    f.advance_ms(1500);
    assert_eq!(updates(&mut preview).len(), 1);
    Ok(())
}

#[test]
fn test_external_text_edits_are_debounced_together() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    let first = SOURCE.replace("Consent", "Agreement");
    let second = first.replace("Memory study", "Memory study 2");
    assert!(f.session.set_source(first).is_applied());
    f.advance_ms(400);
    assert!(f.session.set_source(second).is_applied());
    f.advance_ms(1500);

    assert_eq!(
        updates(&mut preview),
        vec![(
            vec!["name".to_string(), "phases[0].stages[0].title".to_string()],
            false
        )]
    );
    Ok(())
}

#[test]
fn test_broken_text_sends_nothing() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    assert_eq!(f.session.set_source("phases: [\n"), ChangeOutcome::Invalid);
    assert_eq!(f.session.current_data(), Value::object());
    f.advance_ms(5000);
    assert!(updates(&mut preview).is_empty());
    Ok(())
}

#[test]
fn test_defaults_for_each_stage() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    let fields = vec![FieldDecl::new("phases").with_items(vec![
        FieldDecl::new("stages").with_items(vec![FieldDecl::new("required").with_default(true)]),
    ])];
    assert!(f.session.apply_defaults(&fields)?.is_applied());
    f.advance_ms(1500);

    let document = f.session.coordinator().document().clone();
    assert_eq!(
        document.get("phases"),
        Some(&Value::from(json!([{
            "id": "p1",
            "stages": [
                {"id": "s1", "type": "consent_form", "title": "Consent", "required": true},
                {"id": "s2", "type": "questionnaire", "title": "Questions", "required": true}
            ]
        }])))
    );
    let sent = updates(&mut preview);
    assert_eq!(
        sent[0].0,
        vec!["phases[0].stages[0].required", "phases[0].stages[1].required"]
    );
    Ok(())
}

#[test]
fn test_close_stops_publishing() -> Result<()> {
    let mut f = fixture()?;
    let mut preview = f.connect();
    preview.drain();

    f.session.handle_change("name", Value::from("Pilot"))?;
    f.session.close();
    f.advance_ms(5000);

    let kinds: Vec<_> = preview.drain().into_iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MessageKind::EditorClosed]);
    Ok(())
}
