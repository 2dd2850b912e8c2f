//! The live-session registry.
//!
//! Maps a client-chosen session key to its realtime session, the owner
//! connection, the observers and the relay task. Entries exist from
//! `connect` until `disconnect`; the realtime session of an entry is closed
//! exactly once, by whoever removes the entry.

use super::{
    relay::{self, Observers},
    socket::ClientSink,
};
use anyhow::{Context, Result};
use bytes::Bytes;
use openai_realtime::{ModelSession, SessionFactory, SessionHandle, UserInput};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

/// Something the owner socket asked to send to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    Audio(Bytes),
    Message(UserInput),
    /// A client event passed through as `{"type": kind, ..other_data}`.
    Raw {
        kind: String,
        other_data: Map<String, Value>,
    },
    Interrupt,
}

struct SessionEntry {
    session: Arc<dyn ModelSession>,
    owner: ClientSink,
    observers: Observers,
    relay: JoinHandle<()>,
}

pub struct SessionManager {
    factory: Arc<dyn SessionFactory>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a realtime session for `key` owned by `owner` and begins relaying
    /// its events. A live session already registered under `key` is torn down.
    #[instrument(skip(self, owner), fields(owner = %owner.id()))]
    pub async fn connect(&self, key: &str, owner: ClientSink) -> Result<()> {
        let SessionHandle { session, events } = self
            .factory
            .start()
            .await
            .context("Failed to start realtime session")?;

        let observers: Observers = Arc::default();
        let relay = tokio::spawn(
            relay::run(events, owner.clone(), observers.clone())
                .instrument(info_span!("relay", session_id = %key)),
        );
        let entry = SessionEntry {
            session,
            owner,
            observers,
            relay,
        };

        let previous = self.sessions.write().await.insert(key.to_string(), entry);
        if let Some(previous) = previous {
            warn!("Session key reused; tearing down the previous session");
            previous.owner.close().await;
            teardown(previous).await;
        }
        info!("Realtime session connected.");
        Ok(())
    }

    /// Closes the realtime session for `key` and closes its observers.
    /// Returns whether a session was registered.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, key: &str) -> bool {
        let entry = self.sessions.write().await.remove(key);
        match entry {
            Some(entry) => {
                teardown(entry).await;
                info!("Realtime session disconnected.");
                true
            }
            None => false,
        }
    }

    /// Disconnects `key` only if `owner` still owns it, so a socket replaced by
    /// a newer connection does not tear down its successor.
    pub async fn release(&self, key: &str, owner: Uuid) -> bool {
        let entry = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(key) {
                Some(entry) if entry.owner.id() == owner => sessions.remove(key),
                _ => None,
            }
        };
        match entry {
            Some(entry) => {
                teardown(entry).await;
                info!(session_id = %key, "Realtime session disconnected.");
                true
            }
            None => false,
        }
    }

    /// Sends `input` to the realtime session for `key`. Unknown keys are ignored.
    pub async fn forward(&self, key: &str, input: ModelInput) -> Result<()> {
        let session = self
            .sessions
            .read()
            .await
            .get(key)
            .map(|entry| entry.session.clone());
        let Some(session) = session else {
            debug!(session_id = %key, "Dropping input for unknown session");
            return Ok(());
        };

        match input {
            ModelInput::Audio(pcm16) => session.send_audio(pcm16).await,
            ModelInput::Message(message) => session.send_message(message).await,
            ModelInput::Raw { kind, other_data } => session.send_raw(&kind, other_data).await,
            ModelInput::Interrupt => session.interrupt().await,
        }
    }

    /// Registers a read-only listener. Returns `false` if `key` has no live session.
    pub async fn add_observer(&self, key: &str, observer: ClientSink) -> bool {
        let observers = self
            .sessions
            .read()
            .await
            .get(key)
            .map(|entry| entry.observers.clone());
        match observers {
            Some(observers) => {
                info!(session_id = %key, observer = %observer.id(), "Observer attached");
                observers.lock().await.push(observer);
                true
            }
            None => false,
        }
    }

    pub async fn remove_observer(&self, key: &str, observer: Uuid) {
        let observers = self
            .sessions
            .read()
            .await
            .get(key)
            .map(|entry| entry.observers.clone());
        if let Some(observers) = observers {
            observers.lock().await.retain(|o| o.id() != observer);
        }
    }

    /// Keys of all live sessions, sorted.
    pub async fn session_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

async fn teardown(entry: SessionEntry) {
    if let Err(e) = entry.session.close().await {
        warn!(error = ?e, "Failed to close realtime session cleanly");
    }
    entry.relay.abort();
    let observers: Vec<ClientSink> = std::mem::take(&mut *entry.observers.lock().await);
    for observer in observers {
        observer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::socket::Outbound;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use openai_realtime::{EventStream, SessionEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Records what it receives; its event stream is fed by the test.
    #[derive(Default)]
    struct FakeSession {
        inputs: std::sync::Mutex<Vec<String>>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl ModelSession for FakeSession {
        async fn send_audio(&self, pcm16: Bytes) -> Result<()> {
            self.inputs.lock().unwrap().push(format!("audio:{}", pcm16.len()));
            Ok(())
        }

        async fn send_message(&self, input: UserInput) -> Result<()> {
            self.inputs
                .lock()
                .unwrap()
                .push(format!("message:{}", input.content.len()));
            Ok(())
        }

        async fn send_raw(&self, kind: &str, _other_data: Map<String, Value>) -> Result<()> {
            self.inputs.lock().unwrap().push(format!("raw:{}", kind));
            Ok(())
        }

        async fn interrupt(&self) -> Result<()> {
            self.inputs.lock().unwrap().push("interrupt".into());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        started: std::sync::Mutex<Vec<(Arc<FakeSession>, mpsc::Sender<Result<SessionEvent>>)>>,
        fail: bool,
    }

    impl FakeFactory {
        fn session(&self, index: usize) -> Arc<FakeSession> {
            self.started.lock().unwrap()[index].0.clone()
        }

        fn events(&self, index: usize) -> mpsc::Sender<Result<SessionEvent>> {
            self.started.lock().unwrap()[index].1.clone()
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn start(&self) -> Result<SessionHandle> {
            if self.fail {
                return Err(anyhow!("realtime API unreachable"));
            }
            let session = Arc::new(FakeSession::default());
            let (tx, rx) = mpsc::channel(16);
            self.started.lock().unwrap().push((session.clone(), tx));
            let events: EventStream = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            }));
            Ok(SessionHandle { session, events })
        }
    }

    fn manager() -> (SessionManager, Arc<FakeFactory>) {
        let factory = Arc::new(FakeFactory::default());
        (SessionManager::new(factory.clone()), factory)
    }

    async fn next_text(rx: &mut mpsc::Receiver<Outbound>) -> Option<String> {
        match rx.recv().await? {
            Outbound::Text(text) => Some(text),
            Outbound::Close => None,
        }
    }

    #[tokio::test]
    async fn test_connect_registers_and_relays() {
        let (manager, factory) = manager();
        let (owner, mut owner_rx) = ClientSink::channel();
        manager.connect("museo", owner).await.unwrap();
        assert_eq!(manager.session_keys().await, vec!["museo"]);

        factory
            .events(0)
            .send(Ok(SessionEvent::AudioEnd))
            .await
            .unwrap();
        assert_eq!(
            next_text(&mut owner_rx).await.as_deref(),
            Some(r#"{"type":"audio_end"}"#)
        );
    }

    #[tokio::test]
    async fn test_connect_failure_registers_nothing() {
        let factory = Arc::new(FakeFactory {
            fail: true,
            ..Default::default()
        });
        let manager = SessionManager::new(factory);
        let (owner, _rx) = ClientSink::channel();
        assert!(manager.connect("museo", owner).await.is_err());
        assert!(manager.session_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_forward_routes_each_input_kind() {
        let (manager, factory) = manager();
        let (owner, _rx) = ClientSink::channel();
        manager.connect("museo", owner).await.unwrap();

        manager
            .forward("museo", ModelInput::Audio(Bytes::from_static(&[0, 0, 1, 0])))
            .await
            .unwrap();
        manager
            .forward("museo", ModelInput::Message(UserInput::text("Hola")))
            .await
            .unwrap();
        manager
            .forward(
                "museo",
                ModelInput::Raw {
                    kind: "input_audio_buffer.commit".into(),
                    other_data: Map::new(),
                },
            )
            .await
            .unwrap();
        manager.forward("museo", ModelInput::Interrupt).await.unwrap();

        assert_eq!(
            *factory.session(0).inputs.lock().unwrap(),
            vec!["audio:4", "message:1", "raw:input_audio_buffer.commit", "interrupt"]
        );
    }

    #[tokio::test]
    async fn test_unknown_key_is_a_no_op() {
        let (manager, _factory) = manager();
        manager.forward("nadie", ModelInput::Interrupt).await.unwrap();
        let (observer, _rx) = ClientSink::channel();
        assert!(!manager.add_observer("nadie", observer.clone()).await);
        manager.remove_observer("nadie", observer.id()).await;
        assert!(!manager.disconnect("nadie").await);
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_everything_once() {
        let (manager, factory) = manager();
        let (owner, _owner_rx) = ClientSink::channel();
        manager.connect("museo", owner).await.unwrap();
        let (observer, mut observer_rx) = ClientSink::channel();
        assert!(manager.add_observer("museo", observer).await);

        assert!(manager.disconnect("museo").await);
        assert!(!manager.disconnect("museo").await);

        assert!(manager.session_keys().await.is_empty());
        assert_eq!(factory.session(0).closes.load(Ordering::SeqCst), 1);
        assert!(matches!(observer_rx.recv().await, Some(Outbound::Close)));
        manager.forward("museo", ModelInput::Interrupt).await.unwrap();
        assert!(factory.session(0).inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observers_receive_events_after_owner() {
        let (manager, factory) = manager();
        let (owner, mut owner_rx) = ClientSink::channel();
        manager.connect("museo", owner).await.unwrap();
        let (observer, mut observer_rx) = ClientSink::channel();
        manager.add_observer("museo", observer).await;

        factory
            .events(0)
            .send(Ok(SessionEvent::ToolStart {
                tool: "query_rag".into(),
            }))
            .await
            .unwrap();
        let expected = r#"{"tool":"query_rag","type":"tool_start"}"#;
        let owner_text: Value = serde_json::from_str(&next_text(&mut owner_rx).await.unwrap()).unwrap();
        let observer_text: Value =
            serde_json::from_str(&next_text(&mut observer_rx).await.unwrap()).unwrap();
        assert_eq!(owner_text, serde_json::from_str::<Value>(expected).unwrap());
        assert_eq!(observer_text, owner_text);
    }

    #[tokio::test]
    async fn test_removed_observer_stops_receiving() {
        let (manager, factory) = manager();
        let (owner, mut owner_rx) = ClientSink::channel();
        manager.connect("museo", owner).await.unwrap();
        let (observer, mut observer_rx) = ClientSink::channel();
        let observer_id = observer.id();
        manager.add_observer("museo", observer).await;
        manager.remove_observer("museo", observer_id).await;

        factory
            .events(0)
            .send(Ok(SessionEvent::AudioEnd))
            .await
            .unwrap();
        assert!(next_text(&mut owner_rx).await.is_some());
        assert!(observer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_previous_session() {
        let (manager, factory) = manager();
        let (first, mut first_rx) = ClientSink::channel();
        let first_id = first.id();
        manager.connect("museo", first).await.unwrap();
        let (second, _second_rx) = ClientSink::channel();
        manager.connect("museo", second).await.unwrap();

        assert_eq!(manager.session_keys().await, vec!["museo"]);
        assert_eq!(factory.session(0).closes.load(Ordering::SeqCst), 1);
        assert_eq!(factory.session(1).closes.load(Ordering::SeqCst), 0);
        assert!(matches!(first_rx.recv().await, Some(Outbound::Close)));

        // The replaced owner's cleanup must not tear down its successor.
        assert!(!manager.release("museo", first_id).await);
        assert_eq!(manager.session_keys().await, vec!["museo"]);
    }

    #[tokio::test]
    async fn test_release_by_current_owner_disconnects() {
        let (manager, factory) = manager();
        let (owner, _rx) = ClientSink::channel();
        let owner_id = owner.id();
        manager.connect("museo", owner).await.unwrap();

        assert!(manager.release("museo", owner_id).await);
        assert!(manager.session_keys().await.is_empty());
        assert_eq!(factory.session(0).closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_keys_are_sorted() {
        let (manager, _factory) = manager();
        for key in ["zeta", "alfa", "museo"] {
            let (owner, _rx) = ClientSink::channel();
            manager.connect(key, owner).await.unwrap();
        }
        assert_eq!(manager.session_keys().await, vec!["alfa", "museo", "zeta"]);
    }
}
