//! The WebSocket-backed realtime session.

use crate::{
    config::RealtimeConfig,
    events::SessionEvent,
    session::{EventStream, ModelSession, SessionFactory, SessionHandle, ToolExecutor, UserInput},
    translator::{EventTranslator, FunctionCall},
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use openai_realtime_types::{ClientEvent, ConversationItem, ServerMessage};
use secrecy::ExposeSecret;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, error, info, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Instructions from the session handle to its driver task.
#[derive(Debug)]
enum Command {
    Send(ClientEvent),
    Raw(serde_json::Value),
    /// The result of a tool call, to hand back to the model.
    ToolOutput { call_id: String, output: String },
    Interrupt,
    Close,
}

/// A session with the OpenAI Realtime API.
///
/// A background driver task owns the WebSocket. It forwards commands from
/// this handle, translates server frames into [`SessionEvent`]s and runs the
/// tool calls the model requests.
pub struct OpenAIRealtimeSession {
    commands: mpsc::Sender<Command>,
    closed: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl OpenAIRealtimeSession {
    /// Connects, sends the initial `session.update` and starts the driver task.
    pub async fn connect(
        config: &RealtimeConfig,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<SessionHandle> {
        let mut request = config.endpoint().into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", config.api_key.expose_secret()).parse()?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse()?);

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to OpenAI Realtime WebSocket")?;
        let (mut ws_tx, ws_rx) = ws_stream.split();
        info!(model = %config.model, "Connected to OpenAI Realtime API.");

        let definitions = tools
            .definitions()
            .await
            .context("Failed to list tool definitions")?;
        let update = ClientEvent::SessionUpdate {
            session: config.session_config(definitions),
        };
        send_event(&mut ws_tx, &update).await?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let driver = Driver {
            ws_tx,
            ws_rx,
            commands: command_rx,
            feedback: command_tx.downgrade(),
            events: event_tx,
            tools,
            translator: EventTranslator::new(config.agent_name.clone()),
            response_pending: false,
        };
        let handle = tokio::spawn(driver.run());

        let session = Arc::new(Self {
            commands: command_tx,
            closed: AtomicBool::new(false),
            driver: Mutex::new(Some(handle)),
        });
        let events: EventStream = Box::pin(futures::stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        }));

        Ok(SessionHandle { session, events })
    }

    async fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Realtime session is closed"))
    }
}

#[async_trait]
impl ModelSession for OpenAIRealtimeSession {
    async fn send_audio(&self, pcm16: Bytes) -> Result<()> {
        self.command(Command::Send(ClientEvent::audio_append(&pcm16)))
            .await
    }

    async fn send_message(&self, input: UserInput) -> Result<()> {
        self.command(Command::Send(ClientEvent::item_create(
            ConversationItem::user_message(input.content),
        )))
        .await?;
        self.command(Command::Send(ClientEvent::ResponseCreate)).await
    }

    async fn send_raw(
        &self,
        kind: &str,
        other_data: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let mut event = serde_json::Map::new();
        event.insert("type".to_string(), serde_json::Value::String(kind.to_string()));
        event.extend(other_data);
        self.command(Command::Raw(serde_json::Value::Object(event)))
            .await
    }

    async fn interrupt(&self) -> Result<()> {
        self.command(Command::Interrupt).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // The driver may already be gone if the server hung up first.
        let _ = self.commands.send(Command::Close).await;
        if let Some(handle) = self.driver.lock().await.take() {
            handle.await.context("Realtime driver task panicked")?;
        }
        info!("Realtime session closed.");
        Ok(())
    }
}

struct Driver {
    ws_tx: SplitSink<WsStream, WsMessage>,
    ws_rx: SplitStream<WsStream>,
    commands: mpsc::Receiver<Command>,
    /// Used by tool tasks to hand results back; weak so dropping the handle ends the driver.
    feedback: mpsc::WeakSender<Command>,
    events: mpsc::Sender<Result<SessionEvent>>,
    tools: Arc<dyn ToolExecutor>,
    translator: EventTranslator,
    /// A `response.create` owed to the model once the active response is done.
    response_pending: bool,
}

impl Driver {
    async fn run(mut self) {
        let events = self.events.clone();
        if let Err(e) = self.drive().await {
            error!(error = ?e, "Realtime session driver failed");
            let _ = events.send(Err(e)).await;
        }
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(event)) => send_event(&mut self.ws_tx, &event).await?,
                    Some(Command::Raw(event)) => {
                        self.ws_tx.send(WsMessage::Text(event.to_string().into())).await?;
                    }
                    Some(Command::ToolOutput { call_id, output }) => {
                        let item = ConversationItem::function_call_output(call_id, output);
                        send_event(&mut self.ws_tx, &ClientEvent::item_create(item)).await?;
                        // The server rejects response.create while a response is in flight.
                        if self.translator.response_active() {
                            self.response_pending = true;
                        } else {
                            send_event(&mut self.ws_tx, &ClientEvent::ResponseCreate).await?;
                        }
                    }
                    Some(Command::Interrupt) => {
                        if self.translator.response_active() {
                            send_event(&mut self.ws_tx, &ClientEvent::ResponseCancel).await?;
                        }
                        if let Some(event) = self.translator.interrupt() {
                            self.emit(event).await?;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = self.ws_tx.close().await;
                        return Ok(());
                    }
                },
                frame = self.ws_rx.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let message = match ServerMessage::parse(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                warn!(error = %e, "Ignoring undecodable frame from realtime server");
                                continue;
                            }
                        };
                        debug!(kind = %message.kind, "Realtime server event");
                        let translation = self.translator.translate(message);
                        for event in translation.events {
                            self.emit(event).await?;
                        }
                        if let Some(call) = translation.tool_call {
                            self.spawn_tool_call(call);
                        }
                        if self.response_pending && !self.translator.response_active() {
                            self.response_pending = false;
                            debug!("Requesting a response for finished tool calls");
                            send_event(&mut self.ws_tx, &ClientEvent::ResponseCreate).await?;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Realtime server closed the connection.");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("Realtime WebSocket receive failed"),
                    None => return Ok(()),
                },
            }
        }
    }

    async fn emit(&self, event: SessionEvent) -> Result<()> {
        self.events
            .send(Ok(event))
            .await
            .map_err(|_| anyhow!("Session event stream was dropped"))
    }

    /// Runs the tool off the driver task, then reports the output to the event
    /// stream and hands it back to the driver for the model.
    fn spawn_tool_call(&self, call: FunctionCall) {
        let tools = self.tools.clone();
        let events = self.events.clone();
        let feedback = self.feedback.clone();
        tokio::spawn(async move {
            info!(tool = %call.name, call_id = %call.call_id, "Executing tool call");
            let output = match tools.call(&call.name, &call.arguments).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(tool = %call.name, error = ?e, "Tool call failed");
                    format!("Error: {}", e)
                }
            };
            let _ = events
                .send(Ok(SessionEvent::ToolEnd {
                    tool: call.name.clone(),
                    output: output.clone(),
                }))
                .await;

            let Some(commands) = feedback.upgrade() else {
                return;
            };
            let _ = commands
                .send(Command::ToolOutput {
                    call_id: call.call_id,
                    output,
                })
                .await;
        });
    }
}

async fn send_event(ws_tx: &mut SplitSink<WsStream, WsMessage>, event: &ClientEvent) -> Result<()> {
    ws_tx
        .send(WsMessage::Text(serde_json::to_string(event)?.into()))
        .await?;
    Ok(())
}

/// Starts [`OpenAIRealtimeSession`]s with a fixed configuration and tool set.
pub struct OpenAIRealtimeFactory {
    config: RealtimeConfig,
    tools: Arc<dyn ToolExecutor>,
}

impl OpenAIRealtimeFactory {
    pub fn new(config: RealtimeConfig, tools: Arc<dyn ToolExecutor>) -> Self {
        Self { config, tools }
    }
}

#[async_trait]
impl SessionFactory for OpenAIRealtimeFactory {
    async fn start(&self) -> Result<SessionHandle> {
        OpenAIRealtimeSession::connect(&self.config, self.tools.clone()).await
    }
}
