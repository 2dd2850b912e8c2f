//! NPC Tool Service
//!
//! The tools the museum NPC can call while talking to a visitor, served over
//! the Model Context Protocol (MCP). The realtime session lists these tools
//! for the model and routes the model's function calls back here.

use crate::{clock::Clock, rag::KnowledgeBase};
use chrono::Utc;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Name the agent reports in `agent_start` / `agent_end` events.
pub const AGENT_NAME: &str = "eladia-npc";

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_TOP_N: usize = 3;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

// --- Data Structures for Tools ---

#[derive(Deserialize, JsonSchema, Debug)]
pub struct GetWeatherArgs {
    /// The city to get the weather for.
    pub city: String,
}

/// Arguments for a question against the museum documents.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct QueryRagArgs {
    /// The visitor's question, in their own words.
    pub query: String,
    /// How many candidate passages to retrieve.
    #[serde(default = "default_top_k")]
    #[schemars(description = "How many candidate passages to retrieve (default 10)")]
    pub top_k: usize,
    /// How many passages to keep after reranking.
    #[serde(default = "default_top_n")]
    #[schemars(description = "How many passages to keep after reranking (default 3)")]
    pub top_n: usize,
}

// --- Service and Handler Implementation ---

/// MCP server exposing the NPC's tools.
pub struct NpcToolService {
    clock: Clock,
    knowledge: Arc<dyn KnowledgeBase>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for NpcToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl NpcToolService {
    /// `timezone` is an IANA zone name; unknown zones fall back to UTC.
    pub fn new(timezone: &str, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            clock: Clock::new(timezone),
            knowledge,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Tool to get current time (hour and minutes).")]
    pub async fn get_current_time(&self) -> Result<String, String> {
        info!("Executing tool 'get_current_time'");
        serde_json::to_string(&self.clock.time_at(Utc::now()))
            .map_err(|e| format!("Failed to serialize time: {}", e))
    }

    #[tool(description = "Tool to get current date (day and month).")]
    pub async fn get_current_date(&self) -> Result<String, String> {
        info!("Executing tool 'get_current_date'");
        serde_json::to_string(&self.clock.date_at(Utc::now()))
            .map_err(|e| format!("Failed to serialize date: {}", e))
    }

    #[tool(description = "Tool to get weather in certain city.")]
    pub async fn get_weather(&self, args: Parameters<GetWeatherArgs>) -> Result<String, String> {
        info!(city = %args.0.city, "Executing tool 'get_weather'");
        Ok(format!("The weather in {} is sunny.", args.0.city))
    }

    /// Answers a question from the museum's documents.
    #[tool(
        description = "Recupera información y responde preguntas sobre el museo 'Casa de los Balcones': su historia, arquitectura, tradiciones y contexto cultural. Usa siempre esta herramienta para intentar contestar las consultas de los visitantes, incluidas las preguntas sobre el edificio, sus colecciones, la artesanía (como los calados), los hechos históricos, las costumbres locales y los temas de La Orotava o Tenerife. Úsala solo para cuestiones sobre la 'Casa de los Balcones' y su entorno."
    )]
    pub async fn query_rag(&self, args: Parameters<QueryRagArgs>) -> Result<String, String> {
        let QueryRagArgs {
            query,
            top_k,
            top_n,
        } = args.0;
        info!(%query, top_k, top_n, "Executing tool 'query_rag'");
        self.knowledge
            .query(&query, top_k, top_n)
            .await
            .map_err(|e| {
                warn!(error = ?e, "RAG query failed");
                format!("Failed to query the museum documents: {}", e)
            })
    }
}
