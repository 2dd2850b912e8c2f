//! Runs the NPC's MCP tool service in-process and exposes it to realtime
//! sessions as a [`ToolExecutor`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use npc_core::agent::NpcToolService;
use openai_realtime::{ToolExecutor, types::ToolDef};
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use tracing::{error, info};

/// An MCP client connected over an in-memory duplex pipe to the tool server.
pub struct McpToolExecutor {
    client: RunningService<RoleClient, ()>,
}

impl McpToolExecutor {
    /// Spawns the tool server and connects a client to it.
    pub async fn start(service: NpcToolService) -> Result<Self> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);

        tokio::spawn(async move {
            match service.serve(server_transport).await {
                Ok(running) => {
                    let _ = running.waiting().await;
                }
                Err(e) => error!(error = ?e, "NPC tool service failed to start"),
            }
        });
        let client = ().serve(client_transport).await?;
        info!("NPC tool service connected.");
        Ok(Self { client })
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn definitions(&self) -> Result<Vec<ToolDef>> {
        self.client
            .list_all_tools()
            .await?
            .into_iter()
            .map(|t| -> Result<ToolDef> {
                Ok(ToolDef::function(
                    t.name.to_string(),
                    t.description.map(|d| d.to_string()),
                    serde_json::to_value(&*t.input_schema)?,
                ))
            })
            .collect()
    }

    async fn call(&self, name: &str, arguments: &str) -> Result<String> {
        let arguments = if arguments.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(arguments).context("Tool arguments are not a JSON object")?)
        };
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await?;

        let annotated_content = result
            .content
            .context("Tool call returned no content")?
            .pop()
            .context("Content list was empty")?;
        match annotated_content.raw {
            RawContent::Text(text_content) => Ok(text_content.text),
            _ => Err(anyhow!("Unexpected content type from tool '{}'", name)),
        }
    }
}
