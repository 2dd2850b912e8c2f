//! Core logic for the museum NPC: the tools the realtime model can call and
//! the retrieval-augmented knowledge base behind `query_rag`.

pub mod agent;
pub mod clock;
pub mod llm_client;
pub mod rag;
