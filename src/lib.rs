//! # Chat Vault
//!
//! A small chat and document backend with vector-embedding semantic search.
//!
//! Chat Vault stores users, chats, messages, and documents in SQLite and
//! exposes CRUD endpoints over HTTP. Uploaded documents run through an
//! ingestion pipeline — text extraction, metadata enrichment, embedding
//! generation — before a single row is persisted; stored embeddings back a
//! semantic search endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │  Upload  │──▶│  Pipeline                │──▶│  SQLite   │
//! │ (HTTP)   │   │ Extract+Enrich+Embed     │   │ entities  │
//! └──────────┘   └──────────────────────────┘   └────┬─────┘
//!                                                    │
//!                                 ┌──────────────────┤
//!                                 ▼                  ▼
//!                            ┌──────────┐      ┌──────────┐
//!                            │   CRUD   │      │  Search  │
//!                            │  (HTTP)  │      │  (HTTP)  │
//!                            └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chatvault init                # create database
//! chatvault serve               # start the HTTP server
//! chatvault migrate-uuids       # convert a legacy integer-id database
//! chatvault stats               # show what's stored
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction |
//! | [`enrich`] | Content statistics and hashing |
//! | [`embedding`] | Embedding generation and vector utilities |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`store`] | Entity CRUD |
//! | [`search`] | Semantic document search |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations (incl. integer-id → UUID conversion) |
//! | [`stats`] | Database statistics |

pub mod config;
pub mod db;
pub mod embedding;
pub mod enrich;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
