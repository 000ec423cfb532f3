//! Agent routing core for Conductor
//!
//! A query flows through:
//! - semantic agent selection over the catalog (shortlist)
//! - planning by the language model (agents, tool queries, dependencies)
//! - per-agent tool filtering against the provider's tool catalog
//! - dependency-aware concurrent execution with retries and a run deadline
//! - aggregation of successful outputs into one answer
//!
//! ## Architecture
//!
//! - `domain/` - Core types (Message, AgentDescriptor, OrchestrationResult)
//! - `index/` - Semantic index and its single-flight cache
//! - `selection/` - Agent and tool selectors
//! - `planner/` - Plan parsing, validation and repair
//! - `core/` - Agent implementations (SingleTurn, ReAct)
//! - `orchestration/` - Scheduling, retry and aggregation
//! - `llm/`, `embedding/` - HTTP collaborators

pub mod catalog;
pub mod config;
pub mod core;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod handler;
pub mod index;
pub mod llm;
pub mod orchestration;
pub mod planner;
pub mod selection;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use handler::RouterHandler;
