// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hivemind-orchestrator-swarm` — Multi-Agent Coordination Crate
//!
//! Manages the agent registry, task assignment, and inter-agent messaging
//! for the HIVEMIND orchestration engine.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `AgentMessage`, `AssignmentOutcome`, `TaskOutcome`, `SwarmError` |
//! | [`application`] | Application | [`application::SwarmManager`] |
//!
//! ## Key Concepts
//!
//! - **Capability matching**: an idle agent is eligible for a task when its
//!   capability set is a superset of the task's tags; ties break FIFO by
//!   registration order.
//! - **Event-driven retry**: a task that finds no agent stays queued and is
//!   re-offered exactly once per agent-becomes-idle state change.
//! - **Fault isolation**: a crashed agent fails only its own task and is
//!   excluded from assignment until an operator resets it.

pub mod application;
pub mod domain;

pub use application::SwarmManager;
pub use domain::*;
