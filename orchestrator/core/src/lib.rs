// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hivemind-orchestrator-core` — Task Orchestration & Model Routing
//!
//! Core of the HIVEMIND orchestration engine: task lifecycle, model routing
//! with caching and fallback, the reasoning/generation hybrid pipeline, and
//! the learning feedback loop.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Task`, `Agent`, `ModelDescriptor`, `RoutingRequest`, `FeedbackRecord`, config, events |
//! | [`application`] | Application | `TaskManager`, `ReasoningPipeline`, `LearningLoop` |
//! | [`infrastructure`] | Infrastructure | event bus, result cache, provider registry, `ModelRouter`, provider adapters, in-memory stores |
//!
//! ## Key Concepts
//!
//! - **Fingerprint**: deterministic hash of a request's semantic inputs,
//!   used as the result-cache key.
//! - **Fallback chain**: ordered model choices tried in sequence until one
//!   succeeds; local runtimes sort before remote APIs by default.
//! - **Reasoning/Generation hybrid**: a reasoning model's extracted output
//!   conditions a second generation model's final answer.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
