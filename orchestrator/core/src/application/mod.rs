// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap;
pub mod learning;
pub mod pipeline;
pub mod task_manager;

// Re-export the service surface for convenience
pub use bootstrap::Engine;
pub use learning::{LearningLoop, TrainingReport, TrainingStatus};
pub use pipeline::{PipelineError, PipelineResult, ReasoningPipeline};
pub use task_manager::{TaskFilter, TaskManager};
