// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache;
pub mod local;
pub mod registry;
pub mod remote;
pub mod router;

pub use cache::ResultCache;
pub use local::LocalRuntimeAdapter;
pub use registry::ProviderRegistry;
pub use remote::RemoteApiAdapter;
pub use router::{ModelRouter, RouterError};
