//! # navigator-effects: the effects-tree interpreter
//!
//! Walks a declarative [`navigator_types::Effect`] tree,
//! providing `sequence`/`parallel`/`race`/`retry`/`timeout`/
//! `with_compensation` control flow plus capability ports for `call`,
//! `call_llm`, `coordinate_agents` and `rag_pipeline`. The engine owns no
//! I/O itself: [`capability::Capabilities`] and [`data::DataStore`] are
//! supplied by the embedder (the root `navigator` crate wires these to the
//! real registry and model providers).

mod backoff;
mod capability;
mod data;
mod engine;
mod error;
mod pool;
mod validate;

pub use capability::{Capabilities, ReferenceCapabilities};
pub use data::{DataStore, InMemoryDataStore};
pub use engine::{execute, ExecutionContext};
pub use error::EffectError;
pub use pool::{EffectWorkerPool, DEFAULT_CAPACITY};
pub use validate::validate;
