//! The Jarvis engine: from a line of user text to a spoken reply.
//!
//! Each turn follows the same pipeline:
//!
//! 1. **Assemble** the prompt (persona, tool catalogue, recalled memories,
//!    trailing history, new input) within a token budget
//! 2. **Resolve** the model's decision into a [`ResolvedIntent`]: a tool call
//!    or a direct reply
//! 3. **Invoke** the chosen tool under a timeout, containing any failure
//! 4. **Compose** the final text (optionally narrated by the model)
//!
//! Failures at any step become a reply; the pipeline never returns an error
//! to the user.
//!
//! [`ResolvedIntent`]: jarvis_core::ResolvedIntent

pub mod assistant;
pub mod composer;
pub mod context;
pub mod invoker;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod test_support;

pub use assistant::Assistant;
pub use composer::{ResponseComposer, ResultTemplate};
pub use context::{
    AssemblyInput, AssemblyMetadata, DropInfo, LayerStats, PerLayerBudget, PromptAssembler,
    PromptDocument, TokenBudget,
};
pub use invoker::ToolInvoker;
pub use resolver::IntentResolver;
pub use session::{Exchange, Session, SessionHandle};
