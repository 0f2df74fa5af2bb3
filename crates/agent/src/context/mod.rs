//! Prompt assembly.
//!
//! Builds the document sent to the language model for one turn from the
//! persona instructions, the tool catalogue, recalled memories, the trailing
//! window of conversation history and the new user input, within a token
//! budget.
//!
//! | Section | Source | Trim Strategy |
//! |---------|--------|---------------|
//! | System instructions | Persona | Never trimmed |
//! | Tool catalogue | Tool registry | Never trimmed |
//! | New user input | Current turn | Never trimmed |
//! | Long-Term Memory | Memory backend | Oldest dropped first |
//! | Conversation History | Session | Oldest turns dropped |

pub mod assembler;
pub mod token;

pub use assembler::{
    AssemblyInput, AssemblyMetadata, DropInfo, LayerStats, PerLayerBudget, PromptAssembler,
    PromptDocument, TokenBudget,
};
