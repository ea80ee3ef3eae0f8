pub mod composer;

pub use composer::{ format_sources, PromptComposer };
