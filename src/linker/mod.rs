pub mod trait_linker;

pub use trait_linker::{LinkStats, TraitLinker, PROVENANCE_ATTR};
