mod arity;
mod converter;
mod extract;
mod splice;

pub use arity::{ArityConvention, CallSite};
pub use converter::{ConversionError, ConversionReport, Converter, GroupOutcome};
pub use extract::{extract_subgraph, Subgraph};
pub use splice::splice_group;
