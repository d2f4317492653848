pub mod header;
pub mod ixbrl;
pub mod numeric;
pub mod text;
pub mod xlink;

#[cfg(test)]
pub mod tests;

pub use header::{derive_header, Header};
pub use ixbrl::{parse_instance, parse_instances, InstanceDocument, NumericFact, TextFact};
pub use xlink::{parse_linkbase, LinkbaseKind, LinkbaseSet, ParsedLinkbase};
