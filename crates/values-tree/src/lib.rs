//! Configuration trees for layered chart values.
//!
//! A [`ConfigTree`] is a scalar, a sequence or a string-keyed mapping parsed
//! from YAML. Trees are combined with a right-biased deep merge:
//! - Mappings: union of keys, shared keys merged recursively
//! - Sequences: REPLACE (override wins entirely)
//! - Scalars and mismatched types: override wins

mod error;
mod merge;
mod path;
mod tree;
mod yaml;

pub use error::TreeError;
pub use merge::{compose_layers, deep_merge, merge_owned};
pub use path::{format_path, parse_path, PathSegment};
pub use tree::{ConfigTree, Mapping, Scalar};
pub use yaml::{from_yaml_documents, from_yaml_str, to_yaml_string};
