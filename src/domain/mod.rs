//! Pure build logic for assetpipe
//!
//! Contains hashing, script lowering, module graphs, source maps and markup
//! injection without any I/O concerns.

mod graph;
mod hash;
mod inject;
mod lexer;
mod sourcemap;
mod transform;

pub use graph::{GraphError, ModuleGraph};
pub use hash::{validate_length, ContentHash, HashError, DEFAULT_HASH_LENGTH};
pub use inject::{inject, inject_all, relative_href, TagKind};
pub use lexer::SyntaxError;
pub use sourcemap::{CommentStyle, SourceMap};
pub use transform::{find_requires, EsModuleTransform, ScriptTransform, TransformError};
