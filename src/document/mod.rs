//! Document tree and collaborative state encoding.

mod codec;
mod models;
mod tree;

pub use codec::{CodecError, PageDocument, StateCodec, YrsStateCodec};
pub use models::{EditorBlock, EditorData, EDITOR_VERSION};
pub use tree::build_tree;
