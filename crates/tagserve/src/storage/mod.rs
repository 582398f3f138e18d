pub mod file;
pub mod layout;
pub mod store;

pub use file::{Codec, FileStore, JsonCodec, TextCodec};
pub use layout::{decode_tagger_id, encode_tagger_id, DataDirectory};
pub use store::{MemoryStore, ObjectStore};
