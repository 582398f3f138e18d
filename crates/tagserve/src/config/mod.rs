pub mod settings;
pub mod tagger;

pub use settings::{LogFormat, LogSettings, ServerSettings};
pub use tagger::{ConfigurationCodec, TaggerConfiguration};
