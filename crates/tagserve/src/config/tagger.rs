use serde_json::{json, Value};

use crate::engine::TrainingSettings;
use crate::error::ConfigError;
use crate::storage::Codec;

const SCHEMA_JSON: &str = include_str!("../../schema/tagger-config.json");

const FIELD_ID: &str = "id";
const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_LANG: &str = "lang";
const FIELD_STEMMER_CLASS: &str = "stemmer_class";
const FIELD_STOPWORDS_CLASS: &str = "stopwords_class";
const FIELD_CROSS_VALIDATION_PASSES: &str = "cross_validation_passes";
const FIELD_MAX_TOPICS_PER_DOCUMENT: &str = "max_topics_per_document";
const FIELD_PROBABILITY_THRESHOLD: &str = "probability_threshold";

pub const DEFAULT_CROSS_VALIDATION_PASSES: usize = 10;
pub const DEFAULT_MAX_TOPICS_PER_DOCUMENT: usize = 10;

/// Per-tagger settings, stored as `config.json` in the tagger directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggerConfiguration {
    id: String,
    title: String,
    description: Option<String>,
    lang: Option<String>,
    stemmer_class: Option<String>,
    stopwords_class: Option<String>,
    cross_validation_passes: usize,
    max_topics_per_document: usize,
    probability_threshold: f64,
}

impl TaggerConfiguration {
    /// Default configuration for a new tagger, titled with its id.
    pub fn with_defaults(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            lang: None,
            stemmer_class: None,
            stopwords_class: None,
            cross_validation_passes: DEFAULT_CROSS_VALIDATION_PASSES,
            max_topics_per_document: DEFAULT_MAX_TOPICS_PER_DOCUMENT,
            probability_threshold: 0.0,
        }
    }

    /// Builds a configuration from a complete JSON document. `title` is
    /// required. The id is taken from the document unless `ignore_id` is set
    /// or the document has none.
    pub fn from_json(json: &Value, default_id: &str, ignore_id: bool) -> Result<Self, ConfigError> {
        validate_schema(json)?;
        let id = match json.get(FIELD_ID).and_then(Value::as_str) {
            Some(id) if !ignore_id => id,
            _ => default_id,
        };
        if json.get(FIELD_TITLE).is_none() {
            return Err(ConfigError::Validation {
                message: "Configuration JSON must have a value for 'title'".to_string(),
            });
        }

        let mut config = Self::with_defaults(id);
        config.apply(json)?;
        Ok(config)
    }

    /// Applies the fields present in `json`. Nothing changes if any field is
    /// invalid. The id cannot be changed this way.
    pub fn update_from_json(&mut self, json: &Value) -> Result<(), ConfigError> {
        validate_schema(json)?;
        let mut updated = self.clone();
        updated.apply(json)?;
        *self = updated;
        Ok(())
    }

    fn apply(&mut self, json: &Value) -> Result<(), ConfigError> {
        let Some(fields) = json.as_object() else {
            return Err(ConfigError::Validation {
                message: "Configuration JSON must be an object".to_string(),
            });
        };

        if let Some(title) = fields.get(FIELD_TITLE).and_then(Value::as_str) {
            self.title = title.to_string();
        }
        if let Some(value) = fields.get(FIELD_DESCRIPTION) {
            self.description = optional_string(value);
        }
        if let Some(value) = fields.get(FIELD_LANG) {
            self.lang = optional_string(value);
        }
        if let Some(value) = fields.get(FIELD_STEMMER_CLASS) {
            self.stemmer_class = optional_string(value);
        }
        if let Some(value) = fields.get(FIELD_STOPWORDS_CLASS) {
            self.stopwords_class = optional_string(value);
        }
        if let Some(value) = fields.get(FIELD_CROSS_VALIDATION_PASSES) {
            self.cross_validation_passes = at_least_two(FIELD_CROSS_VALIDATION_PASSES, value)?;
        }
        if let Some(value) = fields.get(FIELD_MAX_TOPICS_PER_DOCUMENT) {
            self.max_topics_per_document = at_least_two(FIELD_MAX_TOPICS_PER_DOCUMENT, value)?;
        }
        if let Some(value) = fields.get(FIELD_PROBABILITY_THRESHOLD).and_then(Value::as_f64) {
            self.probability_threshold = value.clamp(0.0, 1.0);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        json!({
            FIELD_ID: self.id,
            FIELD_TITLE: self.title,
            FIELD_DESCRIPTION: self.description,
            FIELD_LANG: self.lang,
            FIELD_STEMMER_CLASS: self.stemmer_class,
            FIELD_STOPWORDS_CLASS: self.stopwords_class,
            FIELD_CROSS_VALIDATION_PASSES: self.cross_validation_passes,
            FIELD_MAX_TOPICS_PER_DOCUMENT: self.max_topics_per_document,
            FIELD_PROBABILITY_THRESHOLD: self.probability_threshold,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// The configured language, or `default_lang` if none is set.
    pub fn effective_lang<'a>(&'a self, default_lang: &'a str) -> &'a str {
        self.lang.as_deref().unwrap_or(default_lang)
    }

    pub fn stemmer_class(&self) -> Option<&str> {
        self.stemmer_class.as_deref()
    }

    pub fn stopwords_class(&self) -> Option<&str> {
        self.stopwords_class.as_deref()
    }

    pub fn cross_validation_passes(&self) -> usize {
        self.cross_validation_passes
    }

    pub fn max_topics_per_document(&self) -> usize {
        self.max_topics_per_document
    }

    pub fn probability_threshold(&self) -> f64 {
        self.probability_threshold
    }

    pub fn training_settings(&self, default_lang: &str) -> TrainingSettings {
        TrainingSettings {
            language: self.effective_lang(default_lang).to_string(),
            stemmer: self.stemmer_class.clone(),
            stopwords: self.stopwords_class.clone(),
        }
    }
}

fn optional_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn at_least_two(field: &'static str, value: &Value) -> Result<usize, ConfigError> {
    let number = value.as_i64().unwrap_or(0);
    if number < 2 {
        return Err(ConfigError::TooSmall {
            field,
            minimum: 2,
            value: number,
        });
    }
    usize::try_from(number).map_err(|_| ConfigError::Validation {
        message: format!("{} is out of range: {}", field, number),
    })
}

fn validate_schema(json: &Value) -> Result<(), ConfigError> {
    let schema: Value = serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
        message: format!("Invalid embedded schema JSON: {}", e),
    })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator.iter_errors(json).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }
    Ok(())
}

/// Reads and writes `config.json`, filling in the owning tagger's id when
/// the file has none.
pub struct ConfigurationCodec {
    tagger_id: String,
}

impl ConfigurationCodec {
    pub fn new(tagger_id: &str) -> Self {
        Self {
            tagger_id: tagger_id.to_string(),
        }
    }
}

impl Codec<TaggerConfiguration> for ConfigurationCodec {
    fn decode(&self, bytes: &[u8]) -> Result<TaggerConfiguration, String> {
        let json: Value =
            serde_json::from_slice(bytes).map_err(|e| format!("JSON parsing error: {}", e))?;
        TaggerConfiguration::from_json(&json, &self.tagger_id, false).map_err(|e| e.to_string())
    }

    fn encode(&self, value: &TaggerConfiguration) -> Result<Vec<u8>, String> {
        serde_json::to_vec_pretty(&value.to_json()).map_err(|e| e.to_string())
    }
}
