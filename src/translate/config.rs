//! Pipeline configuration, loadable from YAML.
use crate::ooxml::docx::typography::TypographyOptions;
use crate::ooxml::error::{OoxmlError, Result};
use crate::translate::batch::{BatchOptions, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};
use crate::translate::protocol::{DEFAULT_PLACEHOLDER, DEFAULT_SEPARATOR, Tokens};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for translating documents.
///
/// Missing YAML keys take their default values:
///
/// ```
/// use pomelo::translate::TranslateOptions;
///
/// let options = TranslateOptions::from_yaml_str("concurrency: 2\ntarget_lang: English\n").unwrap();
/// assert_eq!(options.concurrency, 2);
/// assert_eq!(options.separator, "【SEG】");
/// assert!(options.materialize_styles);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Concurrent translation calls
    pub concurrency: usize,
    /// Extra attempts per paragraph after a failed one
    pub max_retries: usize,
    /// Preferred segment separator
    pub separator: String,
    /// Preferred stand-in for non-text content
    pub placeholder: String,
    /// Flatten style references into direct formatting before segmenting
    pub materialize_styles: bool,
    /// Replace `word/fontTable.xml` with a table of common Latin and CJK fonts
    pub modern_font_table: bool,
    /// Fonts, languages, sizes and spacing for the translated text
    pub typography: TypographyOptions,
    /// Source language label passed to the translator
    pub source_lang: Option<String>,
    /// Target language label passed to the translator
    pub target_lang: Option<String>,
    /// Prompt fragments a valid response must not contain
    pub instruction_markers: Vec<String>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            separator: DEFAULT_SEPARATOR.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            materialize_styles: true,
            modern_font_table: false,
            typography: TypographyOptions::default(),
            source_lang: None,
            target_lang: None,
            instruction_markers: Vec::new(),
        }
    }
}

impl TranslateOptions {
    /// Parse and validate options from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| OoxmlError::Config(format!("invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Read, parse and validate a YAML options file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading options");
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_saphyr::to_string(self).map_err(|e| OoxmlError::Config(format!("failed to serialize options: {}", e)))
    }

    /// Check that the options are usable.
    ///
    /// # Errors
    ///
    /// Fails when `concurrency` is zero, when a token is empty or blank, or
    /// when one token contains the other.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(OoxmlError::Config("concurrency must be at least 1".into()));
        }
        if self.separator.trim().is_empty() || self.placeholder.trim().is_empty() {
            return Err(OoxmlError::Config("separator and placeholder must not be blank".into()));
        }
        if self.separator.contains(self.placeholder.as_str()) || self.placeholder.contains(self.separator.as_str()) {
            return Err(OoxmlError::Config(format!(
                "separator {:?} and placeholder {:?} overlap",
                self.separator, self.placeholder
            )));
        }
        Ok(())
    }

    /// The configured token pair.
    pub fn tokens(&self) -> Tokens {
        Tokens::new(self.separator.clone(), self.placeholder.clone())
    }

    /// Settings for the worker pool.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            instruction_markers: self.instruction_markers.clone(),
        }
    }
}
