use typed_builder::TypedBuilder;

use crate::prelude::*;

/// How a label repeated within one block is handled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum DuplicatePolicy {
    /// The later value replaces the earlier one, keeping the position of the first.
    #[default]
    LastWins,
    /// The block is rejected with a framing error.
    Reject,
}

/// Limits applied by a [Decoder](super::Decoder).
///
/// The length limits are used to detect framing errors, not to truncate.
///
/// # Examples
/// ```
/// use vedirect::text::{DecoderConfig, DuplicatePolicy};
///
/// let config = DecoderConfig::builder()
///     .max_fields(32)
///     .duplicates(DuplicatePolicy::Reject)
///     .build();
/// assert_eq!(config.max_label_len, DecoderConfig::MAX_LABEL_LEN);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DecoderConfig {
    /// Longest label accepted before a tab must be seen.
    #[builder(default = DecoderConfig::MAX_LABEL_LEN)]
    pub max_label_len: usize,
    /// Longest value accepted before a newline pair must be seen.
    #[builder(default = DecoderConfig::MAX_VALUE_LEN)]
    pub max_value_len: usize,
    /// Most distinct fields a block may hold before its checksum field.
    #[builder(default = DecoderConfig::MAX_FIELDS)]
    pub max_fields: usize,
    #[builder(default)]
    pub duplicates: DuplicatePolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig::builder().build()
    }
}

impl DecoderConfig {
    /// Label buffer size recommended by the protocol documentation.
    pub const MAX_LABEL_LEN: usize = 9;
    /// Value buffer size recommended by the protocol documentation.
    pub const MAX_VALUE_LEN: usize = 33;
    /// Generous over the documented maximum of 18 fields per block.
    pub const MAX_FIELDS: usize = 64;

    /// # Errors
    /// [Error::Config] if the `Checksum` label would not fit in a label, or if any
    /// limit is 0.
    pub fn validate(&self) -> Result<()> {
        let min_label = super::CHECKSUM_LABEL.len();
        if self.max_label_len < min_label {
            return Err(Error::Config(format!(
                "max_label_len must be at least {min_label}, got {}",
                self.max_label_len
            )));
        }
        if self.max_value_len == 0 {
            return Err(Error::Config("max_value_len must be non-zero".to_string()));
        }
        if self.max_fields == 0 {
            return Err(Error::Config("max_fields must be non-zero".to_string()));
        }
        Ok(())
    }
}
