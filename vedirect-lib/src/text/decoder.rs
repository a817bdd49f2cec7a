use std::collections::VecDeque;
use std::fmt::Display;

use super::block::BlockAssembler;
use super::DecoderConfig;
use crate::prelude::*;

/// A single label/value pair of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Field {
    /// Printable ASCII label identifying the field, e.g., `V` or `SOC`.
    pub label: String,
    /// Raw value bytes, without the delimiters.
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub value: Vec<u8>,
}

impl Field {
    /// The value as text, or `None` if it is not valid UTF-8.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// The fields of a block whose checksum validated.
///
/// Fields are in the order their labels were first seen in the block. The
/// `Checksum` field itself is not included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Record {
    fields: Vec<Field>,
    checksum: u8,
    byte_count: usize,
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record{{fields:[len={}], bytes:{}, checksum:{:#04x}}}",
            self.fields.len(),
            self.byte_count,
            self.checksum
        )
    }
}

impl Record {
    pub(crate) fn new(fields: Vec<Field>, checksum: u8, byte_count: usize) -> Self {
        Record {
            fields,
            checksum,
            byte_count,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Raw value bytes for `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_slice())
    }

    /// Value for `label` as text, or `None` if missing or not valid UTF-8.
    #[must_use]
    pub fn get_str(&self, label: &str) -> Option<&str> {
        self.get(label).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.label.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The raw checksum byte that closed the block.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Number of bytes in the block, from the leading newline pair through the
    /// checksum byte.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }
}

/// Reasons a block could not be framed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum FramingError {
    #[error("label longer than {max} bytes")]
    LabelTooLong { max: usize },
    #[error("invalid label byte {0:#04x}")]
    InvalidLabelByte(u8),
    #[error("empty label")]
    EmptyLabel,
    #[error("value for {label} longer than {max} bytes")]
    ValueTooLong { label: String, max: usize },
    #[error("duplicate label {label}")]
    DuplicateLabel { label: String },
}

/// A block rejected by the decoder.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum DecodeError {
    /// A label or value could not be delimited.
    #[error("framing error after {fields} fields: {reason}")]
    Framing {
        reason: FramingError,
        /// Fields buffered for the block when it was dropped.
        fields: usize,
        /// The offending label or value bytes.
        #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
        bytes: Vec<u8>,
    },
    /// The block completed but its bytes did not sum to 0.
    #[error("checksum mismatch: {byte_count} bytes in {fields} fields sum to {computed:#04x}")]
    ChecksumMismatch {
        fields: usize,
        byte_count: usize,
        /// Modulo 256 sum over the block, including the checksum byte.
        computed: u8,
        /// The raw checksum byte received.
        checksum: u8,
    },
    /// No checksum field arrived before the block exceeded the field limit.
    #[error("block exceeds {max} fields without a checksum")]
    BlockTooLarge { fields: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DecodeErrorKind {
    Framing,
    ChecksumMismatch,
    BlockTooLarge,
}

impl DecodeError {
    #[must_use]
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Framing { .. } => DecodeErrorKind::Framing,
            DecodeError::ChecksumMismatch { .. } => DecodeErrorKind::ChecksumMismatch,
            DecodeError::BlockTooLarge { .. } => DecodeErrorKind::BlockTooLarge,
        }
    }
}

/// Produced by a [Decoder] each time a block is finished, whether accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Event {
    Record(Record),
    Error(DecodeError),
}

impl Event {
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Event::Record(_))
    }

    /// # Errors
    /// The [DecodeError] if this event rejected a block.
    pub fn into_result(self) -> std::result::Result<Record, DecodeError> {
        match self {
            Event::Record(record) => Ok(record),
            Event::Error(err) => Err(err),
        }
    }
}

/// Running counters kept by a [Decoder].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodeStats {
    /// Total bytes fed.
    pub bytes: u64,
    /// Bytes seen while waiting for a newline pair to synchronize on.
    pub unsynced_bytes: u64,
    pub records: u64,
    pub checksum_errors: u64,
    pub framing_errors: u64,
    pub oversized_blocks: u64,
    /// Blocks started after a resync that failed their checksum. These are
    /// dropped without an event, the preceding error having already been reported.
    pub partial_blocks: u64,
}

/// Incremental VE.Direct text decoder.
///
/// Bytes may be fed in chunks of any size; the events produced depend only on
/// the ordered bytes fed so far, never on how they were split. A decoder never
/// performs I/O and is never left unusable by bad input.
///
/// # Examples
/// ```
/// use vedirect::text::Decoder;
///
/// let mut decoder = Decoder::new();
/// // no checksum field yet, so nothing is produced
/// assert_eq!(decoder.feed(b"\r\nV\t12353").count(), 0);
/// ```
pub struct Decoder {
    config: DecoderConfig,
    assembler: BlockAssembler,
    events: VecDeque<Event>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Decoder using the default [DecoderConfig].
    #[must_use]
    pub fn new() -> Self {
        let config = DecoderConfig::default();
        Decoder {
            assembler: BlockAssembler::new(&config),
            config,
            events: VecDeque::new(),
        }
    }

    /// # Errors
    /// [Error::Config] if `config` does not validate.
    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Decoder {
            assembler: BlockAssembler::new(&config),
            config,
            events: VecDeque::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Process `dat` and return an iterator draining all queued events, oldest first.
    ///
    /// Every byte is processed before this returns. Events not taken from the
    /// returned iterator remain queued for later calls.
    pub fn feed(&mut self, dat: &[u8]) -> Events<'_> {
        for b in dat {
            if let Some(event) = self.assembler.push(*b) {
                self.events.push_back(event);
            }
        }
        Events {
            queue: &mut self.events,
        }
    }

    /// Drain queued events without feeding more bytes.
    pub fn events(&mut self) -> Events<'_> {
        Events {
            queue: &mut self.events,
        }
    }

    /// Take the oldest queued event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// True if bytes of an unfinished block are buffered.
    #[must_use]
    pub fn in_block(&self) -> bool {
        self.assembler.in_block()
    }

    #[must_use]
    pub fn stats(&self) -> &DecodeStats {
        self.assembler.stats()
    }

    /// Drop any partial block and queued events and wait for the next newline pair,
    /// e.g., when attaching to a new byte source. Stats are kept.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.events.clear();
    }
}

/// Draining iterator over the events queued in a [Decoder].
pub struct Events<'a> {
    queue: &'a mut VecDeque<Event>,
}

impl Iterator for Events<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.queue.len(), Some(self.queue.len()))
    }
}

impl ExactSizeIterator for Events<'_> {}
