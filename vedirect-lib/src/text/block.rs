use std::mem;

use tracing::{debug, trace};

use super::scanner::{FrameScanner, Scan, State};
use super::{
    ChecksumAccumulator, DecodeError, DecodeStats, DecoderConfig, DuplicatePolicy, Event, Field,
    FramingError, Record, CR, LF,
};

/// Fields of the block being assembled, in first-seen label order.
#[derive(Debug, Default)]
pub(crate) struct FieldBuffer {
    fields: Vec<Field>,
}

impl FieldBuffer {
    fn position(&self, label: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.label == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Insert `field`, replacing the value of an earlier field with the same label.
    /// Returns true if a value was replaced.
    pub fn insert(&mut self, field: Field) -> bool {
        match self.position(&field.label) {
            Some(idx) => {
                self.fields[idx].value = field.value;
                true
            }
            None => {
                self.fields.push(field);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn take(&mut self) -> Vec<Field> {
        mem::take(&mut self.fields)
    }
}

/// Drives a [FrameScanner] and checks the fields it produces against the block
/// limits and checksum, producing at most one [Event] per byte.
pub(crate) struct BlockAssembler {
    scanner: FrameScanner,
    checksum: ChecksumAccumulator,
    fields: FieldBuffer,
    max_fields: usize,
    duplicates: DuplicatePolicy,
    // Block started at a resync rather than a known block boundary
    partial: bool,
    stats: DecodeStats,
}

impl BlockAssembler {
    pub fn new(config: &DecoderConfig) -> Self {
        BlockAssembler {
            scanner: FrameScanner::new(config.max_label_len, config.max_value_len),
            checksum: ChecksumAccumulator::new(),
            fields: FieldBuffer::default(),
            max_fields: config.max_fields,
            duplicates: config.duplicates,
            partial: false,
            stats: DecodeStats::default(),
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub fn in_block(&self) -> bool {
        self.scanner.state() != State::WaitSync
    }

    pub fn push(&mut self, b: u8) -> Option<Event> {
        self.stats.bytes += 1;
        match self.scanner.push(b) {
            Scan::Discard => {
                self.stats.unsynced_bytes += 1;
                None
            }
            Scan::Sync => {
                self.fields.clear();
                self.checksum.reset();
                self.checksum.add(CR);
                self.checksum.add(LF);
                None
            }
            Scan::Byte => {
                self.checksum.add(b);
                None
            }
            Scan::Field(field) => {
                self.checksum.add(b);
                self.insert(field)
            }
            Scan::Checksum(checksum) => {
                self.checksum.add(checksum);
                self.finish(checksum)
            }
            Scan::Error {
                reason,
                bytes,
                block_ended,
            } => {
                // scanner has already resynced
                self.stats.framing_errors += 1;
                let err = DecodeError::Framing {
                    reason,
                    fields: self.fields.len(),
                    bytes,
                };
                Some(self.discard(err, !block_ended))
            }
        }
    }

    fn insert(&mut self, field: Field) -> Option<Event> {
        trace!(label = %field.label, len = field.value.len(), "field");
        if self.duplicates == DuplicatePolicy::Reject && self.fields.contains(&field.label) {
            self.stats.framing_errors += 1;
            self.scanner.resync();
            let err = DecodeError::Framing {
                reason: FramingError::DuplicateLabel { label: field.label },
                fields: self.fields.len(),
                bytes: field.value,
            };
            return Some(self.discard(err, true));
        }

        self.fields.insert(field);
        if self.fields.len() > self.max_fields {
            self.stats.oversized_blocks += 1;
            self.scanner.resync();
            let err = DecodeError::BlockTooLarge {
                fields: self.fields.len(),
                max: self.max_fields,
            };
            return Some(self.discard(err, true));
        }
        None
    }

    fn finish(&mut self, checksum: u8) -> Option<Event> {
        let fields = self.fields.take();
        let byte_count = self.checksum.count();
        let computed = self.checksum.sum();
        let valid = self.checksum.is_valid();
        let partial = mem::take(&mut self.partial);
        self.checksum.reset();

        if valid {
            self.stats.records += 1;
            return Some(Event::Record(Record::new(fields, checksum, byte_count)));
        }
        if partial {
            self.stats.partial_blocks += 1;
            debug!(
                fields = fields.len(),
                byte_count, "dropping partial block following resync"
            );
            return None;
        }

        self.stats.checksum_errors += 1;
        let err = DecodeError::ChecksumMismatch {
            fields: fields.len(),
            byte_count,
            computed,
            checksum,
        };
        debug!("discarding block: {err}");
        Some(Event::Error(err))
    }

    // Drop the current block after the scanner has been resynced. Unless the
    // error ended the block, whatever block follows starts mid-stream and is partial.
    fn discard(&mut self, err: DecodeError, partial: bool) -> Event {
        debug!("discarding block: {err}");
        self.fields.clear();
        self.checksum.reset();
        self.partial = partial;
        Event::Error(err)
    }

    pub fn reset(&mut self) {
        self.scanner.resync();
        self.fields.clear();
        self.checksum.reset();
        self.partial = false;
    }
}
