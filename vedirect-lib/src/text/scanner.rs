use std::mem;

use super::{Field, FramingError, CHECKSUM_LABEL, CR, LF, TAB};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// Dropping bytes until a newline pair is seen.
    WaitSync,
    ReadLabel,
    ReadValue,
    /// Label was `Checksum`; the next byte is the raw checksum, whatever its value.
    ReadChecksumByte,
}

/// What a single byte pushed through a [FrameScanner] amounted to.
#[derive(Debug, PartialEq)]
pub(crate) enum Scan {
    /// Outside of any block.
    Discard,
    /// Completed the newline pair opening a block. Both newline bytes belong to the block.
    Sync,
    /// Part of the block, nothing completed yet.
    Byte,
    /// Completed a field. The newline pair ending a value also opens the next label.
    Field(Field),
    /// The checksum byte closing the block.
    Checksum(u8),
    /// Broke the framing. The scanner is back to waiting for sync.
    ///
    /// `block_ended` is set when the error hit the `Checksum` label. The next
    /// newline pair then opens a new block.
    Error {
        reason: FramingError,
        bytes: Vec<u8>,
        block_ended: bool,
    },
}

/// Byte-at-a-time tokenizer for the text protocol.
///
/// Labels end at a tab and values end at a newline pair, except for the value of
/// the `Checksum` field which is exactly one byte and is never delimiter scanned.
pub(crate) struct FrameScanner {
    state: State,
    // Previous byte while waiting for sync
    last: Option<u8>,
    label: Vec<u8>,
    value: Vec<u8>,
    max_label_len: usize,
    max_value_len: usize,
}

// Printable ASCII, space included
fn is_label_byte(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

impl FrameScanner {
    pub fn new(max_label_len: usize, max_value_len: usize) -> Self {
        FrameScanner {
            state: State::WaitSync,
            last: None,
            label: Vec::with_capacity(max_label_len),
            value: Vec::with_capacity(max_value_len + 1),
            max_label_len,
            max_value_len,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn push(&mut self, b: u8) -> Scan {
        match self.state {
            State::WaitSync => {
                if self.last == Some(CR) && b == LF {
                    self.last = None;
                    self.begin_label();
                    Scan::Sync
                } else {
                    self.last = Some(b);
                    Scan::Discard
                }
            }
            State::ReadLabel => {
                if b == TAB {
                    if self.label.is_empty() {
                        return self.fail(b, FramingError::EmptyLabel);
                    }
                    self.state = if self.label == CHECKSUM_LABEL {
                        State::ReadChecksumByte
                    } else {
                        State::ReadValue
                    };
                    return Scan::Byte;
                }
                if !is_label_byte(b) {
                    return self.fail(b, FramingError::InvalidLabelByte(b));
                }
                self.label.push(b);
                if self.label.len() > self.max_label_len {
                    let max = self.max_label_len;
                    return self.fail(b, FramingError::LabelTooLong { max });
                }
                Scan::Byte
            }
            State::ReadValue => {
                if b == LF && self.value.last() == Some(&CR) {
                    self.value.pop();
                    let field = Field {
                        label: ascii_string(&self.label),
                        value: mem::take(&mut self.value),
                    };
                    self.begin_label();
                    return Scan::Field(field);
                }
                self.value.push(b);
                // a trailing CR may yet turn out to be a delimiter
                let pending = usize::from(b == CR);
                if self.value.len() - pending > self.max_value_len {
                    let reason = FramingError::ValueTooLong {
                        label: ascii_string(&self.label),
                        max: self.max_value_len,
                    };
                    return self.fail(b, reason);
                }
                Scan::Byte
            }
            State::ReadChecksumByte => {
                self.state = State::WaitSync;
                self.last = None;
                self.label.clear();
                Scan::Checksum(b)
            }
        }
    }

    /// Abandon the current block and wait for the next newline pair.
    pub fn resync(&mut self) {
        self.state = State::WaitSync;
        self.last = None;
        self.label.clear();
        self.value.clear();
    }

    fn begin_label(&mut self) {
        self.state = State::ReadLabel;
        self.label.clear();
        self.value.clear();
    }

    // `b` is remembered so a CR that broke a label can still start the next newline pair.
    fn fail(&mut self, b: u8, reason: FramingError) -> Scan {
        let block_ended =
            self.state == State::ReadLabel && self.label.starts_with(CHECKSUM_LABEL);
        let bytes = if self.state == State::ReadValue {
            mem::take(&mut self.value)
        } else {
            mem::take(&mut self.label)
        };
        self.resync();
        self.last = Some(b);
        Scan::Error {
            reason,
            bytes,
            block_ended,
        }
    }
}

// Labels only ever hold printable ASCII bytes
fn ascii_string(dat: &[u8]) -> String {
    dat.iter().map(|b| char::from(*b)).collect()
}
