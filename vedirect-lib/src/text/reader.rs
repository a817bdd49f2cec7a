use std::io::{ErrorKind, Read};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use super::{DecodeStats, Decoder, DecoderConfig, Event, Record};
use crate::prelude::*;

const READ_BUFFER_SIZE: usize = 512;

/// Iterates over the [Event]s decoded from a reader.
/// Created using [decode_events].
///
/// ## Errors
/// A read error is produced once and ends the iteration. Reaching EOF simply ends
/// the iteration; a trailing incomplete block never produces an event.
pub struct EventIter<R>
where
    R: Read,
{
    reader: R,
    decoder: Decoder,
    buf: Vec<u8>,
    done: bool,
}

impl<R> EventIter<R>
where
    R: Read,
{
    pub fn new(reader: R, decoder: Decoder) -> Self {
        EventIter {
            reader,
            decoder,
            buf: vec![0u8; READ_BUFFER_SIZE],
            done: false,
        }
    }

    #[must_use]
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Give back the reader and decoder, e.g., to keep decoding after a read error.
    pub fn into_inner(self) -> (R, Decoder) {
        (self.reader, self.decoder)
    }
}

impl<R> Iterator for EventIter<R>
where
    R: Read,
{
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.decoder.poll_event() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    if self.decoder.in_block() {
                        debug!("input ended mid-block; dropping incomplete block");
                    }
                }
                Ok(n) => {
                    // events are queued and taken at the top of the loop
                    self.decoder.feed(&self.buf[..n]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => (),
                Err(err) => {
                    self.done = true;
                    return Some(Err(Error::Io(err)));
                }
            }
        }
    }
}

/// Decode all blocks readable from `reader`.
///
/// `reader` may be anything providing the raw bytes of the serial link, e.g., an
/// already configured tty device or a capture file. Reads of any size are fine.
///
/// # Errors
/// [Error::Config] if `config` does not validate.
///
/// # Examples
/// ```
/// use vedirect::text::{decode_events, DecoderConfig};
///
/// let dat: &[u8] = b"\r\nV\t12800\r\nChecksum\t";
/// let events = decode_events(dat, DecoderConfig::default()).unwrap();
/// // no checksum byte, so the block is incomplete
/// assert_eq!(events.count(), 0);
/// ```
pub fn decode_events<R>(reader: R, config: DecoderConfig) -> Result<EventIter<R>>
where
    R: Read,
{
    Ok(EventIter::new(reader, Decoder::with_config(config)?))
}

/// Decode only the valid [Record]s readable from `reader` using the default config.
/// Rejected blocks are skipped.
///
/// # Errors
/// Read errors are passed on.
pub fn decode_records<R>(reader: R) -> impl Iterator<Item = Result<Record>>
where
    R: Read,
{
    EventIter::new(reader, Decoder::new()).filter_map(|zult| match zult {
        Ok(Event::Record(record)) => Some(Ok(record)),
        Ok(Event::Error(_)) => None,
        Err(err) => Some(Err(err)),
    })
}

/// Decode `reader` on a background thread.
///
/// The thread hands events to the returned [EventStream] over a bounded channel, so
/// a slow consumer eventually blocks the reader rather than growing a queue.
///
/// # Errors
/// [Error::Config] if `config` does not validate, or [Error::Io] if the thread cannot
/// be spawned.
pub fn spawn_decoder<R>(reader: R, config: DecoderConfig) -> Result<EventStream>
where
    R: Read + Send + 'static,
{
    let decoder = Decoder::with_config(config)?;
    let (events_tx, events_rx) = bounded(EventStream::DEFAULT_BUFFER_SIZE);
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

    let handle = thread::Builder::new()
        .name("vedirect_decoder".into())
        .spawn(move || read_loop(reader, decoder, &events_tx, &shutdown_rx))?;

    Ok(EventStream {
        events: events_rx,
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
        stats: None,
    })
}

fn read_loop<R>(
    mut reader: R,
    mut decoder: Decoder,
    events: &Sender<Result<Event>>,
    shutdown: &Receiver<()>,
) -> DecodeStats
where
    R: Read,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        // Nothing is ever sent on shutdown; the stream disconnects it to stop us.
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            debug!("shutdown requested");
            break;
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                if decoder.in_block() {
                    debug!("input ended mid-block; dropping incomplete block");
                }
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                if events.send(Err(Error::Io(err))).is_err() {
                    debug!("failed to send read error");
                }
                break;
            }
        };

        let mut disconnected = false;
        for event in decoder.feed(&buf[..n]) {
            if events.send(Ok(event)).is_err() {
                disconnected = true;
                break;
            }
        }
        if disconnected {
            debug!("event receiver dropped");
            break;
        }
    }
    decoder.stats().clone()
}

/// Events decoded on a background thread, see [spawn_decoder].
///
/// Iteration blocks until the next event is available and ends when the reader is
/// exhausted or fails. Dropping the stream stops the thread after its current read.
pub struct EventStream {
    events: Receiver<Result<Event>>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<DecodeStats>>,
    stats: Option<DecodeStats>,
}

impl EventStream {
    pub const DEFAULT_BUFFER_SIZE: usize = 1024;

    /// Final decoder stats, available once the stream has ended.
    #[must_use]
    pub fn stats(&self) -> Option<&DecodeStats> {
        self.stats.as_ref()
    }

    /// Stop the background thread and wait for it to exit, returning the final stats.
    ///
    /// Undelivered events are dropped. This blocks until the thread's current read
    /// returns.
    pub fn close(mut self) -> Option<DecodeStats> {
        self.shutdown.take();
        // drain so the thread is never stuck on a full channel
        for _ in self.events.iter() {}
        self.join();
        self.stats.take()
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(stats) => self.stats = Some(stats),
                Err(_) => debug!("decoder thread panicked"),
            }
        }
    }
}

impl Iterator for EventStream {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        // recv blocks current thread until data is available.
        match self.events.recv() {
            Ok(zult) => Some(zult),
            Err(_) => {
                self.join();
                None
            }
        }
    }
}
