//! Chunk feeds for streaming sources.
//!
//! A [`Feed`] hands the stream source one chunk at a time. [`ReaderFeed`] reads
//! synchronously from any `Read`; [`ChannelFeed`] receives chunks from a pump thread
//! (see [`spawn_pump`]) so that the event loop can poll it without blocking.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a waiting channel read blocks before giving the caller a chance to
/// observe cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Chunks the pump may queue ahead of the consumer.
const PUMP_QUEUE_DEPTH: usize = 4;

/// Outcome of a single feed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    /// Nothing available right now; the input is still open
    Pending,
    Eof,
}

/// Source of raw chunks for a [`super::StreamSource`].
pub trait Feed: Send {
    /// Read up to `max` bytes. With `wait == false` an implementation that would
    /// block returns [`Chunk::Pending`] instead.
    fn next_chunk(&mut self, max: usize, wait: bool) -> io::Result<Chunk>;
}

/// Feed over a synchronous reader. Reads always block.
pub struct ReaderFeed<R> {
    reader: R,
}

impl<R: Read + Send> ReaderFeed<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read + Send> Feed for ReaderFeed<R> {
    fn next_chunk(&mut self, max: usize, _wait: bool) -> io::Result<Chunk> {
        let mut buf = vec![0u8; max.max(1)];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(Chunk::Eof),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Chunk::Data(buf));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Chunk::Pending),
                Err(err) => return Err(err),
            }
        }
    }
}

/// Feed fed by a background pump thread.
pub struct ChannelFeed {
    rx: Receiver<io::Result<Vec<u8>>>,
}

impl ChannelFeed {
    pub fn new(rx: Receiver<io::Result<Vec<u8>>>) -> Self {
        Self { rx }
    }

    /// Create a feed plus the sending half, for callers that produce chunks themselves.
    pub fn channel(depth: usize) -> (SyncSender<io::Result<Vec<u8>>>, Self) {
        let (tx, rx) = mpsc::sync_channel(depth);
        (tx, Self::new(rx))
    }
}

impl Feed for ChannelFeed {
    fn next_chunk(&mut self, _max: usize, wait: bool) -> io::Result<Chunk> {
        let received = if wait {
            match self.rx.recv_timeout(WAIT_SLICE) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(Chunk::Pending),
                Err(RecvTimeoutError::Disconnected) => return Ok(Chunk::Eof),
            }
        } else {
            match self.rx.try_recv() {
                Ok(chunk) => chunk,
                Err(TryRecvError::Empty) => return Ok(Chunk::Pending),
                Err(TryRecvError::Disconnected) => return Ok(Chunk::Eof),
            }
        };
        received.map(Chunk::Data)
    }
}

/// Spawn a thread that reads `reader` in `chunk_size` pieces and forwards them to
/// the returned feed. `on_ready` runs after every delivered chunk and once at end of
/// input, so an event loop can wake up and pull.
pub fn spawn_pump<R, F>(mut reader: R, chunk_size: usize, on_ready: F) -> (ChannelFeed, JoinHandle<()>)
where
    R: Read + Send + 'static,
    F: Fn() + Send + 'static,
{
    let (tx, feed) = ChannelFeed::channel(PUMP_QUEUE_DEPTH);
    let handle = thread::spawn(move || {
        let mut buf = vec![0u8; chunk_size.max(1)];
        loop {
            let message = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => Ok(buf[..n].to_vec()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => Err(err),
            };
            let failed = message.is_err();
            if tx.send(message).is_err() {
                log::debug!("stream consumer went away, stopping pump");
                return;
            }
            on_ready();
            if failed {
                break;
            }
        }
        drop(tx);
        on_ready();
    });
    (feed, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn reader_feed_chunks_and_eof() {
        let mut feed = ReaderFeed::new(Cursor::new(b"hello world".to_vec()));
        assert_eq!(feed.next_chunk(5, true).unwrap(), Chunk::Data(b"hello".to_vec()));
        assert_eq!(feed.next_chunk(100, false).unwrap(), Chunk::Data(b" world".to_vec()));
        assert_eq!(feed.next_chunk(5, true).unwrap(), Chunk::Eof);
    }

    #[test]
    fn channel_feed_pending_then_data() {
        let (tx, mut feed) = ChannelFeed::channel(2);
        assert_eq!(feed.next_chunk(10, false).unwrap(), Chunk::Pending);
        tx.send(Ok(b"abc".to_vec())).unwrap();
        assert_eq!(feed.next_chunk(10, false).unwrap(), Chunk::Data(b"abc".to_vec()));
        drop(tx);
        assert_eq!(feed.next_chunk(10, true).unwrap(), Chunk::Eof);
    }

    #[test]
    fn channel_feed_forwards_errors() {
        let (tx, mut feed) = ChannelFeed::channel(1);
        tx.send(Err(io::Error::new(io::ErrorKind::Other, "broken pipe")))
            .unwrap();
        assert!(feed.next_chunk(10, true).is_err());
    }

    #[test]
    fn pump_delivers_everything_and_signals() {
        let signals = Arc::new(AtomicUsize::new(0));
        let counter = signals.clone();
        let (mut feed, handle) = spawn_pump(Cursor::new(b"0123456789".to_vec()), 4, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut collected = Vec::new();
        loop {
            match feed.next_chunk(4, true).unwrap() {
                Chunk::Data(bytes) => collected.extend(bytes),
                Chunk::Pending => continue,
                Chunk::Eof => break,
            }
        }
        handle.join().unwrap();

        assert_eq!(collected, b"0123456789");
        // three chunks plus the end-of-input wake-up
        assert_eq!(signals.load(Ordering::SeqCst), 4);
    }
}
