use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use mio::net::UdpSocket;
use mio::{Interest, Token};

use crate::error::HoverError;
use crate::polling::Poller;
use crate::types::{FeedSample, FEED_VALUES};

/// Size of a feed datagram, big endian f64 values
pub const DATAGRAM_LEN: usize = FEED_VALUES * 8;

const SOCKET: Token = Token(0);
const LISTEN_TIMEOUT: Duration = Duration::from_millis(100);

/// Latest feed sample, published whole by the listener and copied whole by the control loop
#[derive(Default)]
pub struct FeedBoard {
    slot: Mutex<Option<FeedSample>>,
    published: Condvar,
}

impl FeedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: FeedSample) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sample);
        self.published.notify_all();
    }

    pub fn latest(&self) -> Option<FeedSample> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.latest().is_some()
    }

    /// Block until a sample has been published, at most `timeout`
    pub fn wait_sample(&self, timeout: Duration) -> Option<FeedSample> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (slot, _) = self
            .published
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        *slot
    }
}

/// Decode one datagram. Trailing bytes past the sample are ignored.
pub fn decode(datagram: &[u8]) -> Result<FeedSample, HoverError> {
    if datagram.len() < DATAGRAM_LEN {
        return Err(HoverError::Protocol(format!(
            "feed datagram too short: {} bytes, expected {}",
            datagram.len(),
            DATAGRAM_LEN
        )));
    }
    let mut values = [0.0; FEED_VALUES];
    for (value, bytes) in values.iter_mut().zip(datagram.chunks_exact(8)) {
        let mut raw = [0; 8];
        raw.copy_from_slice(bytes);
        *value = f64::from_be_bytes(raw);
    }
    if let Some(index) = values.iter().position(|value| !value.is_finite()) {
        return Err(HoverError::Protocol(format!("feed field {} is not finite: {}", index, values[index])));
    }
    Ok(FeedSample::from_values(values))
}

pub fn encode(values: &[f64; FEED_VALUES]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

/// Receives the motion capture datagrams and publishes them on the board
pub struct FeedListener {
    socket: UdpSocket,
    poller: Poller,
    board: Arc<FeedBoard>,
}

impl FeedListener {
    pub fn bind(addr: SocketAddr, board: Arc<FeedBoard>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).with_context(|| format!("Binding position feed on {}", addr))?;
        let mut poller = Poller::new(8)?;
        poller.register(&socket, SOCKET, Interest::READABLE)?;
        Ok(Self {
            socket,
            poller,
            board,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("Reading position feed address")
    }

    /// Listen until `stop` is raised
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        log::info!("Position feed listening on {}", self.local_addr()?);
        let mut buffer = [0; 512];
        while !stop.load(Ordering::Relaxed) {
            if self.poller.poll(Some(LISTEN_TIMEOUT))?.contains(&SOCKET) {
                self.drain(&mut buffer)?;
            }
        }
        log::info!("Position feed stopped");
        Ok(())
    }

    fn drain(&mut self, buffer: &mut [u8]) -> Result<()> {
        loop {
            match self.socket.recv(buffer) {
                Ok(len) => match decode(&buffer[..len]) {
                    Ok(sample) => self.board.publish(sample),
                    Err(e) => log::warn!("Dropping feed datagram: {}", e),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => return Err(HoverError::Transport(format!("position feed: {}", e)).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const VALUES: [f64; FEED_VALUES] = [1400.0, 1600.0, 1500.0, 1350.0, 0.25, -0.5, -1.1, 1.0, 0.7, 3.0, 4.0];

    #[test]
    fn test_decode_sample() {
        let sample = decode(&encode(&VALUES)).unwrap();
        assert_eq!(sample, FeedSample::from_values(VALUES));
    }

    #[test]
    fn test_decode_rejects_short_datagram() {
        let datagram = encode(&VALUES);
        assert!(matches!(decode(&datagram[..DATAGRAM_LEN - 1]), Err(HoverError::Protocol(_))));
        assert!(matches!(decode(&[]), Err(HoverError::Protocol(_))));
    }

    #[test]
    fn test_decode_rejects_non_finite_fields() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            for index in [0, 4, 8, FEED_VALUES - 1] {
                let mut values = VALUES;
                values[index] = bad;
                assert!(matches!(decode(&encode(&values)), Err(HoverError::Protocol(_))));
            }
        }
    }

    #[test]
    fn test_listener_drops_non_finite_datagram() {
        let board = Arc::new(FeedBoard::new());
        let mut listener = FeedListener::bind("127.0.0.1:0".parse().unwrap(), board.clone()).unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            thread::spawn(move || listener.run(&stop))
        };

        let mut poisoned = VALUES;
        poisoned[4] = f64::NAN;
        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&encode(&poisoned), addr).unwrap();
        assert_eq!(board.wait_sample(Duration::from_millis(200)), None);

        sender.send_to(&encode(&VALUES), addr).unwrap();
        assert_eq!(board.wait_sample(Duration::from_secs(5)), Some(FeedSample::from_values(VALUES)));

        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut datagram = encode(&VALUES);
        datagram.extend_from_slice(&[0xff; 5]);
        assert_eq!(decode(&datagram).unwrap(), FeedSample::from_values(VALUES));
    }

    #[test]
    fn test_board_ready_after_publish() {
        let board = FeedBoard::new();
        assert!(!board.is_ready());
        assert_eq!(board.wait_sample(Duration::from_millis(10)), None);

        let sample = FeedSample::from_values(VALUES);
        board.publish(sample);
        assert!(board.is_ready());
        assert_eq!(board.latest(), Some(sample));
        assert_eq!(board.wait_sample(Duration::from_millis(10)), Some(sample));
    }

    #[test]
    fn test_board_wakes_waiter() {
        let board = Arc::new(FeedBoard::new());
        let publisher = {
            let board = board.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                board.publish(FeedSample::from_values(VALUES));
            })
        };
        let sample = board.wait_sample(Duration::from_secs(5));
        assert_eq!(sample, Some(FeedSample::from_values(VALUES)));
        publisher.join().unwrap();
    }

    #[test]
    fn test_board_never_tears() {
        // every published sample has all fields equal, a torn read would mix two of them
        let board = Arc::new(FeedBoard::new());
        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let board = board.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut n = 0.0;
                while !stop.load(Ordering::Relaxed) {
                    board.publish(FeedSample::from_values([n; FEED_VALUES]));
                    n += 1.0;
                }
            })
        };
        for _ in 0..10_000 {
            if let Some(sample) = board.latest() {
                let n = sample.pilot.roll;
                assert_eq!(sample.pilot.channels(), [n; 4]);
                assert_eq!([sample.position.x, sample.position.y, sample.position.z], [n; 3]);
                assert_eq!(sample.heading, n);
                assert_eq!(sample.aux, [n; 2]);
            }
        }
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }

    #[test]
    fn test_listener_publishes_datagrams() {
        let board = Arc::new(FeedBoard::new());
        let mut listener = FeedListener::bind("127.0.0.1:0".parse().unwrap(), board.clone()).unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            thread::spawn(move || listener.run(&stop))
        };

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[1, 2, 3], addr).unwrap();
        sender.send_to(&encode(&VALUES), addr).unwrap();

        let sample = board.wait_sample(Duration::from_secs(5));
        assert_eq!(sample, Some(FeedSample::from_values(VALUES)));

        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap().unwrap();
    }
}
