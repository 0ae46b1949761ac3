use anyhow::{Context, Result};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::time::Duration;

pub struct Poller {
    inner: Poll,
    events: Events,
}

impl Poller {
    pub fn new(capacity: usize) -> Result<Self> {
        let inner = Poll::new().context("Error creating poller")?;
        let events = Events::with_capacity(capacity);
        Ok(Self {
            inner,
            events,
        })
    }

    pub fn register<T: AsRawFd>(&mut self, source: &T, token: Token, interest: Interest) -> Result<()> {
        self.inner
            .registry()
            .register(&mut SourceFd(&source.as_raw_fd()), token, interest)
            .context("Error registering event source")
    }

    /// Wait for events, returns the tokens that fired (empty on timeout or signal)
    pub fn poll(&mut self, timeout: Option<Duration>) -> Result<Vec<Token>> {
        match self.inner.poll(&mut self.events, timeout) {
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(Vec::new()),
            status => {
                status.context("Error polling for events")?;
                Ok(self.events.iter().map(|event| event.token()).collect())
            },
        }
    }
}
