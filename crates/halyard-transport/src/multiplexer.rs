//! Readiness multiplexers.
//!
//! A multiplexer reports which registered descriptors have datagrams waiting
//! without the poller touching each socket. Every registration carries a
//! [`Token`] that leads straight back to its registry entry.
//!
//! - [`MioMultiplexer`]: OS readiness through `mio` (epoll/kqueue).
//! - [`ManualMultiplexer`]: readiness supplied by the caller, for driving a
//!   poller from an external event source and for tests.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;
use tracing::debug;

/// Readiness notification over a set of descriptors
pub trait Multiplexer {
    /// Watch `fd` for readability, reporting it as `token`
    fn register(&mut self, fd: RawFd, token: Token) -> io::Result<()>;

    /// Stop watching `fd` and forget any readiness recorded for `token`
    fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()>;

    /// Check readiness now without blocking.
    ///
    /// Adds ready tokens to the ready set and returns its size.
    fn select_now(&mut self) -> io::Result<usize>;

    /// Tokens reported ready since the last [`Multiplexer::reset`]
    fn ready(&self) -> &[Token];

    /// Keep `token` ready for the next selection.
    ///
    /// Called for a source that just produced a datagram and may hold more,
    /// and for readiness observed without receiving.
    /// Level-triggered backends report it again on their own and ignore this.
    fn retain_ready(&mut self, _token: Token) {}

    /// Clear the ready set
    fn reset(&mut self);

    /// Release the underlying OS resource
    fn close(&mut self) -> io::Result<()>;
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "multiplexer is closed")
}

/// `mio`-backed multiplexer.
///
/// `mio` readiness is edge-triggered: a socket is reported once per arrival
/// burst. Sources the poller marks with [`Multiplexer::retain_ready`] are
/// carried into the next selection so queued datagrams are not stranded
/// until another one arrives.
pub struct MioMultiplexer {
    poll: Option<Poll>,
    events: Events,
    ready: Vec<Token>,
    carried: Vec<Token>,
}

impl MioMultiplexer {
    /// Create a multiplexer collecting up to `max_events` events per selection
    ///
    /// # Errors
    /// Returns an error if the OS selector cannot be created.
    pub fn new(max_events: usize) -> io::Result<Self> {
        let max_events = max_events.max(1);
        Ok(Self {
            poll: Some(Poll::new()?),
            events: Events::with_capacity(max_events),
            ready: Vec::with_capacity(max_events * 2),
            carried: Vec::with_capacity(max_events),
        })
    }

    /// Whether [`Multiplexer::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.poll.is_none()
    }

    fn purge(&mut self, token: Token) {
        self.ready.retain(|t| *t != token);
        self.carried.retain(|t| *t != token);
    }
}

impl Multiplexer for MioMultiplexer {
    fn register(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        let poll = self.poll.as_ref().ok_or_else(closed_error)?;
        poll.registry()
            .register(&mut SourceFd(&fd), token, Interest::READABLE)
    }

    fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        self.purge(token);
        let poll = self.poll.as_ref().ok_or_else(closed_error)?;
        poll.registry().deregister(&mut SourceFd(&fd))
    }

    fn select_now(&mut self) -> io::Result<usize> {
        let poll = self.poll.as_mut().ok_or_else(closed_error)?;
        self.events.clear();
        match poll.poll(&mut self.events, Some(Duration::ZERO)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        for token in self.carried.drain(..) {
            if !self.ready.contains(&token) {
                self.ready.push(token);
            }
        }

        for event in self.events.iter() {
            let token = event.token();
            if !self.ready.contains(&token) {
                self.ready.push(token);
            }
        }

        Ok(self.ready.len())
    }

    fn ready(&self) -> &[Token] {
        &self.ready
    }

    fn retain_ready(&mut self, token: Token) {
        if !self.carried.contains(&token) {
            self.carried.push(token);
        }
    }

    fn reset(&mut self) {
        self.ready.clear();
    }

    fn close(&mut self) -> io::Result<()> {
        if self.poll.take().is_some() {
            debug!("Multiplexer closed");
        }
        self.ready.clear();
        self.carried.clear();
        Ok(())
    }
}

impl std::fmt::Debug for MioMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MioMultiplexer")
            .field("closed", &self.is_closed())
            .field("ready", &self.ready.len())
            .field("carried", &self.carried.len())
            .finish()
    }
}

/// Multiplexer whose readiness is supplied by the caller.
///
/// [`ManualMultiplexer::inject_ready`] queues a token for the next selection.
/// Injected readiness is edge-like: it is reported once unless retained.
/// Failures of selection and registration can be scripted.
#[derive(Debug, Default)]
pub struct ManualMultiplexer {
    registered: Vec<(RawFd, Token)>,
    pending: Vec<Token>,
    ready: Vec<Token>,
    selections: usize,
    fail_next_select: Option<io::ErrorKind>,
    fail_next_register: Option<io::ErrorKind>,
    closed: bool,
}

impl ManualMultiplexer {
    /// Create an empty multiplexer
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `token` ready on the next selection
    pub fn inject_ready(&mut self, token: Token) {
        if !self.pending.contains(&token) {
            self.pending.push(token);
        }
    }

    /// Make the next selection fail with `kind`
    pub fn fail_next_select(&mut self, kind: io::ErrorKind) {
        self.fail_next_select = Some(kind);
    }

    /// Make the next registration fail with `kind`
    pub fn fail_next_register(&mut self, kind: io::ErrorKind) {
        self.fail_next_register = Some(kind);
    }

    /// Selections performed so far
    pub fn selections(&self) -> usize {
        self.selections
    }

    /// Whether `token` is currently registered
    pub fn is_registered(&self, token: Token) -> bool {
        self.registered.iter().any(|(_, t)| *t == token)
    }

    /// Number of registered descriptors
    pub fn registered_len(&self) -> usize {
        self.registered.len()
    }

    /// Whether [`Multiplexer::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Multiplexer for ManualMultiplexer {
    fn register(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        if let Some(kind) = self.fail_next_register.take() {
            return Err(io::Error::new(kind, "scripted registration failure"));
        }
        if self.registered.iter().any(|(f, _)| *f == fd) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "descriptor already registered",
            ));
        }
        self.registered.push((fd, token));
        Ok(())
    }

    fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        self.pending.retain(|t| *t != token);
        self.ready.retain(|t| *t != token);
        let before = self.registered.len();
        self.registered.retain(|(f, _)| *f != fd);
        if self.registered.len() == before {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "descriptor not registered",
            ));
        }
        Ok(())
    }

    fn select_now(&mut self) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        if let Some(kind) = self.fail_next_select.take() {
            return Err(io::Error::new(kind, "scripted selection failure"));
        }
        self.selections += 1;
        for token in self.pending.drain(..) {
            if !self.ready.contains(&token) {
                self.ready.push(token);
            }
        }
        Ok(self.ready.len())
    }

    fn ready(&self) -> &[Token] {
        &self.ready
    }

    fn retain_ready(&mut self, token: Token) {
        self.inject_ready(token);
    }

    fn reset(&mut self) {
        self.ready.clear();
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.pending.clear();
        self.ready.clear();
        Ok(())
    }
}
