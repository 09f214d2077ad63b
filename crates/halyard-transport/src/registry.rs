//! Registry of polled (endpoint, transport) pairs.
//!
//! The ordered list is copy-on-write: register and cancel build a new
//! snapshot, and the poll loop holds the snapshot it started a tick with.
//! A slab keyed by multiplexer [`Token`] maps readiness straight back to the
//! registration without scanning.

use mio::Token;
use slab::Slab;
use std::os::fd::RawFd;
use std::sync::Arc;

use crate::endpoint::ReceiveChannelEndpoint;
use crate::transport::ReceiveTransport;

/// One polled datagram path. Never mutated after creation.
pub struct Registration {
    endpoint: Arc<dyn ReceiveChannelEndpoint>,
    transport: Arc<dyn ReceiveTransport>,
    transport_index: usize,
    token: Token,
    fd: RawFd,
}

impl Registration {
    pub(crate) fn new(
        endpoint: Arc<dyn ReceiveChannelEndpoint>,
        transport: Arc<dyn ReceiveTransport>,
        transport_index: usize,
        token: Token,
        fd: RawFd,
    ) -> Self {
        Self {
            endpoint,
            transport,
            transport_index,
            token,
            fd,
        }
    }

    /// Endpoint frames from this transport are dispatched to
    pub fn endpoint(&self) -> &Arc<dyn ReceiveChannelEndpoint> {
        &self.endpoint
    }

    /// Transport polled for datagrams
    pub fn transport(&self) -> &Arc<dyn ReceiveTransport> {
        &self.transport
    }

    /// Index of the transport within its endpoint
    pub fn transport_index(&self) -> usize {
        self.transport_index
    }

    /// Multiplexer token identifying this registration
    pub fn token(&self) -> Token {
        self.token
    }

    /// Descriptor registered with the multiplexer
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Identity match against a live endpoint and transport.
    ///
    /// Compares object addresses, never values.
    pub fn matches(
        &self,
        endpoint: &dyn ReceiveChannelEndpoint,
        transport: &dyn ReceiveTransport,
    ) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.endpoint), endpoint)
            && std::ptr::addr_eq(Arc::as_ptr(&self.transport), transport)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("transport_index", &self.transport_index)
            .field("token", &self.token)
            .field("fd", &self.fd)
            .finish()
    }
}

/// Handle returned by a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(pub(crate) Token);

impl RegistrationToken {
    /// Multiplexer token backing this registration
    pub fn token(&self) -> Token {
        self.0
    }
}

/// Ordered registrations plus token lookup
pub struct TransportRegistry {
    entries: Arc<[Arc<Registration>]>,
    attachments: Slab<Arc<Registration>>,
}

impl TransportRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
            attachments: Slab::new(),
        }
    }

    /// Number of registrations
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current snapshot in registration order
    #[inline]
    pub fn snapshot(&self) -> Arc<[Arc<Registration>]> {
        Arc::clone(&self.entries)
    }

    /// Token the next inserted registration will get
    pub fn vacant_token(&self) -> Token {
        Token(self.attachments.vacant_key())
    }

    /// Append a registration created with [`TransportRegistry::vacant_token`]
    pub fn insert(&mut self, registration: Arc<Registration>) -> Token {
        let key = self.attachments.insert(Arc::clone(&registration));
        debug_assert_eq!(Token(key), registration.token());

        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend(self.entries.iter().cloned());
        entries.push(registration);
        self.entries = Arc::from(entries);

        Token(key)
    }

    /// Position of the registration matching both identities
    pub fn position(
        &self,
        endpoint: &dyn ReceiveChannelEndpoint,
        transport: &dyn ReceiveTransport,
    ) -> Option<usize> {
        self.entries
            .iter()
            .position(|reg| reg.matches(endpoint, transport))
    }

    /// Remove the registration at `index`, preserving the order of the rest
    pub fn remove(&mut self, index: usize) -> Option<Arc<Registration>> {
        let removed = self.entries.get(index).cloned()?;

        let entries: Vec<_> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, reg)| Arc::clone(reg))
            .collect();
        self.entries = Arc::from(entries);
        self.attachments.try_remove(removed.token().0);

        Some(removed)
    }

    /// Registration attached to `token`
    #[inline]
    pub fn attachment(&self, token: Token) -> Option<&Arc<Registration>> {
        self.attachments.get(token.0)
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.entries.iter()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("len", &self.len())
            .finish()
    }
}
