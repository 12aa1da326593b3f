//! UDP datagram link
//!
//! Carries one OMVP frame per datagram. Received datagrams are queued and
//! read back as a plain byte stream, which is all the parser needs.

use crate::link::Link;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::debug;

/// Largest datagram accepted from the peer
const MAX_DATAGRAM: usize = 65_535;

/// `fill` stops pulling datagrams once this many bytes are queued; the rest
/// wait in the kernel buffer
const MAX_PENDING: usize = MAX_DATAGRAM;

/// Link setup errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

/// UDP socket used as an OMVP byte link
pub struct UdpLink {
    socket: UdpSocket,
    /// Where frames are sent; learned from the first datagram if not given
    peer: Option<SocketAddr>,
    /// Received bytes not yet read
    pending: VecDeque<u8>,
    /// Datagram receive scratch space
    datagram: Vec<u8>,
}

impl UdpLink {
    /// Bind to `local` and wait for a peer to speak first
    pub fn bind(local: SocketAddr) -> Result<Self, LinkError> {
        let domain = if local.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local.into())?;
        socket.set_nonblocking(true)?;

        Ok(UdpLink {
            socket: socket.into(),
            peer: None,
            pending: VecDeque::new(),
            datagram: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// Bind to `local` and send every frame to `remote`
    pub fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, LinkError> {
        if local.is_ipv4() != remote.is_ipv4() {
            return Err(LinkError::InvalidAddress);
        }
        let mut link = UdpLink::bind(local)?;
        link.peer = Some(remote);
        Ok(link)
    }

    /// Get the local address this link is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.socket.local_addr()?)
    }

    /// Address frames are sent to, once known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Set the kernel receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), LinkError> {
        socket2::SockRef::from(&self.socket).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Pull queued datagrams into `pending`, up to `MAX_PENDING` bytes
    fn fill(&mut self) -> io::Result<()> {
        while self.pending.len() < MAX_PENDING {
            match self.socket.recv_from(&mut self.datagram) {
                Ok((n, from)) => {
                    if self.peer.is_none() {
                        debug!(%from, "peer learned from first datagram");
                        self.peer = Some(from);
                    }
                    self.pending.extend(&self.datagram[..n]);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Link for UdpLink {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.fill()?;
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.len() < buf.len() {
            self.fill()?;
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let peer = self
            .peer
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "no peer address yet"))?;

        let sent = self.socket.send_to(frame, peer)?;
        if sent != frame.len() {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                format!("short datagram: {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }
}
