use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::config::TcpConfig;
use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// TCP transport.
///
/// The device side binds and accepts; the host side connects, retrying a
/// bounded number of times because the device is usually started separately.
pub struct TcpLink {
    listener: TcpListener,
    config: TcpConfig,
}

impl TcpLink {
    /// Bind and listen on `config.address`.
    pub fn bind(config: &TcpConfig) -> Result<Self> {
        let listener =
            TcpListener::bind(&config.address).map_err(|source| TransportError::Bind {
                addr: config.address.clone(),
                source,
            })?;
        info!(addr = %config.address, "listening for host connection");
        Ok(Self {
            listener,
            config: config.clone(),
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(self.config.nodelay)?;
        info!(%peer, "accepted host connection");
        Ok(LinkStream::from_tcp(stream))
    }

    /// Connect to a listening device, retrying per `config`.
    pub fn connect(config: &TcpConfig) -> Result<LinkStream> {
        let attempts = config.attempts.max(1);
        for attempt in 1..=attempts {
            if attempt != 1 {
                debug!(attempt, delay = ?config.retry_delay, "retrying connection");
                std::thread::sleep(config.retry_delay);
            }
            match TcpStream::connect(&config.address) {
                Ok(stream) => {
                    stream.set_nodelay(config.nodelay)?;
                    info!(addr = %config.address, attempt, "connected to device");
                    return Ok(LinkStream::from_tcp(stream));
                }
                Err(source) if attempts == 1 => {
                    return Err(TransportError::Connect {
                        addr: config.address.clone(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(addr = %config.address, attempt, error = %err, "unable to connect");
                }
            }
        }
        Err(TransportError::RetriesExhausted {
            addr: config.address.clone(),
            attempts,
        })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;

    fn ephemeral() -> TcpConfig {
        TcpConfig::with_address("127.0.0.1:0")
    }

    #[test]
    fn bind_accept_connect() {
        let link = TcpLink::bind(&ephemeral()).unwrap();
        let addr = link.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let mut client = TcpLink::connect(&TcpConfig::with_address(addr.to_string())).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = link.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn connect_gives_up_after_configured_attempts() {
        // Bind then drop to find a port nobody listens on.
        let addr = {
            let link = TcpLink::bind(&ephemeral()).unwrap();
            link.local_addr().unwrap()
        };

        let config = TcpConfig {
            address: addr.to_string(),
            attempts: 2,
            retry_delay: Duration::from_millis(1),
            nodelay: true,
        };
        let err = TcpLink::connect(&config).unwrap_err();
        assert!(matches!(
            err,
            TransportError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn single_attempt_reports_connect_error() {
        let addr = {
            let link = TcpLink::bind(&ephemeral()).unwrap();
            link.local_addr().unwrap()
        };
        let config = TcpConfig {
            attempts: 1,
            ..TcpConfig::with_address(addr.to_string())
        };
        assert!(matches!(
            TcpLink::connect(&config),
            Err(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn bind_rejects_bad_address() {
        let result = TcpLink::bind(&TcpConfig::with_address("not-an-address"));
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
