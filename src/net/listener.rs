//! TCP listener binding with port search.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - When the port is taken, optionally walk forward to the next free one

use std::io::ErrorKind;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::schema::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address '{0}'")]
    Address(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("no free port in {first}..={last}")]
    Exhausted { first: u16, last: u16 },
}

/// Bind per `config`, trying successive ports if enabled.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

    let attempts = if config.port_search {
        config.port_search_attempts.max(1)
    } else {
        1
    };
    let first = addr.port();
    let mut last = first;

    for offset in 0..attempts {
        let Some(port) = first.checked_add(offset) else {
            break;
        };
        last = port;
        let candidate = SocketAddr::new(addr.ip(), port);
        match TcpListener::bind(candidate).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(
                        requested = first,
                        bound = port,
                        "Configured port busy, using next free port"
                    );
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse && offset + 1 < attempts => {
                tracing::debug!(port, "Port in use, trying next");
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => break,
            Err(source) => {
                return Err(ListenerError::Bind {
                    addr: candidate,
                    source,
                })
            }
        }
    }

    Err(ListenerError::Exhausted { first, last })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_walks_past_busy_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let busy = taken.local_addr().unwrap();

        let config = ListenerConfig {
            bind_address: busy.to_string(),
            port_search: true,
            port_search_attempts: 20,
        };
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), busy.port());
    }

    #[tokio::test]
    async fn test_no_search_reports_busy_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ListenerConfig {
            bind_address: taken.local_addr().unwrap().to_string(),
            port_search: false,
            port_search_attempts: 20,
        };
        assert!(matches!(
            bind(&config).await,
            Err(ListenerError::Exhausted { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_garbage_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            ..ListenerConfig::default()
        };
        assert!(matches!(bind(&config).await, Err(ListenerError::Address(_))));
    }
}
