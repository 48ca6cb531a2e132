use crate::domain::ports::Probe;
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::net::TcpStream;

/// Readiness by TCP connect, the closest host-side stand-in for `pg_isready`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            target: format!("{}:{}", host, port),
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn target(&self) -> &str {
        &self.target
    }

    async fn probe(&self) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        drop(stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new("127.0.0.1", port);
        assert_eq!(probe.target(), format!("127.0.0.1:{}", port));
        assert!(probe.probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(TcpProbe::new("127.0.0.1", port).probe().await.is_err());
    }
}
