use std::any::Any;

use thiserror::Error;
use topicbus_error::{ErrorExt, StatusCode};

/// Ошибки транспорта ZeroMQ. Наружу выходят только как
/// `StatusCode::Error`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to create {kind} socket: {source}")]
    Socket {
        kind: &'static str,
        source: zmq::Error,
    },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: zmq::Error },

    #[error("failed to connect to {address}: {source}")]
    Connect { address: String, source: zmq::Error },

    #[error("send failed: {0}")]
    Send(#[source] zmq::Error),

    #[error("receive failed: {0}")]
    Recv(#[source] zmq::Error),

    #[error("poll failed: {0}")]
    Poll(#[source] zmq::Error),

    #[error("failed to set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        source: zmq::Error,
    },

    #[error("failed to monitor socket via {address}: {source}")]
    Monitor { address: String, source: zmq::Error },

    #[error("failed to configure transport context: {0}")]
    Context(#[source] zmq::Error),
}

impl TransportError {
    /// Исходная ошибка libzmq.
    pub fn zmq_error(&self) -> zmq::Error {
        match self {
            Self::Socket { source, .. }
            | Self::Bind { source, .. }
            | Self::Connect { source, .. }
            | Self::Monitor { source, .. }
            | Self::SocketOption { source, .. } => *source,
            Self::Send(e) | Self::Recv(e) | Self::Poll(e) | Self::Context(e) => *e,
        }
    }
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Error
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Socket { .. } => "Socket creation failed".to_string(),
            Self::Bind { .. } => "Bind failed".to_string(),
            Self::Connect { .. } => "Connect failed".to_string(),
            Self::Send(_) => "Send failed".to_string(),
            Self::Recv(_) => "Receive failed".to_string(),
            Self::Poll(_) => "Poll failed".to_string(),
            Self::Monitor { .. } => "Socket monitor failed".to_string(),
            Self::SocketOption { .. } => "Socket option rejected".to_string(),
            Self::Context(_) => "Transport context setup failed".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "transport".to_string()),
            ("status_code", self.status_code().code().to_string()),
            ("errno", self.zmq_error().to_raw().to_string()),
        ];

        match self {
            Self::Bind { address, .. }
            | Self::Connect { address, .. }
            | Self::Monitor { address, .. } => {
                tags.push(("address", address.clone()));
            }
            Self::SocketOption { option, .. } => {
                tags.push(("option", option.to_string()));
            }
            _ => {}
        }

        tags
    }
}
