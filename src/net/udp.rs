//! UDP socket setup for the audio, control, and timing channels.

use std::io;

use tokio::net::UdpSocket;

/// Bind a UDP socket, preferring `port` but falling back to an OS-assigned ephemeral port if
/// `port` is already in use. Returns the bound socket and the port it actually landed on.
pub async fn bind_preferred(preferred_port: u16) -> io::Result<(UdpSocket, u16)> {
    match UdpSocket::bind(("0.0.0.0", preferred_port)).await {
        Ok(socket) => {
            let port = socket.local_addr()?.port();
            Ok((socket, port))
        }
        Err(_) => {
            let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
            let port = socket.local_addr()?.port();
            Ok((socket, port))
        }
    }
}

/// Connect a UDP socket to the receiver's address on `port`, so that `send`/`recv` (rather than
/// `send_to`/`recv_from`) can be used for the rest of that channel's lifetime.
pub async fn connect(socket: &UdpSocket, host: &str, port: u16) -> io::Result<()> {
    socket.connect((host, port)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_to_ephemeral_port_when_zero_requested() {
        let (_socket, port) = bind_preferred(0).await.unwrap();
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn falls_back_to_ephemeral_when_preferred_port_is_taken() {
        let (held, held_port) = bind_preferred(0).await.unwrap();
        let (_socket, port) = bind_preferred(held_port).await.unwrap();
        assert_ne!(port, held_port);
        drop(held);
    }
}
