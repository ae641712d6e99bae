//! Connected client and server engines over [`memory_pair`].

use rsframe::{ConnectionError, Connector, Requester, Server, memory_pair};

/// Frames buffered in each direction of the in-memory transport.
pub const DEFAULT_CAPACITY: usize = 64;

/// Connect `connector` to `server` in-process.
///
/// Returns the client's requester and the server's requester for the same
/// connection.
///
/// # Errors
///
/// Returns the first failure of either side's setup.
pub async fn connect_pair(connector: &Connector, server: &Server) -> Result<(Requester, Requester), ConnectionError> {
    let (client_io, server_io) = memory_pair(DEFAULT_CAPACITY);
    let (client, accepted) = tokio::join!(connector.connect(client_io), server.accept_connection(server_io));
    Ok((client?, accepted?))
}
