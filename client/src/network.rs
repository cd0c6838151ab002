use log::{debug, warn};
use shared::framing::{read_frame, write_frame};
use shared::{ClientCommand, ProtocolError, ServerMessage, Team};
use std::io;
use thiserror::Error;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] io::Error),
    #[error("bad message from server: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("the requested team is full")]
    TeamFull,
    #[error("the server is full")]
    ServerFull,
    #[error("unexpected reply `{0}`")]
    UnexpectedReply(String),
    #[error("server closed the connection")]
    Closed,
}

/// A joined game session.
///
/// Incoming frames are read by a background task, so [`Connection::recv`]
/// can be raced against timers.
pub struct Connection {
    writer: OwnedWriteHalf,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    reader_task: JoinHandle<()>,
}

impl Connection {
    /// Connect and ask to join `team`. Returns the connection and the
    /// assignment message, which the caller usually feeds into its state.
    pub async fn join<A: ToSocketAddrs>(
        addr: A,
        name: &str,
        team: Team,
    ) -> Result<(Self, ServerMessage), ClientError> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let request = ClientCommand::PlayerInfo {
            name: name.to_string(),
            team,
        };
        write_frame(&mut stream, &request.encode()).await?;

        let reply = ServerMessage::parse(&read_frame(&mut stream).await?)?;
        match reply {
            ServerMessage::TeamAssignment { .. } => {}
            ServerMessage::TeamFull => return Err(ClientError::TeamFull),
            ServerMessage::ServerFull => return Err(ClientError::ServerFull),
            other => return Err(ClientError::UnexpectedReply(other.encode())),
        }

        let (mut reader, writer) = stream.into_split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(async move {
            loop {
                let text = match read_frame(&mut reader).await {
                    Ok(text) => text,
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading from server: {}", e);
                        break;
                    }
                };
                match ServerMessage::parse(&text) {
                    Ok(message) => {
                        if inbound_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed message {:?}: {}", text, e),
                }
            }
        });

        Ok((
            Connection {
                writer,
                inbound,
                reader_task,
            },
            reply,
        ))
    }

    pub async fn send(&mut self, command: &ClientCommand) -> Result<(), ClientError> {
        write_frame(&mut self.writer, &command.encode()).await?;
        Ok(())
    }

    /// Next message from the server. Cancel-safe.
    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        self.inbound.recv().await.ok_or(ClientError::Closed)
    }

    /// A message that has already arrived, if any.
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        self.inbound.try_recv().ok()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn query<A: ToSocketAddrs>(
    addr: A,
    command: ClientCommand,
) -> Result<ServerMessage, ClientError> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, &command.encode()).await?;
    let text = read_frame(&mut stream).await?;
    Ok(ServerMessage::parse(&text)?)
}

/// Ask whether another player could join right now.
pub async fn check_capacity<A: ToSocketAddrs>(addr: A) -> Result<bool, ClientError> {
    match query(addr, ClientCommand::CheckCapacity).await? {
        ServerMessage::CapacityOk => Ok(true),
        ServerMessage::ServerFull => Ok(false),
        other => Err(ClientError::UnexpectedReply(other.encode())),
    }
}

/// Current player counts as `(team A, team B)`.
pub async fn team_status<A: ToSocketAddrs>(addr: A) -> Result<(usize, usize), ClientError> {
    match query(addr, ClientCommand::TeamStatusRequest).await? {
        ServerMessage::TeamStatus { team_a, team_b } => Ok((team_a, team_b)),
        other => Err(ClientError::UnexpectedReply(other.encode())),
    }
}
