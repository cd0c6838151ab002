//! Per-connection worker.
//!
//! The first frame decides what a connection is. Capacity and team-status
//! queries are answered and the connection closed. `PLAYER_INFO` joins the
//! game; from then on the worker forwards the player's commands to the
//! coordinator and writes everything queued in the session's outbox back
//! onto the socket.

use crate::game::GameCommand;
use crate::registry::{JoinRejected, SessionId};
use log::{debug, info, warn};
use shared::framing::{read_frame, write_frame};
use shared::{ClientCommand, ServerMessage, Team};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

type Commands = mpsc::UnboundedSender<GameCommand>;

fn coordinator_gone() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "game coordinator stopped")
}

/// Serve one connection until the peer leaves or the server closes it.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, commands: Commands) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let first = match read_frame(&mut reader).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("{} closed before sending anything", peer);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match ClientCommand::parse(&first) {
        Ok(ClientCommand::CheckCapacity) => {
            let (reply, answer) = oneshot::channel();
            commands
                .send(GameCommand::CheckCapacity { reply })
                .map_err(|_| coordinator_gone())?;
            let response = if answer.await.map_err(|_| coordinator_gone())? {
                ServerMessage::CapacityOk
            } else {
                ServerMessage::ServerFull
            };
            write_frame(&mut writer, &response.encode()).await?;
        }
        Ok(ClientCommand::TeamStatusRequest) => {
            let (reply, answer) = oneshot::channel();
            commands
                .send(GameCommand::TeamStatus { reply })
                .map_err(|_| coordinator_gone())?;
            let (team_a, team_b) = answer.await.map_err(|_| coordinator_gone())?;
            let response = ServerMessage::TeamStatus { team_a, team_b };
            write_frame(&mut writer, &response.encode()).await?;
        }
        Ok(ClientCommand::PlayerInfo { name, team }) => {
            return run_player(reader, writer, peer, name, team, commands).await;
        }
        Err(e) if first.starts_with("PLAYER_INFO") => {
            warn!("Rejecting join from {}: {}", peer, e);
            write_frame(&mut writer, &ServerMessage::TeamFull.encode()).await?;
        }
        Ok(other) => warn!("{} sent {:?} before joining, closing", peer, other),
        Err(e) => warn!("{} sent malformed first frame {:?}: {}", peer, first, e),
    }

    writer.shutdown().await
}

async fn run_player<S>(
    mut reader: ReadHalf<S>,
    mut writer: WriteHalf<S>,
    peer: SocketAddr,
    name: String,
    team: Team,
    commands: Commands,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, mut outbox) = mpsc::unbounded_channel();
    let (reply, answer) = oneshot::channel();
    commands
        .send(GameCommand::Join {
            name: name.clone(),
            team,
            outbound,
            reply,
        })
        .map_err(|_| coordinator_gone())?;

    let session = match answer.await.map_err(|_| coordinator_gone())? {
        Ok(id) => id,
        Err(rejected) => {
            let response = match rejected {
                JoinRejected::ServerFull => ServerMessage::ServerFull,
                JoinRejected::TeamFull(_) => ServerMessage::TeamFull,
            };
            write_frame(&mut writer, &response.encode()).await?;
            return writer.shutdown().await;
        }
    };
    info!("{} joined as {} from {}", name, session, peer);

    // Frame reads are not cancel-safe, so they live in their own task.
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(async move {
        loop {
            let frame = match read_frame(&mut reader).await {
                // The payload was consumed, so the stream is still frame-aligned.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("{} sent a frame that is not UTF-8: {}", session, e);
                    continue;
                }
                frame => frame,
            };
            let failed = frame.is_err();
            if inbound_tx.send(frame).is_err() || failed {
                break;
            }
        }
    });

    let result = loop {
        tokio::select! {
            frame = inbound.recv() => match frame {
                Some(Ok(text)) => {
                    if !forward(session, &text, &commands) {
                        break Err(coordinator_gone());
                    }
                }
                Some(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break Ok(()),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            },
            message = outbox.recv() => match message {
                Some(text) => {
                    if let Err(e) = write_frame(&mut writer, &text).await {
                        break Err(e);
                    }
                }
                None => {
                    debug!("{} closed by server", session);
                    break Ok(());
                }
            },
        }
    };

    reader_task.abort();
    let _ = commands.send(GameCommand::Leave { session });
    info!("{} ({}) disconnected", name, session);
    let _ = writer.shutdown().await;
    result
}

/// Hand one in-game frame to the coordinator. Returns false once the
/// coordinator is gone.
fn forward(session: SessionId, text: &str, commands: &Commands) -> bool {
    let cmd = match ClientCommand::parse(text) {
        Ok(ClientCommand::HoldStart(cell)) => GameCommand::Hold { session, cell },
        Ok(ClientCommand::HoldEnd(cell)) => GameCommand::Release { session, cell },
        Ok(ClientCommand::Chat(text)) => GameCommand::Chat { session, text },
        Ok(other) => {
            warn!("{} sent {:?} mid-game, ignoring", session, other);
            return true;
        }
        Err(e) => {
            warn!("{} sent malformed frame {:?}: {}", session, text, e);
            return true;
        }
    };
    commands.send(cmd).is_ok()
}
