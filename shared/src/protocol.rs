//! Text commands exchanged inside each frame.
//!
//! Every frame carries one command: an upper-case keyword followed by
//! space-separated fields. Board snapshots are 100 tokens in row-major order.

use crate::{Cell, CellState, Outcome, Team, CELL_COUNT};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("{command} is missing its {field} field")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("cell ({row}, {col}) is outside the grid")]
    CellOutOfRange { row: usize, col: usize },
    #[error("invalid team `{0}`")]
    InvalidTeam(String),
    #[error("invalid cell token `{0}`")]
    InvalidCellToken(String),
    #[error("{command} expected {expected} entries, found {found}")]
    WrongTokenCount {
        command: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid player name `{0}`")]
    InvalidName(String),
}

/// Commands sent by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Join request; must be the first frame on a game connection.
    PlayerInfo { name: String, team: Team },
    HoldStart(Cell),
    HoldEnd(Cell),
    Chat(String),
    /// One-shot query answered with `OK` or `SERVER_FULL`.
    CheckCapacity,
    /// One-shot query answered with `TEAM_STATUS <a> <b>`.
    TeamStatusRequest,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    TeamAssignment { team: Team, name: String },
    TeamFull,
    ServerFull,
    CapacityOk,
    TeamStatus { team_a: usize, team_b: usize },
    GameState(Vec<CellState>),
    /// Teams currently holding each cell, row-major.
    InitialHeldState(Vec<Vec<Team>>),
    HoldStart { cell: Cell, team: Team },
    HoldEnd { cell: Cell, team: Team },
    TeamScores { team_a: usize, team_b: usize },
    TeamLists { team_a: Vec<String>, team_b: Vec<String> },
    Chat(String),
    GameOver(Outcome),
}

/// Names appear comma-joined in `TEAM_LISTS`, so they may not contain commas.
pub fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || name.contains(',') || name.contains(char::is_whitespace) {
        return Err(ProtocolError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn split_keyword(text: &str) -> Result<(&str, &str), ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(text.split_once(' ').unwrap_or((text, "")))
}

fn next_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    field: &'static str,
) -> Result<&'a str, ProtocolError> {
    fields
        .next()
        .filter(|f| !f.is_empty())
        .ok_or(ProtocolError::MissingField { command, field })
}

fn parse_number(token: &str) -> Result<usize, ProtocolError> {
    token
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber(token.to_string()))
}

fn parse_cell<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<Cell, ProtocolError> {
    let row = parse_number(next_field(fields, command, "row")?)?;
    let col = parse_number(next_field(fields, command, "col")?)?;
    Cell::new(row, col).ok_or(ProtocolError::CellOutOfRange { row, col })
}

fn parse_roster(list: &str) -> Vec<String> {
    if list.is_empty() {
        Vec::new()
    } else {
        list.split(',').map(str::to_string).collect()
    }
}

fn grid_tokens<'a>(rest: &'a str, command: &'static str) -> Result<Vec<&'a str>, ProtocolError> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() != CELL_COUNT {
        return Err(ProtocolError::WrongTokenCount {
            command,
            expected: CELL_COUNT,
            found: tokens.len(),
        });
    }
    Ok(tokens)
}

impl ClientCommand {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let (keyword, rest) = split_keyword(text)?;
        let mut fields = rest.split(' ');
        match keyword {
            "PLAYER_INFO" => {
                let name = next_field(&mut fields, "PLAYER_INFO", "name")?;
                validate_name(name)?;
                let team = next_field(&mut fields, "PLAYER_INFO", "team")?.parse::<Team>()?;
                Ok(ClientCommand::PlayerInfo {
                    name: name.to_string(),
                    team,
                })
            }
            "HOLD_START" => Ok(ClientCommand::HoldStart(parse_cell(&mut fields, "HOLD_START")?)),
            "HOLD_END" => Ok(ClientCommand::HoldEnd(parse_cell(&mut fields, "HOLD_END")?)),
            "CHAT" => Ok(ClientCommand::Chat(rest.to_string())),
            "CHECK_CAPACITY" => Ok(ClientCommand::CheckCapacity),
            "TEAM_STATUS_REQUEST" => Ok(ClientCommand::TeamStatusRequest),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ClientCommand::PlayerInfo { name, team } => format!("PLAYER_INFO {name} {team}"),
            ClientCommand::HoldStart(cell) => format!("HOLD_START {} {}", cell.row(), cell.col()),
            ClientCommand::HoldEnd(cell) => format!("HOLD_END {} {}", cell.row(), cell.col()),
            ClientCommand::Chat(text) => format!("CHAT {text}"),
            ClientCommand::CheckCapacity => "CHECK_CAPACITY".to_string(),
            ClientCommand::TeamStatusRequest => "TEAM_STATUS_REQUEST".to_string(),
        }
    }
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let (keyword, rest) = split_keyword(text)?;
        let mut fields = rest.split(' ');
        match keyword {
            "TEAM_ASSIGNMENT" => {
                let team = next_field(&mut fields, "TEAM_ASSIGNMENT", "team")?.parse::<Team>()?;
                let name = next_field(&mut fields, "TEAM_ASSIGNMENT", "name")?.to_string();
                Ok(ServerMessage::TeamAssignment { team, name })
            }
            "TEAM_FULL" => Ok(ServerMessage::TeamFull),
            "SERVER_FULL" => Ok(ServerMessage::ServerFull),
            "OK" => Ok(ServerMessage::CapacityOk),
            "TEAM_STATUS" => Ok(ServerMessage::TeamStatus {
                team_a: parse_number(next_field(&mut fields, "TEAM_STATUS", "team_a")?)?,
                team_b: parse_number(next_field(&mut fields, "TEAM_STATUS", "team_b")?)?,
            }),
            "GAME_STATE" => grid_tokens(rest, "GAME_STATE")?
                .into_iter()
                .map(str::parse::<CellState>)
                .collect::<Result<Vec<_>, _>>()
                .map(ServerMessage::GameState),
            "INITIAL_HELD_STATE" => grid_tokens(rest, "INITIAL_HELD_STATE")?
                .into_iter()
                .map(|token| match token {
                    "NONE" => Ok(Vec::new()),
                    teams => teams
                        .split(',')
                        .map(str::parse::<Team>)
                        .collect::<Result<Vec<_>, _>>(),
                })
                .collect::<Result<Vec<Vec<Team>>, _>>()
                .map(ServerMessage::InitialHeldState),
            "HOLD_START" => {
                let cell = parse_cell(&mut fields, "HOLD_START")?;
                let team = next_field(&mut fields, "HOLD_START", "team")?.parse::<Team>()?;
                Ok(ServerMessage::HoldStart { cell, team })
            }
            "HOLD_END" => {
                let cell = parse_cell(&mut fields, "HOLD_END")?;
                let team = next_field(&mut fields, "HOLD_END", "team")?.parse::<Team>()?;
                Ok(ServerMessage::HoldEnd { cell, team })
            }
            "TEAM_SCORES" => Ok(ServerMessage::TeamScores {
                team_a: parse_number(next_field(&mut fields, "TEAM_SCORES", "team_a")?)?,
                team_b: parse_number(next_field(&mut fields, "TEAM_SCORES", "team_b")?)?,
            }),
            "TEAM_LISTS" => {
                // Either list may be empty, which leaves adjacent spaces.
                let (a, b) = rest.split_once(' ').unwrap_or((rest, ""));
                Ok(ServerMessage::TeamLists {
                    team_a: parse_roster(a),
                    team_b: parse_roster(b),
                })
            }
            "CHAT" => Ok(ServerMessage::Chat(rest.to_string())),
            "GAME_OVER" => Ok(ServerMessage::GameOver(
                next_field(&mut fields, "GAME_OVER", "winner")?.parse::<Outcome>()?,
            )),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ServerMessage::TeamAssignment { team, name } => format!("TEAM_ASSIGNMENT {team} {name}"),
            ServerMessage::TeamFull => "TEAM_FULL".to_string(),
            ServerMessage::ServerFull => "SERVER_FULL".to_string(),
            ServerMessage::CapacityOk => "OK".to_string(),
            ServerMessage::TeamStatus { team_a, team_b } => {
                format!("TEAM_STATUS {team_a} {team_b}")
            }
            ServerMessage::GameState(cells) => {
                let tokens: Vec<&str> = cells.iter().map(|c| c.as_str()).collect();
                format!("GAME_STATE {}", tokens.join(" "))
            }
            ServerMessage::InitialHeldState(held) => {
                let tokens: Vec<String> = held
                    .iter()
                    .map(|teams| {
                        if teams.is_empty() {
                            "NONE".to_string()
                        } else {
                            let names: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
                            names.join(",")
                        }
                    })
                    .collect();
                format!("INITIAL_HELD_STATE {}", tokens.join(" "))
            }
            ServerMessage::HoldStart { cell, team } => {
                format!("HOLD_START {} {} {team}", cell.row(), cell.col())
            }
            ServerMessage::HoldEnd { cell, team } => {
                format!("HOLD_END {} {} {team}", cell.row(), cell.col())
            }
            ServerMessage::TeamScores { team_a, team_b } => {
                format!("TEAM_SCORES {team_a} {team_b}")
            }
            ServerMessage::TeamLists { team_a, team_b } => {
                format!("TEAM_LISTS {} {}", team_a.join(","), team_b.join(","))
            }
            ServerMessage::Chat(text) => format!("CHAT {text}"),
            ServerMessage::GameOver(outcome) => format!("GAME_OVER {outcome}"),
        }
    }
}
