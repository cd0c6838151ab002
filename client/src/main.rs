use clap::{Parser, Subcommand};
use client::bot::{self, BotConfig};
use client::game::ClientGameState;
use client::network::{check_capacity, team_status, Connection};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Team, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    server: String,

    /// Player name (no spaces or commas); random if omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// TEAM_A or TEAM_B; the smaller team if omitted
    #[arg(short = 't', long)]
    team: Option<Team>,

    /// Milliseconds to hold each cell
    #[arg(long, default_value = "2500")]
    hold_ms: u64,

    /// Number of cells to hold before leaving
    #[arg(long, default_value = "20")]
    holds: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print server capacity and team sizes, then exit
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Some(Command::Status) = args.command {
        let open = check_capacity(&args.server).await?;
        let (team_a, team_b) = team_status(&args.server).await?;
        println!("Server {}: {}", args.server, if open { "open" } else { "full" });
        println!("TEAM_A: {team_a} players, TEAM_B: {team_b} players");
        return Ok(());
    }

    let mut rng = StdRng::from_entropy();
    let name = args
        .name
        .unwrap_or_else(|| format!("bot{}", rng.gen_range(1000..10000)));
    let team = match args.team {
        Some(team) => team,
        None => {
            let (team_a, team_b) = team_status(&args.server).await?;
            if team_a <= team_b {
                Team::A
            } else {
                Team::B
            }
        }
    };

    info!("Connecting to {} as {} on {}", args.server, name, team);
    let (mut conn, assignment) = Connection::join(&args.server, &name, team).await?;
    let mut state = ClientGameState::new();
    state.apply(&assignment);

    let config = BotConfig {
        hold: Duration::from_millis(args.hold_ms),
        max_holds: args.holds,
    };
    let report = bot::run(&mut conn, &mut state, &config, &mut rng).await?;

    match report.outcome {
        Some(outcome) => info!("Round over after {} holds: {}", report.holds, outcome),
        None => info!("Left after {} holds", report.holds),
    }

    Ok(())
}
