//! Smoke-test client: plays one full round against a running server.
//!
//! Creates a session, joins it, subscribes to its events, starts the
//! round, submits the items in the order the start event lists them,
//! and prints the score and final leaderboard.

use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{GameEvent, Packet};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to probe
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: String,
    /// Quiz reference to play
    #[clap(short, long, default_value = "1")]
    quiz: u32,
    /// Nickname to join with
    #[clap(short, long, default_value = "probe")]
    nickname: String,
}

async fn request(socket: &UdpSocket, packet: &Packet) -> Result<Packet, Box<dyn std::error::Error>> {
    socket.send(&serialize(packet)?).await?;
    recv(socket).await
}

async fn recv(socket: &UdpSocket) -> Result<Packet, Box<dyn std::error::Error>> {
    let mut buffer = [0u8; 8192];
    let len = timeout(Duration::from_secs(5), socket.recv(&mut buffer)).await??;
    Ok(deserialize(&buffer[0..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let control = UdpSocket::bind("0.0.0.0:0").await?;
    control.connect(&args.server).await?;
    let events = UdpSocket::bind("0.0.0.0:0").await?;
    events.connect(&args.server).await?;

    let (code, host_token) = match request(&control, &Packet::CreateSession { quiz_ref: args.quiz }).await? {
        Packet::SessionCreated { code, host_token } => (code, host_token),
        other => return Err(format!("create failed: {other:?}").into()),
    };
    println!("Created session {code}");

    let participant_id = match request(
        &control,
        &Packet::Join {
            code: code.clone(),
            nickname: args.nickname.clone(),
        },
    )
    .await?
    {
        Packet::Joined { participant_id, .. } => participant_id,
        other => return Err(format!("join failed: {other:?}").into()),
    };
    println!("Joined as participant {participant_id}");

    match request(&events, &Packet::Subscribe { code: code.clone() }).await? {
        Packet::Subscribed => {}
        other => return Err(format!("subscribe failed: {other:?}").into()),
    }

    match request(
        &control,
        &Packet::Start {
            code: code.clone(),
            host_token: host_token.clone(),
        },
    )
    .await?
    {
        Packet::Started => println!("Round started"),
        other => return Err(format!("start failed: {other:?}").into()),
    }

    // Wait for the start event to learn the item ids, then submit them
    // in listed order.
    let order = loop {
        match recv(&events).await? {
            Packet::Event {
                event: GameEvent::GameStarted { quiz },
            } => break quiz.items.iter().map(|item| item.id).collect::<Vec<_>>(),
            Packet::Event { event } => println!("(event) {event:?}"),
            other => println!("(unexpected) {other:?}"),
        }
    };

    match request(
        &control,
        &Packet::Submit {
            code: code.clone(),
            participant_id,
            order,
        },
    )
    .await?
    {
        Packet::SubmitResult {
            total_score,
            correct_count,
        } => println!("Scored {total_score} ({correct_count} correct)"),
        other => return Err(format!("submit failed: {other:?}").into()),
    }

    match request(&control, &Packet::Finish { code, host_token }).await? {
        Packet::Finished { leaderboard } => {
            println!("Final leaderboard:");
            for entry in leaderboard {
                println!("  {}. {} - {}", entry.rank, entry.nickname, entry.score);
            }
        }
        other => return Err(format!("finish failed: {other:?}").into()),
    }

    Ok(())
}
