//! # droprain
//!
//! Demo driver: two simulated players on one backend play a short
//! multiplayer round, then the result board and the overall leaderboard
//! are printed.

use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tokio::time::{interval, Instant};
use tracing::info;

use droprain_client::auth::AuthContext;
use droprain_client::config::ClientConfig;
use droprain_client::leaderboard::{Leaderboard, DEFAULT_LIMIT};
use droprain_client::multiplayer::MultiplayerGame;
use droprain_client::rooms::RoomManager;
use droprain_client::scores::ResultBoard;
use droprain_client::{init_tracing, open_backend, ClientError, SharedBackend};
use droprain_shared::Difficulty;

const DEMO_PASSWORD: &str = "rainy-day";
const ROUND_LENGTH: Duration = Duration::from_secs(12);
const FRAME: Duration = Duration::from_millis(16);

/// Sign up, or sign in when the nickname already exists in a persistent db.
async fn player(backend: &SharedBackend, nickname: &str) -> anyhow::Result<AuthContext> {
    let mut auth = AuthContext::new(backend.clone());
    match auth.sign_up(nickname, DEMO_PASSWORD, DEMO_PASSWORD).await {
        Ok(_) => {}
        Err(ClientError::NicknameTaken) => {
            auth.sign_in(nickname, DEMO_PASSWORD).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(auth)
}

/// A simulated player's reaction for one frame: usually the lowest
/// droplet's answer, sometimes a wrong guess, most frames nothing.
fn react(game: &MultiplayerGame, skill: f64) -> Option<u32> {
    let mut rng = rand::thread_rng();
    if game.field().is_empty() || !rng.gen_bool(0.02) {
        return None;
    }
    let lowest = game
        .field()
        .droplets()
        .iter()
        .max_by(|a, b| a.y.total_cmp(&b.y))?;
    if rng.gen_bool(skill) {
        Some(lowest.answer)
    } else {
        Some(rng.gen_range(1..=81))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing, configuration, backend
    // -----------------------------------------------------------------------
    init_tracing();
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");
    let backend = open_backend(&config).context("opening backend")?;

    // -----------------------------------------------------------------------
    // 2. Players and room
    // -----------------------------------------------------------------------
    let host_auth = player(&backend, "rainhost").await?;
    let guest_auth = player(&backend, "rainguest").await?;
    let host = host_auth.require_user()?.id;
    let guest = guest_auth.require_user()?.id;

    let rooms = RoomManager::new(backend.clone());
    let room = rooms.create_room(host, Difficulty::Easy, None).await?;
    info!(code = %room.room_code, "room created");
    rooms
        .join_room_by_code(&room.room_code.to_lowercase(), guest)
        .await?;
    let room = rooms.start_game(room.id, host).await?;

    // -----------------------------------------------------------------------
    // 3. Play
    // -----------------------------------------------------------------------
    let mut host_game = MultiplayerGame::start(backend.clone(), room.clone(), host, &config).await?;
    let mut guest_game =
        MultiplayerGame::start(backend.clone(), room.clone(), guest, &config).await?;

    let started = Instant::now();
    let mut ticker = interval(FRAME);
    while started.elapsed() < ROUND_LENGTH {
        ticker.tick().await;
        let now = Instant::now();

        let mut finished = 0;
        for (game, skill) in [(&mut host_game, 0.9), (&mut guest_game, 0.7)] {
            if game.frame(now).game_over || game.engine().is_over() {
                finished += 1;
                continue;
            }
            if let Some(answer) = react(game, skill) {
                game.submit_answer(answer, now);
            }
        }
        if finished == 2 {
            break;
        }
    }

    for line in guest_game.scoreboard() {
        info!(nickname = %line.nickname, score = line.score, me = line.is_me, "scoreboard");
    }

    // -----------------------------------------------------------------------
    // 4. Save and show results
    // -----------------------------------------------------------------------
    let saves = futures::future::join_all([host_game.finish(), guest_game.finish()]).await;
    for save in &saves {
        if let Some(notice) = &save.notice {
            eprintln!("{notice}");
        }
    }
    rooms.finish_game(room.id, host).await?;

    let mut board = ResultBoard::spawn(backend.clone(), room.id, &config);
    let ranked = board.changed().await.unwrap_or_default();
    println!("Round results");
    for r in &ranked {
        println!(
            "  #{} {:<12} {:>5} pts  {:>5.1}%  {}",
            r.rank,
            r.nickname,
            r.score,
            r.accuracy,
            "*".repeat(r.grade as usize)
        );
    }

    let overall = Leaderboard::new(backend.clone()).overall(DEFAULT_LIMIT).await?;
    println!("Overall leaderboard");
    println!("{}", serde_json::to_string_pretty(&overall)?);

    Ok(())
}
