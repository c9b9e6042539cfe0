//! roster-watch: terminal front end for a live user roster.
//!
//! Keeps a `RosterClient` replica connected, redraws the table whenever the
//! push channel changes it, and reads form commands from stdin. Reconnects
//! are driven by the client's state watch; Ctrl-C interrupts them.
//!
//! Endpoints come from `ROSTER_API_URL` / `ROSTER_WS_URL`; log output is
//! controlled with `RUST_LOG`.

mod command;
mod render;

use std::future::Future;

use command::{Command, HELP};
use log::{error, info, warn};
use roster_sync::{ChannelEvent, ChannelState, ClientConfig, RosterClient, SyncError};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting roster-watch...");

    if let Err(e) = run().await {
        error!("roster-watch stopped: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), SyncError> {
    let config = ClientConfig::from_env();
    info!("API at {}, events at {}", config.api_url, config.ws_url);

    let mut client = RosterClient::new(config)?;
    let Some(mut events) = client.take_event_rx() else {
        return Ok(());
    };

    let mut state_rx = client.watch_state();

    if let Err(e) = client.connect().await {
        warn!("Initial connect failed: {e}");
        if !reconnect_or_quit(&mut client).await? {
            return Ok(());
        }
    }
    print_roster(&client).await;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                if state == ChannelState::Disconnected {
                    warn!("Push channel lost, reconnecting");
                    if !reconnect_or_quit(&mut client).await? {
                        break;
                    }
                    print_roster(&client).await;
                }
            }
            event = events.recv() => match event {
                Some(event) => handle_event(&client, event).await,
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&client, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("stdin: {e}");
                    break;
                }
            },
        }
    }

    client.close().await;
    info!("roster-watch shut down");
    Ok(())
}

/// Reconnect with backoff. Returns `false` if Ctrl-C came first.
async fn reconnect_or_quit(client: &mut RosterClient) -> Result<bool, SyncError> {
    match unless_interrupted(client.reconnect(), tokio::signal::ctrl_c()).await {
        Some(result) => result.map(|()| true),
        None => Ok(false),
    }
}

/// Run `work` to completion unless `interrupt` finishes first.
async fn unless_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        biased;

        _ = interrupt => None,
        output = work => Some(output),
    }
}

async fn handle_event(client: &RosterClient, event: ChannelEvent) {
    match event {
        ChannelEvent::Connected => info!("Connected"),
        ChannelEvent::Applied(outcome) => {
            if outcome.changed() {
                print_roster(client).await;
            }
        }
        ChannelEvent::EditInvalidated(id) => {
            println!("user {id} was deleted; the form was closed");
        }
        // Reconnection follows the state watch, which never drops a change.
        ChannelEvent::Disconnected => info!("Disconnected"),
    }
}

/// Returns `false` when the user asked to quit.
async fn handle_line(client: &RosterClient, line: &str) -> bool {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(msg) => {
            if !msg.is_empty() {
                println!("{msg}");
            }
            return true;
        }
    };

    match command {
        Command::List => print_roster(client).await,
        Command::New => {
            client.edit().start_create().await;
            print_session(client).await;
        }
        Command::Edit(id) => match client.replica().get(id).await {
            Some(user) => {
                client.edit().start_edit(&user).await;
                print_session(client).await;
            }
            None => println!("no user {id}"),
        },
        Command::Set(field, value) => {
            if client.edit().update_draft(|d| field.assign(d, value)).await {
                print_session(client).await;
            } else {
                println!("no form open (use `new` or `edit <id>`)");
            }
        }
        Command::Save => match client.dispatcher().submit().await {
            // The table redraws when the server's event comes back.
            Ok(kind) => println!("{kind} sent"),
            Err(e) => println!("{e}"),
        },
        Command::Cancel => client.edit().cancel().await,
        Command::Remove(id) => {
            if let Err(e) = client.dispatcher().delete(id).await {
                println!("{e}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

async fn print_roster(client: &RosterClient) {
    let users = client.replica().snapshot().await;
    println!("\n{}", render::table(&users));
    print_session(client).await;
}

async fn print_session(client: &RosterClient) {
    if let Some(session) = client.edit().current().await {
        println!("{}", render::session(&session));
    }
}
