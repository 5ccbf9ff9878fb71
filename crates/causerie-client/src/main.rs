mod net;
mod session;

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use causerie_shared::frame::{Frame, MessageType};

use crate::net::Client;

const HELP: &str = "Commands:
  /login <clientID> <password> <server-IP> <server-port>
  /logout
  /joinsession <sessionID>
  /leavesession         (leaves the active session)
  /createsession <sessionID>
  /switchsession <sessionID>   (switch active session)
  /list
  /quit
  <text>   (sends a message to the active session)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("Causerie conferencing client");
    println!("{HELP}\n");

    let mut client: Option<Client> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // a dead connection is reported once, at the prompt
        if client.as_ref().is_some_and(|c| !c.is_alive()) {
            println!("Connection lost; you are logged out.");
            client = None;
        }

        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");

        match command {
            "/login" => {
                if client.is_some() {
                    println!("Already logged in.");
                    continue;
                }
                let (Some(id), Some(password), Some(host), Some(port)) =
                    (words.next(), words.next(), words.next(), words.next())
                else {
                    println!("Usage: /login <clientID> <password> <server-IP> <server-port>");
                    continue;
                };
                let Ok(port) = port.parse::<u16>() else {
                    println!("Port must be a number.");
                    continue;
                };
                match Client::login(id, password, host, port).await {
                    Ok(connected) => {
                        println!("Login successful.");
                        client = Some(connected);
                    }
                    Err(e) => println!("{e:#}"),
                }
            }

            "/logout" => match client.take() {
                Some(connected) => {
                    connected.logout().await;
                    println!("Logged out.");
                }
                None => println!("Not logged in."),
            },

            "/joinsession" => {
                let Some(sid) = words.next() else {
                    println!("Usage: /joinsession <sessionID>");
                    continue;
                };
                if let Some(c) = client.as_mut() {
                    let frame = Frame::new(MessageType::Join, "", "", sid.as_bytes().to_vec());
                    let _ = c.send(frame).await;
                } else {
                    println!("You must be logged in first.");
                }
            }

            "/leavesession" => {
                let Some(c) = client.as_mut() else {
                    println!("You must be logged in first.");
                    continue;
                };
                let left = c.tracker.lock().ok().and_then(|mut t| t.leave_active());
                match left {
                    Some(sid) => {
                        let frame = Frame::new(MessageType::LeaveSession, "", sid.as_str(), Vec::new());
                        let _ = c.send(frame).await;
                        println!("Left session: {sid}");
                    }
                    None => println!("No active session to leave."),
                }
            }

            "/createsession" => {
                let Some(sid) = words.next() else {
                    println!("Usage: /createsession <sessionID>");
                    continue;
                };
                if let Some(c) = client.as_mut() {
                    let frame = Frame::new(MessageType::NewSession, "", "", sid.as_bytes().to_vec());
                    let _ = c.send(frame).await;
                } else {
                    println!("You must be logged in first.");
                }
            }

            "/switchsession" => {
                let Some(sid) = words.next() else {
                    println!("Usage: /switchsession <sessionID>");
                    continue;
                };
                let Some(c) = client.as_ref() else {
                    println!("You must be logged in first.");
                    continue;
                };
                let switched = c.tracker.lock().map(|mut t| t.switch(sid)).unwrap_or(false);
                if switched {
                    println!("Switched active session to: {sid}");
                } else {
                    println!("You are not part of session {sid}.");
                }
            }

            "/list" => {
                if let Some(c) = client.as_mut() {
                    let _ = c.send(Frame::reply(MessageType::Query, Vec::new())).await;
                } else {
                    println!("You must be logged in first.");
                }
            }

            "/quit" => {
                if let Some(connected) = client.take() {
                    connected.logout().await;
                }
                println!("Exiting client.");
                break;
            }

            _ if command.starts_with('/') => {
                println!("Unknown command.");
                println!("{HELP}");
            }

            // bare text goes to the active session
            _ => {
                let Some(c) = client.as_mut() else {
                    println!("You must be logged in to send messages.");
                    continue;
                };
                let Some(sid) = c.tracker.lock().ok().and_then(|t| t.active().map(str::to_owned))
                else {
                    println!(
                        "No active session selected. Use /joinsession, /createsession, or /switchsession."
                    );
                    continue;
                };
                let frame = Frame::new(
                    MessageType::Message,
                    c.id.as_str(),
                    sid.as_str(),
                    line.as_bytes().to_vec(),
                );
                let _ = c.send(frame).await;
            }
        }
    }

    Ok(())
}
