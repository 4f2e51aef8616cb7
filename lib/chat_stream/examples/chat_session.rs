use anyhow::Result;
use chat_stream::chat::Update;
use chat_stream::relay_client::RelayClient;
use chat_stream::session::Session;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

// Talks to a running `chat-relay`. Every line read from `stdin` is sent as a user message.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let url = std::env::var("CHAT_RELAY_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:3000/api/chat".to_string());

    let mut session = Session::new(RelayClient::new(url));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        session.set_input(line);
        if !session.submit() {
            continue;
        }

        while let Some(update) = session.next().await {
            match update {
                Update::Appended(text) => {
                    print!("{text}");
                    std::io::stdout().flush()?;
                }
                Update::Finished => println!(),
                Update::Failed(error) => eprintln!("\nError: {error}"),
            }
        }
    }

    Ok(())
}
