//! Reads a role-marked conversation from a file (or stdin), streams the
//! answer into it and prints the updated document.
//!
//! ```text
//! NEXUSCHAT_PROVIDER=openai cargo run --example stream_chat -- chat.txt
//! ```
use std::io::Read as _;

use nexuschat_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    nexuschat_core::init_observability();

    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let client = StreamClient::new(ChatConfig::from_env()?)?;
    let runner = ConversationRunner::new(client, ModelSelection::from_env()?);
    let mut document = TextDocument::new(text);

    let outcome = runner.run_query(&mut document).await?;
    println!("{}", document.as_str());
    eprintln!("{outcome:?}");
    Ok(())
}
