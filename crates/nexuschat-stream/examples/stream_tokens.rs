use nexuschat_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ChatError> {
    let _ = dotenvy::dotenv();
    nexuschat_core::init_observability();

    let selection = ModelSelection::from_env()?;
    let client = StreamClient::new(ChatConfig::from_env()?)?;
    let request = StreamRequest::from_conversation(
        selection.provider,
        &selection.model,
        vec![
            Message::system("Reply with one short sentence."),
            Message::user("Stream a greeting."),
        ],
    );

    let mut session = client.start(request).await?;
    while let Some(token) = session.next_token().await {
        match token {
            Ok(text) => print!("{text}"),
            Err(err) => eprintln!("stream error: {err}"),
        }
    }
    println!();

    match session.finish().await {
        StreamOutcome::Completed { tokens, .. } => eprintln!("done: {tokens} tokens"),
        outcome => eprintln!("ended: {outcome:?}"),
    }
    Ok(())
}
