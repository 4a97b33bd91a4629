//! Switchboard CLI binary entry point.

use std::io::{BufRead, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use switchboard::cli::Cli;
use switchboard::client::OrchestrationClient;
use switchboard::config::Config;
use switchboard::provider::anthropic::AnthropicProvider;
use switchboard::registry::ServerKind;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("switchboard=info".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Classify every endpoint up front so a typo in the last argument does
    // not leave earlier servers running.
    for script in &cli.server_scripts {
        ServerKind::classify(script)?;
    }

    let config = Config::from_env()?;
    let provider = AnthropicProvider::new(cli.model, config.api_key, config.base_url);
    let mut client = OrchestrationClient::new(Box::new(provider), cli.max_tokens);

    for script in &cli.server_scripts {
        match client.connect(script).await {
            Ok(id) => {
                let tools = client.tool_names(&id).unwrap_or_default();
                println!(
                    "Connected to {} ({}) with tools: {}",
                    id,
                    script.display(),
                    tools.join(", ")
                );
            }
            Err(e) => {
                client.shutdown().await;
                return Err(e.into());
            }
        }
    }

    let result = chat_loop(&mut client).await;
    client.shutdown().await;
    result.map_err(Into::into)
}

async fn chat_loop(client: &mut OrchestrationClient) -> switchboard::Result<()> {
    println!("\nMCP client started. Type your queries or 'quit' to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("\nQuery: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        let mut sink = |chunk: &str| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        };
        match client.ask(query, &mut sink).await {
            Ok(_) => println!(),
            Err(e) => eprintln!("\nError: {e}"),
        }
    }

    Ok(())
}
