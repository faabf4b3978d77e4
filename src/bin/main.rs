use goldn_max::{
    bootstrap::{build_session, spawn_local_init},
    config::AssistantConfig,
    session::SessionObserver,
    voice::{LogSpeechSink, SpeechController, SpeechOutput},
    SubmitOutcome,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Terminal transcript: streams deltas inline, prints status lines to stderr
#[derive(Default)]
struct TerminalObserver {
    streaming: AtomicBool,
}

impl SessionObserver for TerminalObserver {
    fn on_delta(&self, delta: &str) {
        if !self.streaming.swap(true, Ordering::AcqRel) {
            print!("max> ");
        }
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    }

    fn on_final_reply(&self, reply: &str) {
        if self.streaming.swap(false, Ordering::AcqRel) {
            println!();
        } else {
            println!("max> {}", reply);
        }
    }

    fn on_status_change(&self, status: &str) {
        eprintln!("[{}]", status);
    }
}

fn print_help() {
    println!("Type a message and press Enter.");
    println!("  remember <fact>   store a fact");
    println!("  show memory       list stored facts");
    println!("  /mute             toggle speech output");
    println!("  /volume <0-1>     set speech volume");
    println!("  /stop             stop speaking");
    println!("  /quit             exit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = AssistantConfig::from_env();
    let speech = Arc::new(SpeechController::new(LogSpeechSink));

    let session = Arc::new(build_session(
        &config,
        Arc::new(TerminalObserver::default()),
        speech.clone(),
    )?);
    spawn_local_init(&session);

    info!("Goldn MAX terminal session started");
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();

        match input {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/stop" => speech.stop(),
            "/mute" => {
                let muted = speech.toggle_mute();
                println!("(speech {})", if muted { "muted" } else { "on" });
            }
            _ if input.starts_with("/volume") => {
                match input.trim_start_matches("/volume").trim().parse::<f32>() {
                    Ok(volume) => {
                        speech.set_volume(volume);
                        println!("(volume {:.2})", speech.volume());
                    }
                    Err(_) => println!("usage: /volume <0-1>"),
                }
            }
            _ => {
                if let SubmitOutcome::Busy = session.submit(input).await {
                    println!("(still thinking, try again in a moment)");
                }
            }
        }
    }

    Ok(())
}
