//! Quick check that streamed chat fragments and final metadata arrive
//!
//! Run with: cargo run --example streaming_latency

use std::io::Write;
use std::time::Instant;

use futures_util::StreamExt;
use echo_console::ollama::{ChatClient, StreamChunk};
use echo_console::Turn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("┌─────────────────────────────────────────┐");
    println!("│  Testing Chat Streaming Latency         │");
    println!("└─────────────────────────────────────────┘\n");

    let client = ChatClient::new("http://localhost:11434");

    let prompt = "Say 'hello world' and nothing else.";
    let model = "codellama";

    println!("Prompt: {}", prompt);
    println!("Model:  {}\n", model);
    println!("─── Streaming Response ───");

    let start = Instant::now();
    let mut first_fragment_ms: Option<f64> = None;
    let mut fragment_count = 0;

    let mut stream = client.chat_stream(vec![Turn::user(prompt)], model);

    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(StreamChunk::Token(token)) => {
                first_fragment_ms.get_or_insert_with(|| start.elapsed().as_secs_f64() * 1000.0);
                print!("{}", token);
                std::io::stdout().flush()?;
                fragment_count += 1;
            }
            Ok(StreamChunk::Done(stats)) => {
                println!("\n\n─── Metadata from Final Chunk ───");
                println!("┌────────────────────────────────────────┐");
                println!("│ eval_count (tokens):    {:>14} │", stats.eval_count);
                println!("│ prompt_eval_count:      {:>14} │", stats.prompt_eval_count);
                println!("│ eval_duration_ns:       {:>14} │", stats.eval_duration_ns);
                println!("│                                        │");
                println!(
                    "│ First fragment after:   {:>11.2} ms │",
                    first_fragment_ms.unwrap_or(0.0)
                );
                println!("│ Fragments received:     {:>14} │", fragment_count);
                println!("└────────────────────────────────────────┘");
            }
            Err(e) => {
                eprintln!("\n❌ Error: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
