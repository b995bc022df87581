use echo_console::metrics;
use echo_console::tracing::init_tracing;
use echo_console::{
    ChatClient, ConsoleSink, ProcessExecutor, SessionConfig, SessionController, SessionError,
    StdinInput, Style, TerminalSink,
};

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn run() -> i32 {
    if let Err(e) = init_tracing("echo-console") {
        eprintln!("warning: logging disabled: {}", e);
    }

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return 2;
        }
    };

    let backend = ChatClient::new(config.base_url.clone());
    tracing::info!(base_url = backend.base_url(), "Using Ollama backend");
    let mut session = SessionController::new(backend, ProcessExecutor::new(), config);
    tracing::info!(
        session_id = session.session_id(),
        model = %session.config().model,
        "Session created"
    );
    let mut input = StdinInput::spawn();
    let mut sink = TerminalSink::stdout();

    let result = session.run(&mut input, &mut sink, interrupted()).await;
    tracing::debug!(metrics = %metrics::render(), "Session metrics");

    match result {
        Ok(_) => 0,
        Err(SessionError::Backend { source, .. }) => {
            let _ = sink.write(&format!("\n❌ Model backend failed: {}\n", source), Style::AlertBold);
            1
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let code = run().await;
    // Exit directly: the stdin reader thread may still be blocked on a read.
    std::process::exit(code);
}
