//! `mnemos` – interactive shell over the conversation memory engine.
//!
//! 1. Loads `~/.mnemos/config.toml` (writing a default one on first run)
//!    and applies `MNEMOS_*` environment overrides.
//! 2. Opens the SQLite mirror and replays every stored memory.
//! 3. Drops the user into an **interactive REPL** with slash-commands.
//! 4. Intercepts **Ctrl-C**, flushes pending writes and exits safely.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use mnemos_memory::{ErrorCallback, MemoryEngine, PersistenceError, SqliteBackend};

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (defaults to "info"); MNEMOS_LOG_FORMAT=json
    // switches to newline-delimited JSON. User-facing output uses println!.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("MNEMOS_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing pending writes …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let first_run = !config::config_path().exists();
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    if first_run {
        match config::save(&cfg) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    } else {
        println!(
            "  Config loaded from {}",
            config::config_path().display().to_string().bold()
        );
    }

    // ── Runtime + engine ──────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        }
    };
    let _guard = runtime.enter();

    if let Some(parent) = cfg.database_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, path = %parent.display(), "Could not create database directory");
    }
    let backend = match SqliteBackend::open(&cfg.database_path) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            println!("{}: {}", "Failed to open memory database".red(), e);
            std::process::exit(1);
        }
    };
    let on_error: ErrorCallback = Arc::new(|e: &PersistenceError| {
        eprintln!("{}: {}", "Persistence error".red(), e);
    });
    let engine = match MemoryEngine::with_backend(cfg.engine.clone(), backend, Some(on_error)) {
        Ok(engine) => engine,
        Err(e) => {
            println!("{}: {}", "Invalid engine configuration".red(), e);
            std::process::exit(1);
        }
    };

    let loaded = runtime.block_on(engine.initialize());
    println!(
        "  Memory database {} ({} entries restored)",
        cfg.database_path.display().to_string().dimmed(),
        loaded.to_string().bold()
    );
    if let Some(session) = &cfg.session_id {
        println!("  Session        {}", session.yellow());
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&engine, cfg.session_id.as_deref(), shutdown);

    runtime.block_on(engine.flush());
    println!("{}", "  ✓ Memories saved.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "Mnemos".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Semantic conversation memory");
    println!();
}
