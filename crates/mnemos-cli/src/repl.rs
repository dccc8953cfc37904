//! REPL – Read-Eval-Print Loop for the Mnemos interactive shell.
//!
//! Supported slash-commands:
//!   /user <text>       – remember a user turn (bare text does the same)
//!   /assistant <text>  – remember an assistant turn
//!   /search <query>    – ranked similarity search
//!   /topic <topic>     – entries filed under a topic
//!   /emotion <label>   – entries tagged with an emotion
//!   /recent [n]        – the newest entries
//!   /context <query>   – build a prompt-ready context window
//!   /summary           – aggregate statistics
//!   /export <path>     – write a JSON snapshot
//!   /import <path>     – replay a JSON snapshot
//!   /clear             – forget everything
//!   /count             – number of stored entries
//!   /quit | /exit      – flush pending writes and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mnemos_memory::{
    DEFAULT_LOOKUP_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TOKEN_BUDGET, MemoryEngine,
};
use mnemos_types::{MemoryEntry, MemoryMetadata, Role};

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Remember(Role, String),
    Search(String),
    Topic(String),
    Emotion(String),
    Recent(usize),
    Context(String),
    Summary,
    Export(String),
    Import(String),
    Clear,
    Count,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Remember(Role::User, line.to_string());
        }
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let required = |build: fn(String) -> Command| {
            if arg.is_empty() {
                Command::Invalid(format!("{name} needs an argument"))
            } else {
                build(arg.to_string())
            }
        };
        match name {
            "/user" => required(|t| Command::Remember(Role::User, t)),
            "/assistant" => required(|t| Command::Remember(Role::Assistant, t)),
            "/system" => required(|t| Command::Remember(Role::System, t)),
            "/search" => required(Command::Search),
            "/topic" => required(Command::Topic),
            "/emotion" => required(Command::Emotion),
            "/context" => required(Command::Context),
            "/export" => required(Command::Export),
            "/import" => required(Command::Import),
            "/recent" if arg.is_empty() => Command::Recent(DEFAULT_LOOKUP_LIMIT),
            "/recent" => match arg.parse::<usize>() {
                Ok(n) => Command::Recent(n),
                Err(_) => Command::Invalid(format!("'{arg}' is not a count")),
            },
            "/summary" => Command::Summary,
            "/clear" => Command::Clear,
            "/count" => Command::Count,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Invalid(format!("Unknown command '{other}'")),
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(engine: &MemoryEngine, session: Option<&str>, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "mnemos>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Invalid(reason) => {
                println!("{} Type {} for available commands.", reason.red(), "/help".bold());
            }
            command => execute(engine, session, command),
        }
    }
}

fn execute(engine: &MemoryEngine, session: Option<&str>, command: Command) {
    match command {
        Command::Remember(role, text) => {
            let mut hints = MemoryMetadata::new();
            if let Some(session) = session {
                hints = hints.with_session(session);
            }
            let id = engine.add_memory(text, role, hints);
            if let Some(entry) = engine.get(&id) {
                println!(
                    "  {} {} [{}{}]",
                    "✓ remembered".green(),
                    id.to_string().dimmed(),
                    entry.metadata().topic().yellow(),
                    entry
                        .metadata()
                        .emotion()
                        .map(|e| format!(", {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Search(query) => {
            let hits = engine.search_similar(&query, DEFAULT_SEARCH_LIMIT);
            if hits.is_empty() {
                println!("  {}", "No relevant memories.".dimmed());
            }
            for hit in &hits {
                println!(
                    "  {} {} {}",
                    format!("{:.3}", hit.relevance).bold(),
                    format!("(sim {:.3})", hit.similarity).dimmed(),
                    describe(&hit.entry)
                );
            }
        }
        Command::Topic(topic) => print_entries(&engine.search_by_topic(&topic, DEFAULT_LOOKUP_LIMIT)),
        Command::Emotion(emotion) => {
            print_entries(&engine.search_by_emotion(&emotion, DEFAULT_LOOKUP_LIMIT))
        }
        Command::Recent(n) => print_entries(&engine.recent(n)),
        Command::Context(query) => {
            let window = engine.context_window(&query, DEFAULT_TOKEN_BUDGET);
            if window.is_empty() {
                println!("  {}", "(empty context)".dimmed());
            } else {
                println!("{window}");
            }
        }
        Command::Summary => cmd_summary(engine),
        Command::Export(path) => match engine.export().to_json() {
            Ok(json) => match std::fs::write(&path, json) {
                Ok(()) => println!("  {} {}", "✓ Snapshot written to".green(), path.bold()),
                Err(e) => println!("{}: {}", "Error writing snapshot".red(), e),
            },
            Err(e) => println!("{}: {}", "Error encoding snapshot".red(), e),
        },
        Command::Import(path) => match std::fs::read_to_string(&path) {
            Ok(raw) => match engine.import_snapshot(&raw) {
                Ok(n) => println!("  {} {} entries", "✓ Imported".green(), n),
                Err(e) => println!("{}: {}", "Error importing snapshot".red(), e),
            },
            Err(e) => println!("{}: {}", "Error reading snapshot".red(), e),
        },
        Command::Clear => {
            engine.clear_all();
            println!("  {}", "✓ All memories cleared.".green());
        }
        Command::Count => println!("  {} entries", engine.entry_count().to_string().bold()),
        Command::Help => cmd_help(),
        Command::Quit | Command::Empty | Command::Invalid(_) => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Mnemos Commands".bold().underline());
    println!("  {}  – remember a turn (bare text is a user turn)", "/user /assistant <text>".bold().cyan());
    println!("  {}           – ranked similarity search", "/search <query>".bold().cyan());
    println!("  {}    – exact topic / emotion lookup", "/topic /emotion <label>".bold().cyan());
    println!("  {}                – newest entries", "/recent [n]".bold().cyan());
    println!("  {}          – prompt-ready context window", "/context <query>".bold().cyan());
    println!("  {}                 – aggregate statistics", "/summary".bold().cyan());
    println!("  {}   – JSON snapshot export / replay", "/export /import <path>".bold().cyan());
    println!("  {}            – forget everything / entry count", "/clear /count".bold().cyan());
    println!("  {}             – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_summary(engine: &MemoryEngine) {
    let summary = engine.summary();
    println!("{}", "Memory Summary".bold().underline());
    println!("  Entries        : {}", summary.total_entries.to_string().yellow());
    if let Some(span) = &summary.timespan {
        println!(
            "  Timespan       : {} → {} ({:.1} days)",
            span.first.format("%Y-%m-%d %H:%M"),
            span.last.format("%Y-%m-%d %H:%M"),
            span.days
        );
    }
    let topics: Vec<String> = summary
        .most_discussed_topics
        .iter()
        .map(|(topic, count)| format!("{topic} ({count})"))
        .collect();
    println!("  Top topics     : {}", topics.join(", "));
    println!("  Emotion trend  : {}", summary.emotion_trend.join(" → "));
    println!("  Recent concerns: {}", summary.recent_concerns.join(", "));
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn describe(entry: &MemoryEntry) -> String {
    format!(
        "{} {}: {}",
        entry.timestamp().format("%Y-%m-%d %H:%M").to_string().dimmed(),
        entry.role().as_str().bold(),
        entry.content()
    )
}

fn print_entries(entries: &[MemoryEntry]) {
    if entries.is_empty() {
        println!("  {}", "Nothing found.".dimmed());
    }
    for entry in entries {
        println!("  {}", describe(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_memory::EngineConfig;

    #[test]
    fn bare_text_is_a_user_turn() {
        assert_eq!(
            Command::parse("  I can't sleep \n"),
            Command::Remember(Role::User, "I can't sleep".to_string())
        );
    }

    #[test]
    fn slash_commands_parse_arguments() {
        assert_eq!(
            Command::parse("/assistant Let's breathe"),
            Command::Remember(Role::Assistant, "Let's breathe".to_string())
        );
        assert_eq!(Command::parse("/search  my job "), Command::Search("my job".to_string()));
        assert_eq!(Command::parse("/recent"), Command::Recent(DEFAULT_LOOKUP_LIMIT));
        assert_eq!(Command::parse("/recent 3"), Command::Recent(3));
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse(""), Command::Empty);
    }

    #[test]
    fn malformed_commands_are_invalid() {
        assert!(matches!(Command::parse("/search"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/recent many"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/launch"), Command::Invalid(_)));
    }

    #[test]
    fn execute_remembers_with_session() {
        let engine = MemoryEngine::new(EngineConfig::default()).unwrap();
        execute(
            &engine,
            Some("evening"),
            Command::Remember(Role::User, "I feel anxious about work".to_string()),
        );
        let entry = engine.recent(1).pop().unwrap();
        assert_eq!(entry.metadata().session_id(), Some("evening"));

        execute(&engine, None, Command::Clear);
        assert_eq!(engine.entry_count(), 0);
    }

    #[test]
    fn export_then_import_through_files() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("snapshot.json").to_string_lossy().to_string();

        let source = MemoryEngine::new(EngineConfig::default()).unwrap();
        source.add_memory("My partner and I argued", Role::User, MemoryMetadata::new());
        execute(&source, None, Command::Export(path.clone()));

        let target = MemoryEngine::new(EngineConfig::default()).unwrap();
        execute(&target, None, Command::Import(path));
        assert_eq!(target.entry_count(), 1);
    }
}
