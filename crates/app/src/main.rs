mod demo;
mod terminal;

use std::fmt;

use gateway::{Gateway, HttpConfig};
use runner_core::model::SessionCredentials;
use services::{Clock, HangmanRunner, TriviaRunner};

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingRunnerUrl,
    InvalidBaseUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => f.write_str("choose a game: trivia or hangman"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingRunnerUrl => {
                f.write_str("a runner url is required (--url or RUNNER_URL), or pass --demo")
            }
            ArgsError::InvalidBaseUrl { raw } => write!(f, "invalid --base-url value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- trivia  [--url <runner_url>] [--base-url <url>] [--demo]");
    eprintln!("  cargo run -p app -- hangman [--url <runner_url>] [--base-url <url>] [--demo]");
    eprintln!();
    eprintln!("The runner url carries session_id, user_id and session_token in its query.");
    eprintln!("--demo plays against a seeded in-memory backend instead of a server.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUNNER_URL, RUNNER_BASE_URL, RUNNER_HTTP_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Trivia,
    Hangman,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "trivia" => Some(Self::Trivia),
            "hangman" => Some(Self::Hangman),
            _ => None,
        }
    }
}

struct Args {
    runner_url: Option<String>,
    base_url: Option<String>,
    demo: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut runner_url = std::env::var("RUNNER_URL").ok();
        let mut base_url = None;
        let mut demo = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--url" => runner_url = Some(require_value(args, "--url")?),
                "--base-url" => {
                    let value = require_value(args, "--base-url")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidBaseUrl { raw: value });
                    }
                    base_url = Some(value);
                }
                "--demo" => demo = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            runner_url,
            base_url,
            demo,
        })
    }
}

/// Pick the backend and the identity triple for this run.
fn connect(
    cmd: Command,
    args: &Args,
) -> Result<(Gateway, SessionCredentials), Box<dyn std::error::Error>> {
    if args.demo {
        let (backend, credentials) = demo::seed(cmd)?;
        return Ok((Gateway::in_memory(&backend), credentials));
    }

    let raw = args.runner_url.as_deref().ok_or(ArgsError::MissingRunnerUrl)?;
    let credentials = SessionCredentials::from_runner_url(raw)?;

    let mut config = HttpConfig::from_env()?;
    if let Some(base_url) = &args.base_url {
        let timeout = config.timeout;
        config = HttpConfig::new(base_url)
            .map_err(|_| ArgsError::InvalidBaseUrl {
                raw: base_url.clone(),
            })?
            .with_timeout(timeout);
    }
    tracing::info!(base_url = %config.base_url, "using runner server");
    Ok((Gateway::http(config)?, credentials))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Err(ArgsError::MissingCommand.into());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_logging();

    let (gateway, credentials) = connect(cmd, &args)?;
    let clock = Clock::system();
    match cmd {
        Command::Trivia => {
            let (runner, events) = TriviaRunner::new(credentials, gateway, clock);
            terminal::play_trivia(runner, events).await
        }
        Command::Hangman => {
            let runner = HangmanRunner::new(credentials, gateway, clock);
            terminal::play_hangman(runner).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
