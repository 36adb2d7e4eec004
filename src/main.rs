use clap::Parser;
use color_eyre::Result;
use datask::{
    AppConfig, Args, CacheManager, ConfigManager, FallbackChain, OpenOptions, QueryRouter,
    QuestionHistory, Session,
};
use std::io::{BufRead, Write};
use tracing_subscriber::EnvFilter;

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(datask::APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
        return Ok(Some(()));
    }

    if args.generate_config {
        let config = ConfigManager::new(datask::APP_NAME)?;
        match config.write_default_config(args.force) {
            Ok(path) => println!("Wrote default configuration to {}", path.display()),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(Some(()));
    }

    Ok(None)
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(column) = &args.identity_column {
        config.query.identity_column = column.clone();
    }
    if let Some(mode) = args.match_mode {
        config.query.match_mode = match mode {
            datask::MatchMode::Substring => "substring",
            datask::MatchMode::Word => "word",
        }
        .to_string();
    }
    if let Some(providers) = &args.providers {
        config.providers.order = providers.iter().map(|p| p.trim().to_lowercase()).collect();
    }
    if let Some(timeout) = args.timeout_secs {
        config.providers.timeout_secs = timeout;
    }
    if args.debug {
        config.debug.enabled = true;
    }
    config.validate()
}

fn init_logging(debug: bool) {
    let default = if debug { "datask=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let Some(path) = &args.path else {
        return Err(color_eyre::eyre::eyre!("No dataset path given"));
    };
    let opts = OpenOptions::from_args_and_config(args, config);
    let mut session = match Session::open(path, &opts) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error loading dataset: {}", e);
            std::process::exit(1);
        }
    };

    let router = if args.offline {
        QueryRouter::with_chain(config, FallbackChain::offline())?
    } else {
        QueryRouter::new(config)?
    };

    let mut history = config.history.enabled.then(|| {
        CacheManager::new(datask::APP_NAME)
            .map(|cache| QuestionHistory::load(cache, config.history.limit))
    });

    let mut record = |question: &str| {
        if let Some(Ok(history)) = history.as_mut() {
            history.add(question);
        }
    };

    if !args.questions.is_empty() {
        for question in &args.questions {
            record(question);
            println!("{}", session.ask(&router, question));
        }
    } else {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let answer = if args.json {
                let value = serde_json::from_str::<serde_json::Value>(&line)
                    .unwrap_or_else(|_| serde_json::Value::String(line.clone()));
                if let serde_json::Value::String(text) = &value {
                    record(text);
                }
                session.ask_value(&router, &value)
            } else {
                record(&line);
                session.ask(&router, &line)
            };
            writeln!(stdout, "{}", answer)?;
            stdout.flush()?;
        }
    }

    if let Some(Ok(history)) = &history {
        if let Err(e) = history.save() {
            tracing::warn!(error = %e, "could not save question history");
        }
    }

    if args.transcript {
        println!();
        for (idx, entry) in session.transcript().iter().enumerate() {
            println!("[{}] Q: {}", idx + 1, entry.question);
            println!("    A: {}", entry.answer.replace('\n', "\n       "));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let mut config = AppConfig::load(datask::APP_NAME)?;
    apply_overrides(&mut config, &args)?;
    init_logging(config.debug.enabled);

    if let Err(e) = run(&args, &config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
