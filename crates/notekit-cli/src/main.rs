use anyhow::{Context as _, Result, bail};
use log::{info, warn};
use notekit_config::Config;
use notekit_engine::{Context, Document, EventKind, KeyEvent, Range};
use serde_json::Value;
use std::{env, path::PathBuf, process};

/// One step of a replayed session.
#[derive(Debug, PartialEq)]
enum Step {
    /// `bold`, `fontSize=18`, `createLink={"url":"a.com","text":"a"}`
    Invoke { address: String, args: Vec<Value> },
    /// `key:CTRL+B`
    Key(KeyEvent),
    /// `select:all` or `select:end`
    Select { all: bool },
}

fn parse_step(raw: &str) -> Result<Step> {
    if let Some(chord) = raw.strip_prefix("key:") {
        let event = chord
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid key chord `{chord}`: {e}"))?;
        return Ok(Step::Key(event));
    }
    if let Some(target) = raw.strip_prefix("select:") {
        return match target {
            "all" => Ok(Step::Select { all: true }),
            "end" => Ok(Step::Select { all: false }),
            other => bail!("unknown selection `{other}`"),
        };
    }

    let (address, args) = match raw.split_once('=') {
        Some((address, json)) => {
            let value: Value = serde_json::from_str(json)
                .unwrap_or_else(|_| Value::String(json.to_string()));
            let args = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            (address, args)
        }
        None => (raw, Vec::new()),
    };
    if address.is_empty() {
        bail!("empty invocation in `{raw}`");
    }
    Ok(Step::Invoke {
        address: address.to_string(),
        args,
    })
}

fn load_config() -> Result<Config> {
    match Config::load() {
        Ok(Some(config)) => {
            info!("Using config from {}", Config::config_path().display());
            Ok(config)
        }
        Ok(None) => Ok(Config::default()),
        Err(e) => Err(e).context("Failed to load config file"),
    }
}

fn run(path: PathBuf, steps: &[String]) -> Result<String> {
    let steps = steps
        .iter()
        .map(|raw| parse_step(raw))
        .collect::<Result<Vec<_>>>()?;

    let doc = Document::from_path(&path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let mut context = Context::new(doc, load_config()?);
    context.on(EventKind::ImageUploadError, |event| warn!("{event:?}"));
    context.initialize();

    for step in steps {
        match step {
            Step::Invoke { address, args } => match context.invoke(&address, &args) {
                Some(result) => info!("{address} -> {result}"),
                None => warn!("{address}: no such method"),
            },
            Step::Key(event) => {
                let response = context.with_editor(|editor| editor.keydown(&event));
                info!("key {:?} -> {response:?}", event.key);
            }
            Step::Select { all } => context.with_editor(|editor| {
                let tree = editor.document().tree();
                let range = if all {
                    Range::select_all(tree)
                } else {
                    Range::from_body_element(tree)
                };
                editor.document_mut().select(range);
                editor.set_last_range(None);
            }),
        }
    }

    Ok(context.code())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input.html> [invocation...]", args[0]);
        eprintln!("  invocation: name | name=<json> | key:CTRL+B | select:all | select:end");
        process::exit(1);
    }

    match run(PathBuf::from(&args[1]), &args[2..]) {
        Ok(markup) => println!("{markup}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}
