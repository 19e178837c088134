//! colv - column-aware terminal pager.

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colv::cache::Direction;
use colv::input::{InputAction, PromptKind};
use colv::pattern::{compile_regex, strip_slashes};
use colv::render::service::parse_format;
use colv::render::ui::install_panic_hook;
use colv::render::{ColorTheme, TerminalUI};
use colv::rules::IgnoreRule;
use colv::config::{embedded_options, EMBEDDED_KEYS};
use colv::{Application, ByteSource, Config, LineCache, SourceFactory};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

fn cli() -> Command {
    Command::new("colv")
        .version(colv::VERSION)
        .args_override_self(true)
        .about("A column-aware pager for logs and tabular text")
        .long_about(
            "colv splits each line into fields, aligns them into columns and lets you \
             search, ignore, highlight and reformat them. Reads FILE (plain or \
             compressed) or standard input.",
        )
        .arg(
            Arg::new("file")
                .help("File to view; '-' or nothing reads standard input")
                .index(1),
        )
        .arg(
            Arg::new("split")
                .short('s')
                .long("split")
                .value_name("REGEX")
                .help("Split lines into fields on REGEX instead of blanks"),
        )
        .arg(
            Arg::new("highlight")
                .short('H')
                .long("highlight")
                .value_name("REGEX")
                .help("Highlight lines matching REGEX"),
        )
        .arg(
            Arg::new("ignore")
                .short('I')
                .long("ignore")
                .value_name("SPEC")
                .action(ArgAction::Append)
                .help("Ignore a line (N), a range (A-B) or lines matching a regex"),
        )
        .arg(
            Arg::new("format")
                .short('F')
                .long("format")
                .value_name("COLS:FMT")
                .action(ArgAction::Append)
                .help("printf-style format for columns, e.g. 3:%.2f"),
        )
        .arg(
            Arg::new("pattern")
                .short('p')
                .long("pattern")
                .value_name("REGEX")
                .help("Search for REGEX on startup"),
        )
        .arg(
            Arg::new("ignore-case")
                .short('i')
                .long("ignore-case")
                .action(ArgAction::SetTrue)
                .help("Case insensitive searches"),
        )
        .arg(
            Arg::new("line")
                .short('l')
                .long("line")
                .value_name("N")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Start at line N"),
        )
        .arg(
            Arg::new("header-line")
                .long("header-line")
                .value_name("N")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Use the fields of line N as column names"),
        )
        .arg(
            Arg::new("hide")
                .long("hide")
                .value_name("COLS")
                .help("Hide columns, e.g. '2 4-6'"),
        )
        .arg(
            Arg::new("align")
                .long("align")
                .value_name("COLS:ALIGN")
                .action(ArgAction::Append)
                .help("Align columns left (l), right (r), centered (c) or by content (a)"),
        )
        .arg(
            Arg::new("line-numbers")
                .short('n')
                .long("line-numbers")
                .action(ArgAction::SetTrue)
                .conflicts_with("offsets")
                .help("Show line numbers"),
        )
        .arg(
            Arg::new("offsets")
                .long("offsets")
                .action(ArgAction::SetTrue)
                .help("Show the byte offset of each line"),
        )
        .arg(
            Arg::new("no-parse-header")
                .long("no-parse-header")
                .action(ArgAction::SetTrue)
                .help("Ignore options in the file's leading '#' comment lines"),
        )
        .arg(
            Arg::new("no-config")
                .long("no-config")
                .action(ArgAction::SetTrue)
                .help("Do not read the user configuration file"),
        )
}

/// Config file values overridden by the command line.
fn merge_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = if matches.get_flag("no-config") {
        Config::default()
    } else {
        Config::load().context("failed to load configuration")?
    };

    if let Some(split) = matches.get_one::<String>("split") {
        config.split_pattern = Some(split.clone());
    }
    if let Some(highlight) = matches.get_one::<String>("highlight") {
        config.highlight_pattern = Some(highlight.clone());
    }
    if let Some(ignores) = matches.get_many::<String>("ignore") {
        config.ignore.extend(ignores.cloned());
    }
    if let Some(formats) = matches.get_many::<String>("format") {
        config.formats.extend(formats.cloned());
    }
    if matches.get_flag("ignore-case") {
        config.ignore_case = true;
    }
    if matches.get_flag("no-parse-header") {
        config.parse_header = false;
    }
    Ok(config)
}

fn apply_rules(cache: &mut LineCache, config: &Config) -> Result<()> {
    if let Some(split) = &config.split_pattern {
        cache.set_split_pattern(Some(compile_regex(strip_slashes(split))?))?;
    }
    if let Some(highlight) = &config.highlight_pattern {
        cache.set_highlight_pattern(Some(compile_regex(strip_slashes(highlight))?))?;
    }
    for spec in &config.ignore {
        let rule = IgnoreRule::parse(spec).with_context(|| format!("bad ignore rule '{spec}'"))?;
        cache.add_ignore_rule(rule)?;
    }
    for spec in &config.formats {
        let (columns, rule) =
            parse_format(spec).with_context(|| format!("bad format '{spec}'"))?;
        for column in columns {
            match &rule {
                Some(rule) => cache.set_format_rule(column, rule.clone())?,
                None => {
                    cache.unset_format_rule(column)?;
                }
            }
        }
    }
    Ok(())
}

fn startup_actions(matches: &ArgMatches) -> Vec<InputAction> {
    let mut actions = Vec::new();
    if let Some(line) = matches.get_one::<u64>("line") {
        actions.push(InputAction::GoToLine(*line));
    }
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        actions.push(InputAction::SubmitPrompt {
            kind: PromptKind::Search(Direction::Forward),
            input: pattern.clone(),
        });
    }
    if let Some(line) = matches.get_one::<u64>("header-line") {
        actions.push(InputAction::SubmitPrompt {
            kind: PromptKind::HeaderLine,
            input: line.to_string(),
        });
    }
    if let Some(columns) = matches.get_one::<String>("hide") {
        actions.push(InputAction::SubmitPrompt {
            kind: PromptKind::HideColumns,
            input: columns.clone(),
        });
    }
    for spec in matches.get_many::<String>("align").into_iter().flatten() {
        actions.push(InputAction::SubmitPrompt {
            kind: PromptKind::Align,
            input: spec.clone(),
        });
    }
    if matches.get_flag("line-numbers") {
        actions.push(InputAction::ToggleLineNumbers);
    }
    if matches.get_flag("offsets") {
        actions.push(InputAction::ToggleOffsets);
    }
    actions
}

/// Command line with `embedded` options placed before the user's own, so the
/// command line wins.
fn with_embedded_options(args: &[String], embedded: Vec<String>) -> Vec<String> {
    let mut all = Vec::with_capacity(args.len() + embedded.len());
    all.extend(args.first().cloned());
    all.extend(embedded);
    all.extend(args.iter().skip(1).cloned());
    all
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut matches = cli().get_matches_from(&args);
    let mut config = merge_config(&matches)?;

    let file = matches
        .get_one::<String>("file")
        .filter(|name| name.as_str() != "-")
        .cloned();

    let (mut cache, title, data_ready) = match file {
        Some(name) => {
            let path = PathBuf::from(&name);
            let source = SourceFactory::open(&path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?;
            if config.parse_header {
                let (lines, embedded) = embedded_options(source.data(), EMBEDDED_KEYS)?;
                if !embedded.is_empty() {
                    matches = cli()
                        .try_get_matches_from(with_embedded_options(&args, embedded))
                        .with_context(|| format!("bad options in the header of {name}"))?;
                    config = merge_config(&matches)?;
                }
                if lines > 0 {
                    config.ignore.insert(0, format!("1-{lines}"));
                }
            }
            (LineCache::new(source), path.display().to_string(), None)
        }
        None => {
            if std::io::stdin().is_terminal() {
                bail!("Missing filename (\"colv --help\" for help)");
            }
            let notify = Arc::new(Notify::new());
            let signal = Arc::clone(&notify);
            // The pump thread stays blocked on stdin until EOF; it is not joined.
            let (source, _pump) =
                SourceFactory::stdin(config.stream_options(), move || signal.notify_one());
            (LineCache::new(source), "(stdin)".to_string(), Some(notify))
        }
    };

    apply_rules(&mut cache, &config)?;

    install_panic_hook();
    let ui = TerminalUI::with_theme(ColorTheme::from_name(&config.theme));
    let mut app = Application::new(cache, Box::new(ui), title, config.ignore_case)
        .with_spinner(true)
        .with_startup_actions(startup_actions(&matches));
    if let Some(notify) = data_ready {
        app = app.with_data_notify(notify);
    }

    app.run().await?;
    Ok(())
}
