//! Console Bot Demo
//!
//! Drives a Switchyard runtime from the terminal. Every line typed on stdin
//! becomes a `message-text` event from the current actor; replies are
//! printed to stdout. A few directives simulate interactions:
//!
//! ```text
//! :click <custom-id>               button click
//! :pick <custom-id> <value>...     select menu pick
//! :slash <name> [key=value]...     slash command
//! :user <id>                       switch the acting user
//! :quit                            stop the bot
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --owner 1
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use switchyard::prelude::*;
use switchyard::runtime::config::{ConfigLoader, LogOutput};
use switchyard::core::{OptionValue, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "console-bot", about = "Talk to a Switchyard bot from the terminal")]
struct Cli {
    /// Configuration file (defaults to ./switchyard.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User id of the bot owner, allowed to change settings.
    #[arg(long, default_value_t = 1)]
    owner: u64,

    /// Initial acting user.
    #[arg(long, default_value_t = 1)]
    user: u64,

    /// Channel all events are sent from.
    #[arg(long, default_value_t = 100)]
    channel: u64,
}

// ============================================================================
// Outbound
// ============================================================================

/// Prints replies to stdout.
struct ConsoleOutbound;

#[async_trait]
impl Outbound for ConsoleOutbound {
    async fn acknowledge(&self, event: &InboundEvent, ephemeral: bool) -> Result<(), OutboundError> {
        debug!(kind = %event.kind(), ephemeral, "Acknowledged");
        Ok(())
    }

    async fn send(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
        println!("[bot -> {}] {text}", event.actor());
        Ok(())
    }

    async fn edit_reply(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
        println!("[bot -> {} (edited)] {text}", event.actor());
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn ping() -> &'static str {
    "Pong!"
}

async fn echo(Args(args): Args, flags: Flags) -> String {
    let text = args.join(" ");
    if flags.has("upper") {
        text.to_uppercase()
    } else {
        text
    }
}

struct Roll {
    sides: i64,
}

impl FromOptions for Roll {
    fn from_options(options: &OptionMap) -> DispatchResult<Self> {
        let sides = options.integer_opt("sides")?.unwrap_or(6);
        if sides < 2 {
            return Err(DispatchError::invalid_argument("sides", Some(sides.to_string())));
        }
        Ok(Self { sides })
    }
}

async fn roll(ctx: Arc<DispatchContext>, Options(roll): Options<Roll>) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let value = i64::from(nanos) % roll.sides + 1;
    let left = ctx.action().cooldown().remaining(ctx.actor());
    format!("You rolled {value} (d{}). {} roll(s) left.", roll.sides, left.permits)
}

async fn delete(ctx: Arc<DispatchContext>) -> DispatchResult<String> {
    ctx.reply("Really delete everything? Type `:click confirm`.").await?;
    ctx.await_button("confirm").await?;
    Ok("Deleted (not really).".to_string())
}

async fn color(ctx: Arc<DispatchContext>) -> DispatchResult<String> {
    ctx.reply("Pick a color with `:pick color <red|green|blue>`.").await?;
    let picked = ctx
        .await_component("color", |answer: Arc<DispatchContext>| async move {
            let SelectedValues(values) = SelectedValues::from_context(&answer)?;
            match values.first().map(String::as_str) {
                Some(value @ ("red" | "green" | "blue")) => {
                    DispatchResult::Ok(Verdict::Accept(value.to_string()))
                }
                _ => {
                    answer.reply("That is not a color I know, try again.").await?;
                    Ok(Verdict::Retry)
                }
            }
        })
        .await?;
    Ok(format!("You picked {picked}."))
}

const FACTS: [&str; 3] = [
    "Switchyards sort railway cars onto the right tracks.",
    "A hump yard lets gravity roll cars to their tracks.",
    "Retarders on the rails slow the cars down.",
];

async fn facts(ctx: Arc<DispatchContext>) -> DispatchResult<String> {
    let last = Paginator::new(FACTS.len())
        .run(&ctx, |state: PageState| async move {
            let fact = FACTS.get(state.page()).copied().unwrap_or_default();
            let controls = if state.is_active() {
                format!(
                    "\n  :click {} | :click {} | :click {}",
                    state.previous_id(),
                    state.next_id(),
                    state.close_id()
                )
            } else {
                String::new()
            };
            Ok(format!("[{}/{}] {fact}{controls}", state.page() + 1, state.page_count()))
        })
        .await?;
    Ok(format!("Stopped at fact {}.", last.page() + 1))
}

async fn whoami(ctx: Arc<DispatchContext>) -> String {
    format!("You are {}.", ctx.actor())
}

type Settings = Arc<RwLock<HashMap<String, String>>>;

fn settings_command(settings: &Settings, owner: UserId) -> Action {
    let owner_only = Privilege::from_fn(move |ctx: Arc<DispatchContext>| async move {
        if ctx.user() == owner {
            Ok(())
        } else {
            Err(DispatchError::denied_with("only the owner can change settings"))
        }
    });

    let get = {
        let settings = Arc::clone(settings);
        move |Args(args): Args| {
            let settings = Arc::clone(&settings);
            async move {
                let key = args.first().ok_or_else(|| DispatchError::invalid_argument("key", None))?;
                let settings = settings.read().await;
                DispatchResult::Ok(match settings.get(key) {
                    Some(value) => format!("{key} = {value}"),
                    None => format!("{key} is not set"),
                })
            }
        }
    };
    let set = {
        let settings = Arc::clone(settings);
        move |Args(args): Args| {
            let settings = Arc::clone(&settings);
            async move {
                let [key, value] = <[String; 2]>::try_from(args)
                    .map_err(|_| DispatchError::invalid_argument("key", None))?;
                settings.write().await.insert(key.clone(), value);
                DispatchResult::Ok(format!("{key} updated"))
            }
        }
    };

    Action::command("settings")
        .alias("cfg")
        .child(Action::command("get").handler(get))
        .child(Action::command("set").privilege(owner_only).handler(set))
        .build()
}

async fn help() -> &'static str {
    "Commands: ping, echo|say <text> [-upper], roll [sides], settings get|set, delete, color, facts\n\
     Directives: :click <id>, :pick <id> <values>, :slash <name> [k=v], :user <id>, :quit"
}

fn router() -> ErrorRouter {
    ErrorRouter::replying().on(ErrorClass::Timeout, |_, ctx| async move {
        ctx.reply("You took too long, never mind.").await
    })
}

// ============================================================================
// Console input
// ============================================================================

enum Line {
    Event(InboundEvent),
    SwitchUser(u64),
    Quit,
    Invalid(&'static str),
}

fn parse_line(actor: ActorKey, line: &str) -> Line {
    let Some(directive) = line.strip_prefix(':') else {
        return Line::Event(InboundEvent::text(actor, line));
    };
    let mut words = directive.split_whitespace();
    match (words.next(), words.next()) {
        (Some("quit"), _) => Line::Quit,
        (Some("user"), Some(id)) => match id.parse() {
            Ok(id) => Line::SwitchUser(id),
            Err(_) => Line::Invalid("usage: :user <id>"),
        },
        (Some("click"), Some(id)) => Line::Event(InboundEvent::button(actor, id)),
        (Some("pick"), Some(id)) => Line::Event(InboundEvent::select(actor, id, words)),
        (Some("slash"), Some(name)) => {
            let event = words.fold(InboundEvent::slash(actor, name), |event, pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = value
                    .parse()
                    .map(OptionValue::Integer)
                    .unwrap_or_else(|_| OptionValue::String(value.to_string()));
                event.with_option(key, value)
            });
            Line::Event(event)
        }
        _ => Line::Invalid("unknown directive, type `!help`"),
    }
}

async fn read_console(cli: &Cli, events: mpsc::Sender<InboundEvent>) -> Result<()> {
    let mut actor = ActorKey::new(cli.channel, cli.user);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(actor, line) {
            Line::Event(event) => events
                .send(event)
                .await
                .context("runtime stopped accepting events")?,
            Line::SwitchUser(user) => {
                actor = ActorKey::new(cli.channel, user);
                println!("[console] now acting as {actor}");
            }
            Line::Quit => break,
            Line::Invalid(message) => println!("[console] {message}"),
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    // Keep stdout for the conversation.
    if config.logging.output == LogOutput::Stdout {
        config.logging.output = LogOutput::Stderr;
    }

    let settings: Settings = Arc::default();
    let pipeline = DispatchPipeline::builder()
        .outbound(Arc::new(ConsoleOutbound))
        .router(router())
        .command(
            Action::command("ping")
                .doc(CommandDoc::new("Checks that the bot is alive."))
                .handler(ping),
        )
        .command(Action::command("help").handler(help))
        .command(
            Action::command("echo")
                .alias("say")
                .doc(
                    CommandDoc::new("Repeats the text back.")
                        .syntax("<text>")
                        .flag("upper", "Shout it"),
                )
                .handler(echo),
        )
        .command(
            Action::command("roll")
                .option(OptionSpec::new("sides", OptionKind::Integer).optional())
                .cooldown(Cooldown::new(
                    NonZeroUsize::MIN.saturating_add(2),
                    Duration::from_secs(10),
                ))
                .handler(roll),
        )
        .slash(
            CommandKey::new("roll"),
            Action::command("roll")
                .option(OptionSpec::new("sides", OptionKind::Integer).optional())
                .ack(AckMode::DeferEphemeral)
                .handler(roll),
        )
        .command(settings_command(&settings, UserId(cli.owner)))
        .command(Action::command("delete").handler(delete))
        .command(Action::command("color").handler(color))
        .command(Action::command("facts").handler(facts))
        .command(
            Action::command("whoami")
                .doc(CommandDoc::new("Shows the acting user.").unlisted())
                .handler(whoami),
        );

    let runtime = Arc::new(SwitchyardRuntime::new(config, pipeline)?);
    info!(prefix = %runtime.config().dispatch.prefix, "Console bot ready");
    println!("Type `{}help` for commands.", runtime.config().dispatch.prefix);

    let console = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        let events = runtime.sender();
        async move {
            let result = read_console(&cli, events).await;
            runtime.shutdown();
            result
        }
    });

    runtime.run().await?;
    console.abort();
    match console.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
