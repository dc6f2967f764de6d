use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tierwatch::{run_simulation, Settings, SimConfig};
use tierwatch_core::DataTag;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("tierwatch")
        .version(tierwatch::VERSION)
        .about("Self-healing ranking card publisher and sign-in code relay")
        .after_help("The daemon runs inside a host process that embeds tierwatch::App.")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and print a summary")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .default_value("tierwatch.toml")
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the TOML configuration"),
                ),
        )
        .subcommand(
            Command::new("decode-tag")
                .about("Decode the data tag carried by a card")
                .arg(
                    Arg::new("text")
                        .required(true)
                        .help("Card text containing a ||data:...|| tag"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded simulation against in-memory collaborators")
                .arg(
                    Arg::new("cycles")
                        .long("cycles")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Number of reconciliation rounds"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("entities")
                        .long("entities")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Number of tracked players"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop at the first violation"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let settings = Settings::load(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    println!("{}", settings.summary());
    Ok(())
}

fn decode_tag(args: &ArgMatches) -> anyhow::Result<()> {
    let text = args.get_one::<String>("text").context("missing tag text")?;
    let tag = DataTag::decode(text).context("no usable data tag")?;
    println!("status:   {}", tag.status);
    println!("score:    {}", tag.score);
    println!("progress: {}", tag.tier_progress);
    println!("hold:     {}", tag.hold.as_deref().unwrap_or("-"));
    println!("agent:    {}", tag.last_agent.as_deref().unwrap_or("-"));
    Ok(())
}

async fn simulate(args: &ArgMatches) -> anyhow::Result<bool> {
    let defaults = SimConfig::default();
    let config = SimConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
        cycles: args.get_one::<u64>("cycles").copied().unwrap_or(defaults.cycles),
        entities: args
            .get_one::<usize>("entities")
            .copied()
            .unwrap_or(defaults.entities),
        stop_on_first_violation: args.get_flag("stop-on-violation"),
    };

    println!("Running tierwatch simulation...");
    println!("Cycles: {}", config.cycles);
    println!("Seed: {}", config.seed);
    println!();

    let report = run_simulation(config).await;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("check-config", args)) => check_config(args),
        Some(("decode-tag", args)) => decode_tag(args),
        Some(("simulate", args)) => {
            if !simulate(args).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
