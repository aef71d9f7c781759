//! Sense Engine CLI
//!
//! Manage resources, streams and parsers on a sensor-data platform.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sense_engine::{
    ConfigLoader, DataPoint, DataQuery, DeletePolicy, Engine, EngineConfig, NewParser, NewResource,
    NewStream, ParserId, ResourceId, StreamId,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sense-engine")]
#[command(version)]
#[command(about = "Client for the sensor-data platform API", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Platform endpoint (overrides config)
    #[arg(long, global = true, env = "SENSE_ENDPOINT")]
    endpoint: Option<String>,

    /// Identity to issue requests as (overrides config)
    #[arg(short, long, global = true, env = "SENSE_IDENTITY")]
    identity: Option<String>,

    /// Platform API key (overrides config)
    #[arg(long, global = true, env = "SENSE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in milliseconds (overrides config)
    #[arg(long, global = true, env = "SENSE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// How resources are deleted: cascade or explicit (overrides config)
    #[arg(long, global = true, env = "SENSE_DELETE_POLICY")]
    delete_policy: Option<DeletePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resources
    #[command(subcommand)]
    Resource(ResourceCommand),

    /// Manage streams of a resource
    #[command(subcommand)]
    Stream(StreamCommand),

    /// Manage parsers of a resource
    #[command(subcommand)]
    Parser(ParserCommand),

    /// Post or read stream data
    #[command(subcommand)]
    Data(DataCommand),

    /// Create a resource, stream and parser, then delete them again
    Demo {
        /// Resource label (random demoNN when omitted)
        #[arg(long)]
        label: Option<String>,

        /// Keep the created entities instead of deleting them
        #[arg(long)]
        keep: bool,
    },
}

/// JSON body given inline or by a typed flag
#[derive(Args)]
struct JsonArg {
    /// Raw JSON payload, sent verbatim
    #[arg(long)]
    json: Option<String>,
}

#[derive(Subcommand)]
enum ResourceCommand {
    /// List all resources
    List,
    /// Show one resource
    Get { id: String },
    /// Create a resource and print its id
    Create {
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        polling_url: Option<String>,
        #[arg(long)]
        polling_period: Option<u64>,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Replace a resource's attributes
    Update {
        id: String,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Delete a resource
    Delete { id: String },
}

#[derive(Subcommand)]
enum StreamCommand {
    /// List streams of a resource
    List { resource: String },
    /// Show one stream
    Get { resource: String, id: String },
    /// Create a stream and print its id
    Create {
        resource: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Replace a stream's attributes
    Update {
        resource: String,
        id: String,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Delete a stream
    Delete { resource: String, id: String },
}

#[derive(Subcommand)]
enum ParserCommand {
    /// List parsers of a resource
    List { resource: String },
    /// Show one parser
    Get { resource: String, id: String },
    /// Create a parser and print its id
    Create {
        resource: String,
        #[arg(long)]
        stream: Option<String>,
        #[arg(long)]
        input_parser: Option<String>,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Replace a parser's attributes
    Update {
        resource: String,
        id: String,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Delete a parser
    Delete { resource: String, id: String },
}

#[derive(Subcommand)]
enum DataCommand {
    /// Append a value to a stream
    Post {
        resource: String,
        stream: String,
        /// Value to store
        #[arg(long)]
        value: Option<String>,
        #[command(flatten)]
        body: JsonArg,
    },
    /// Print stored values of a stream
    Get {
        resource: String,
        stream: String,
        /// Maximum number of points
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        /// Only points at or after this timestamp (ms)
        #[arg(long)]
        from: Option<i64>,
        /// Only points before this timestamp (ms)
        #[arg(long)]
        until: Option<i64>,
        /// Pretty-print the JSON reply
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = load_config(&cli)?;
    let engine = Engine::from_config(config).context("Failed to create engine")?;

    match cli.command {
        Commands::Resource(cmd) => run_resource(&engine, cmd),
        Commands::Stream(cmd) => run_stream(&engine, cmd),
        Commands::Parser(cmd) => run_parser(&engine, cmd),
        Commands::Data(cmd) => run_data(&engine, cmd),
        Commands::Demo { label, keep } => run_demo(&engine, label, keep),
    }
}

/// Config file and env first, then CLI flags
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = ConfigLoader::new()
        .with_path(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;

    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(identity) = &cli.identity {
        config.identity = identity.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.api_key = Some(api_key.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(policy) = cli.delete_policy {
        config.delete_policy = policy;
    }

    Ok(config)
}

/// Raw `--json` wins; otherwise serialize the typed form
fn body_or<T, F>(body: JsonArg, typed: F) -> Result<String>
where
    T: serde::Serialize,
    F: FnOnce() -> Option<T>,
{
    match (body.json, typed()) {
        (Some(json), _) => Ok(json),
        (None, Some(value)) => Ok(serde_json::to_string(&value)?),
        (None, None) => anyhow::bail!("a payload is required: pass --json or the typed flags"),
    }
}

fn run_resource(engine: &Engine, cmd: ResourceCommand) -> Result<()> {
    match cmd {
        ResourceCommand::List => println!("{}", engine.list_resources()?),
        ResourceCommand::Get { id } => println!("{}", engine.get_resource(&id.into())?),
        ResourceCommand::Create {
            label,
            polling_url,
            polling_period,
            body,
        } => {
            let payload = body_or(body, || {
                label.map(|label| NewResource {
                    polling_url,
                    polling_period,
                    ..NewResource::new(label)
                })
            })?;
            println!("{}", engine.create_resource(&payload)?);
        }
        ResourceCommand::Update { id, body } => {
            let payload = body_or(body, || None::<NewResource>)?;
            engine.update_resource(&id.into(), &payload)?;
        }
        ResourceCommand::Delete { id } => engine.delete_resource(&id.into())?,
    }
    Ok(())
}

fn run_stream(engine: &Engine, cmd: StreamCommand) -> Result<()> {
    match cmd {
        StreamCommand::List { resource } => println!("{}", engine.list_streams(&resource.into())?),
        StreamCommand::Get { resource, id } => {
            println!("{}", engine.get_stream(&resource.into(), &id.into())?)
        }
        StreamCommand::Create {
            resource,
            description,
            body,
        } => {
            let payload = body_or(body, || description.map(NewStream::new))?;
            println!("{}", engine.create_stream(&resource.into(), &payload)?);
        }
        StreamCommand::Update { resource, id, body } => {
            let payload = body_or(body, || None::<NewStream>)?;
            engine.update_stream(&resource.into(), &id.into(), &payload)?;
        }
        StreamCommand::Delete { resource, id } => {
            engine.delete_stream(&resource.into(), &id.into())?
        }
    }
    Ok(())
}

fn run_parser(engine: &Engine, cmd: ParserCommand) -> Result<()> {
    match cmd {
        ParserCommand::List { resource } => println!("{}", engine.list_parsers(&resource.into())?),
        ParserCommand::Get { resource, id } => {
            println!("{}", engine.get_parser(&resource.into(), &id.into())?)
        }
        ParserCommand::Create {
            resource,
            stream,
            input_parser,
            body,
        } => {
            let payload = body_or(body, || {
                stream.map(|stream| NewParser::new(stream, input_parser.unwrap_or_default()))
            })?;
            println!("{}", engine.create_parser(&resource.into(), &payload)?);
        }
        ParserCommand::Update { resource, id, body } => {
            let payload = body_or(body, || None::<NewParser>)?;
            engine.update_parser(&resource.into(), &id.into(), &payload)?;
        }
        ParserCommand::Delete { resource, id } => {
            engine.delete_parser(&resource.into(), &id.into())?
        }
    }
    Ok(())
}

fn run_data(engine: &Engine, cmd: DataCommand) -> Result<()> {
    match cmd {
        DataCommand::Post {
            resource,
            stream,
            value,
            body,
        } => {
            let payload = body_or(body, || value.map(DataPoint::new))?;
            println!(
                "{}",
                engine.post_stream_data(&resource.into(), &stream.into(), &payload)?
            );
        }
        DataCommand::Get {
            resource,
            stream,
            limit,
            from,
            until,
            pretty,
        } => {
            let query = DataQuery { limit, from, until };
            let body = engine.get_stream_data_with(&resource.into(), &stream.into(), &query)?;
            if pretty {
                match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    Err(_) => {
                        warn!("Reply is not JSON, printing as received");
                        println!("{}", body);
                    }
                }
            } else {
                println!("{}", body);
            }
        }
    }
    Ok(())
}

/// Resource → stream → parser, then delete the resource
fn run_demo(engine: &Engine, label: Option<String>, keep: bool) -> Result<()> {
    let label = label.unwrap_or_else(|| format!("demo{}", std::process::id() % 100));
    println!("Testing against {} as {}", engine.endpoint(), engine.identity());

    let resource: ResourceId = engine
        .create_resource(&NewResource::new(&label))
        .context("Failed to create resource")?;
    println!("Made resource: {}", resource);

    let stream: StreamId = engine
        .create_stream(&resource, &NewStream::new("light measure"))
        .with_context(|| format!("Failed to create stream on resource {}", resource))?;
    println!("Made stream: {}", stream);

    let parser: ParserId = engine
        .create_parser(&resource, &NewParser::new(stream.clone(), "/tets"))
        .with_context(|| format!("Failed to create parser on resource {}", resource))?;
    println!("New parser ID: {}", parser);

    if keep {
        info!("Keeping demo entities under resource {}", resource);
        return Ok(());
    }

    println!("Now deleting it all...");
    engine
        .delete_resource(&resource)
        .with_context(|| format!("Failed to delete resource {}", resource))?;

    match engine.get_stream_data(&resource, &stream) {
        Err(e) if e.is_not_found() => println!("Stream {} is gone", stream),
        Err(e) => warn!("Unexpected error reading deleted stream: {}", e),
        Ok(_) => warn!("Stream {} still answers after its resource was deleted", stream),
    }

    Ok(())
}
