//! Command-line interface for the Scambus API.
//!
//! Thin presentation layer over the SDK: resolves configuration (flags,
//! environment, config file), dispatches one subcommand, and prints results
//! as JSON. The `poll`, `follow`, and `watch` commands run until Ctrl+C.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use scambus::retry::RetryConfig;
use scambus::{
    ClientOptions, ConfigFile, Cursor, NewJournalEntry, PollOrder, PollRequest, Poller,
    RetentionPolicy, ScambusClient, SocketOptions, SseOptions, resolve_api_url,
    resolve_credentials,
};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scambus", version, about = "Client for the Scambus fraud intelligence API")]
struct Cli {
    /// API base URL (falls back to SCAMBUS_API_URL, then the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API key id (with --key-secret; falls back to SCAMBUS_KEY_ID)
    #[arg(long, global = true)]
    key_id: Option<String>,

    /// API key secret (falls back to SCAMBUS_KEY_SECRET)
    #[arg(long, global = true)]
    key_secret: Option<String>,

    /// Bearer token (falls back to SCAMBUS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage cases
    Cases {
        #[command(subcommand)]
        command: CasesCommand,
    },
    /// Manage tags
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },
    /// Submit and inspect journal entries
    Entries {
        #[command(subcommand)]
        command: EntriesCommand,
    },
    /// Manage export streams
    Streams {
        #[command(subcommand)]
        command: StreamsCommand,
    },
    /// Poll a stream's message log
    Poll {
        /// Stream consumer key
        stream: String,
        #[command(flatten)]
        position: CursorArg,
        /// Page order: asc or desc
        #[arg(long, default_value = "asc")]
        order: String,
        /// Page size
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Keep polling for new messages after catching up
        #[arg(long)]
        follow: bool,
    },
    /// Follow a stream live over SSE
    Follow {
        /// Stream consumer key; omit together with --temp to follow a
        /// temporary stream
        stream: Option<String>,
        #[command(flatten)]
        position: CursorArg,
        /// Create a temporary stream of this data type (journal_entry or
        /// identifier) and delete it on exit
        #[arg(long, value_name = "DATA_TYPE", conflicts_with = "stream")]
        temp: Option<String>,
    },
    /// Watch a WebSocket channel
    Watch {
        /// Channel name, e.g. stream:<consumer_key>
        channel: String,
        #[command(flatten)]
        position: CursorArg,
    },
}

#[derive(Args)]
struct CursorArg {
    /// Start position: "0" (history start), "$" (live tail), or a message id
    #[arg(long, default_value = "0")]
    cursor: String,
}

impl CursorArg {
    fn parse(&self) -> Result<Cursor> {
        self.cursor
            .parse()
            .with_context(|| format!("invalid cursor {:?}", self.cursor))
    }
}

#[derive(Subcommand)]
enum CasesCommand {
    List {
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    Get {
        id: String,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Close {
        id: String,
    },
}

#[derive(Subcommand)]
enum TagsCommand {
    List {
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    Create {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
}

#[derive(Subcommand)]
enum EntriesCommand {
    /// Submit a new journal entry
    Submit {
        /// Entry type, e.g. phone_call, message, transfer
        entry_type: String,
        description: String,
        /// Attach an identifier as type:value (repeatable)
        #[arg(long = "identifier", value_name = "TYPE:VALUE")]
        identifiers: Vec<String>,
        #[arg(long)]
        performed_at: Option<String>,
        /// Mark the entry complete right after submitting
        #[arg(long)]
        complete: bool,
    },
    Get {
        id: String,
    },
}

#[derive(Subcommand)]
enum StreamsCommand {
    List {
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    Create {
        /// journal_entry or identifier
        data_type: String,
        #[arg(long)]
        name: Option<String>,
    },
    Delete {
        consumer_key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let client = build_client(&cli)?;

    match cli.command {
        Command::Cases { command } => run_cases(&client, command).await?,
        Command::Tags { command } => run_tags(&client, command).await?,
        Command::Entries { command } => run_entries(&client, command).await?,
        Command::Streams { command } => run_streams(&client, command).await?,
        Command::Poll {
            stream,
            position,
            order,
            limit,
            follow,
        } => run_poll(&client, &stream, position.parse()?, &order, limit, follow).await?,
        Command::Follow {
            stream,
            position,
            temp,
        } => run_follow(&client, stream, position.parse()?, temp).await?,
        Command::Watch { channel, position } => {
            run_watch(&client, &channel, position.parse()?).await?
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_client(cli: &Cli) -> Result<ScambusClient> {
    let file = ConfigFile::load()?;
    let base_url = resolve_api_url(cli.api_url.as_deref(), &file);
    let credentials = resolve_credentials(
        cli.key_id.as_deref(),
        cli.key_secret.as_deref(),
        cli.token.as_deref(),
        &file,
    )?;
    let options = ClientOptions {
        base_url,
        credentials,
        timeout: 30,
        retry: RetryConfig::default(),
        include_test: false,
    };
    Ok(ScambusClient::new(options)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_cases(client: &ScambusClient, command: CasesCommand) -> Result<()> {
    match command {
        CasesCommand::List { cursor, limit } => {
            print_json(&client.list_cases(cursor.as_deref(), limit).await?)
        }
        CasesCommand::Get { id } => print_json(&client.get_case(&id).await?),
        CasesCommand::Create { name, description } => {
            print_json(&client.create_case(&name, description.as_deref()).await?)
        }
        CasesCommand::Close { id } => print_json(&client.close_case(&id).await?),
    }
}

async fn run_tags(client: &ScambusClient, command: TagsCommand) -> Result<()> {
    match command {
        TagsCommand::List { cursor, limit } => {
            print_json(&client.list_tags(cursor.as_deref(), limit).await?)
        }
        TagsCommand::Create { name, color } => {
            print_json(&client.create_tag(&name, color.as_deref()).await?)
        }
    }
}

async fn run_entries(client: &ScambusClient, command: EntriesCommand) -> Result<()> {
    match command {
        EntriesCommand::Submit {
            entry_type,
            description,
            identifiers,
            performed_at,
            complete,
        } => {
            let mut entry = NewJournalEntry::new(entry_type, description);
            if let Some(ts) = performed_at {
                entry = entry.performed_at(ts);
            }
            for spec in &identifiers {
                let Some((id_type, value)) = spec.split_once(':') else {
                    bail!("identifier {:?} is not in TYPE:VALUE form", spec);
                };
                entry = entry.identifier(id_type, value);
            }
            let handle = client.submit_entry(entry).await?;
            if complete {
                print_json(&handle.complete().await?)
            } else {
                print_json(handle.entry())
            }
        }
        EntriesCommand::Get { id } => print_json(&client.get_entry(&id).await?),
    }
}

async fn run_streams(client: &ScambusClient, command: StreamsCommand) -> Result<()> {
    match command {
        StreamsCommand::List { cursor, limit } => {
            print_json(&client.list_streams(cursor.as_deref(), limit).await?)
        }
        StreamsCommand::Create { data_type, name } => {
            print_json(&client.create_stream(&data_type, name.as_deref(), None).await?)
        }
        StreamsCommand::Delete { consumer_key } => {
            client.delete_stream(&consumer_key).await?;
            eprintln!("deleted stream {consumer_key}");
            Ok(())
        }
    }
}

async fn run_poll(
    client: &ScambusClient,
    stream: &str,
    cursor: Cursor,
    order: &str,
    limit: u32,
    follow: bool,
) -> Result<()> {
    let order = match order {
        "asc" => PollOrder::Asc,
        "desc" => PollOrder::Desc,
        other => bail!("invalid order {:?}: expected asc or desc", other),
    };

    if !follow {
        let request = PollRequest {
            cursor,
            order,
            limit,
        };
        let page = client.poll_stream(stream, &request).await?;
        for message in &page.messages {
            println!("{}", serde_json::to_string(message)?);
        }
        if let Some(next) = &page.next_cursor {
            eprintln!("next cursor: {next} (has_more: {})", page.has_more);
        }
        return Ok(());
    }

    if order == PollOrder::Desc {
        bail!("--follow requires ascending order");
    }
    let mut poller = Poller::new(client.clone(), stream, cursor)
        .with_limit(limit)
        .with_retention_policy(RetentionPolicy::ResetToStart);
    loop {
        let page = tokio::select! {
            page = poller.next_page() => page?,
            _ = tokio::signal::ctrl_c() => break,
        };
        for message in page {
            println!("{}", serde_json::to_string(&message)?);
        }
        poller.idle().await;
    }
    eprintln!("stopped at cursor {}", poller.cursor());
    Ok(())
}

async fn run_follow(
    client: &ScambusClient,
    stream: Option<String>,
    cursor: Cursor,
    temp: Option<String>,
) -> Result<()> {
    // The command either follows an existing stream or creates a throwaway
    // one that must be deleted on the way out.
    let (consumer_key, temporary) = match (stream, temp) {
        (Some(stream), None) => (stream, false),
        (None, Some(data_type)) => {
            let info = client
                .create_stream(&data_type, Some("scambus-cli follow"), None)
                .await?;
            eprintln!("created temporary stream {}", info.consumer_key);
            (info.consumer_key, true)
        }
        _ => bail!("provide a stream consumer key or --temp <DATA_TYPE>"),
    };

    let mut messages = client.follow_stream(&consumer_key, cursor, SseOptions::default());
    let result = loop {
        tokio::select! {
            message = messages.next() => match message {
                Some(Ok(message)) => println!("{}", serde_json::to_string(&message)?),
                Some(Err(err)) => break Err(err.into()),
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };
    messages.stop();

    if temporary {
        match client.delete_stream(&consumer_key).await {
            Ok(()) => eprintln!("deleted temporary stream {consumer_key}"),
            Err(err) => eprintln!("warning: failed to delete stream {consumer_key}: {err}"),
        }
    }
    result
}

async fn run_watch(client: &ScambusClient, channel: &str, cursor: Cursor) -> Result<()> {
    let socket = client.socket(SocketOptions::default())?;
    let guard = socket.on_fn(channel, "*", |envelope| async move {
        println!(
            "{}",
            serde_json::json!({
                "channel": envelope.channel,
                "event": envelope.event,
                "data": envelope.data,
            })
        );
        Ok(())
    });

    let runner = socket.clone();
    let run = tokio::spawn(async move { runner.run().await });

    // The run loop owns the connection; wait for it to come up before
    // sending the subscribe frame.
    let channel = channel.to_string();
    let subscriber = socket.clone();
    tokio::spawn(async move {
        loop {
            match subscriber.subscribe(&channel, cursor.clone()).await {
                Ok(()) => break,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(200)).await,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    socket.stop();
    drop(guard);
    run.await.context("socket task panicked")??;
    Ok(())
}
