mod account;
mod asset;
mod client;
mod perspective;
mod report;
mod settings;
mod tag;

use crate::account::AccountClient;
use crate::asset::AssetClient;
use crate::client::{ApiClient, DEFAULT_BASE_URL};
use crate::perspective::{AccountRef, Perspective, PerspectiveClient};
use crate::report::ReportClient;
use crate::settings::SettingsStore;
use crate::tag::{TagClient, TagTarget};
use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::{fs, path::PathBuf};

#[derive(Parser)]
#[command(
    name = "chapi",
    version,
    about = "CLI for the CloudHealth API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "API key override for this invocation (otherwise CHAPI_KEY or the settings file)"
    )]
    api_key: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://chapi.cloudhealthtech.com)"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist an API key to ~/.cloudhealthapi.json
    Configure {
        #[arg(long)]
        key: String,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// AWS account operations
    #[command(subcommand, visible_aliases = ["account", "acct"])]
    Accounts(AccountsCommand),
    /// Perspective operations
    #[command(subcommand, visible_aliases = ["perspective", "pers"])]
    Perspectives(PerspectivesCommand),
    /// Asset search operations
    #[command(subcommand, visible_alias = "asset")]
    Assets(AssetsCommand),
    /// Tag operations
    #[command(subcommand, visible_alias = "tag")]
    Tags(TagsCommand),
    /// Report operations
    #[command(subcommand, visible_alias = "report")]
    Reports(ReportsCommand),
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum AccountsCommand {
    /// List accounts (one page unless --all)
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long, value_name = "N", help = "Accounts per page")]
        page_count: Option<u32>,
        #[arg(long, help = "Fetch every page")]
        all: bool,
        #[arg(long, help = "Show page and total counts instead of accounts")]
        stats: bool,
    },
    /// Fetch an account by ID
    Get {
        #[arg(value_name = "ACCOUNT_ID")]
        id: String,
    },
    /// Find accounts whose field matches a pattern (case-insensitive regex)
    FindBy {
        #[arg(value_name = "FIELD")]
        field: String,
        #[arg(value_name = "PATTERN")]
        value: String,
    },
    /// Create an account from a JSON body
    Create {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Update the account identified by the body's id field
    Update {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Delete an account by ID
    Destroy {
        #[arg(value_name = "ACCOUNT_ID")]
        id: String,
    },
    /// Configure pending accounts from a CSV export
    UpdateFromCsv {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum PerspectivesCommand {
    /// List perspectives as an id-to-name map
    List {
        #[arg(long, help = "Re-use the cached listing when present")]
        cache: bool,
    },
    /// Fetch a perspective schema by ID or name
    Get {
        #[arg(value_name = "ID_OR_NAME")]
        perspective: String,
        #[arg(long, help = "Resolve names through the cached listing")]
        cache: bool,
    },
    /// List the static groups of a perspective
    Groups {
        #[arg(value_name = "ID_OR_NAME")]
        perspective: String,
    },
    /// Add accounts to a static group of a perspective
    AddToGroup {
        #[arg(value_name = "ID_OR_NAME")]
        perspective: String,
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "ACCOUNT_ID", required = true, num_args = 1..)]
        accounts: Vec<String>,
    },
    /// Remove an account reference from every rule of a perspective
    RemoveAccount {
        #[arg(value_name = "ID_OR_NAME")]
        perspective: String,
        #[arg(value_name = "ACCOUNT_REF")]
        account_ref: String,
    },
    /// Create a perspective from a JSON schema
    Create {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Replace a perspective schema (the body carries the id)
    Update {
        #[arg(long, value_name = "JSON", help = "Inline JSON body")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON body")]
        body_file: Option<PathBuf>,
    },
    /// Delete a perspective by ID
    Destroy {
        #[arg(value_name = "PERSPECTIVE_ID")]
        id: String,
        #[arg(long, help = "Delete even when the perspective is in use")]
        force: bool,
        #[arg(long, help = "Skip the trash and delete permanently (implies --force)")]
        hard_delete: bool,
    },
}

#[derive(Subcommand)]
enum AssetsCommand {
    /// List the searchable asset types
    ListTypes,
    /// List the queryable fields of an asset type
    FieldsFor {
        #[arg(value_name = "TYPE")]
        asset_type: String,
    },
    /// Search assets of a type, optionally filtered by a JSON match object
    Query {
        #[arg(value_name = "TYPE")]
        asset_type: String,
        #[arg(long, value_name = "JSON", help = "Inline JSON match object")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON match object")]
        body_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TagsCommand {
    /// Set tags on an account or asset from a JSON object
    Set {
        #[arg(long, value_name = "OWNER_ID", help = "Tag a whole account by AWS owner id")]
        owner_id: Option<String>,
        #[arg(long, value_name = "ACCOUNT_ID", requires = "instance_id")]
        aws_account_id: Option<String>,
        #[arg(long, value_name = "INSTANCE_ID", requires = "aws_account_id")]
        instance_id: Option<String>,
        #[arg(long, value_name = "JSON", help = "Inline JSON tag object")]
        body: Option<String>,
        #[arg(long, value_name = "FILE", help = "Path to JSON tag object")]
        body_file: Option<PathBuf>,
    },
    /// Delete tags by key from an account or asset
    Delete {
        #[arg(long, value_name = "OWNER_ID", help = "Untag a whole account by AWS owner id")]
        owner_id: Option<String>,
        #[arg(long, value_name = "ACCOUNT_ID", requires = "instance_id")]
        aws_account_id: Option<String>,
        #[arg(long, value_name = "INSTANCE_ID", requires = "aws_account_id")]
        instance_id: Option<String>,
        #[arg(value_name = "KEY", required = true, num_args = 1..)]
        keys: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ReportsCommand {
    /// List report topics, or the reports under one topic
    List {
        #[arg(value_name = "TOPIC")]
        topic: Option<String>,
        #[arg(long, help = "List every topic with its reports attached")]
        nest: bool,
    },
    /// Fetch report data by ID (numeric IDs address custom reports)
    Get {
        #[arg(value_name = "REPORT_ID")]
        id: String,
    },
    /// List the dimensions and measures of a report base such as cost/history
    Dimensions {
        #[arg(value_name = "BASE")]
        base: String,
        #[arg(long, help = "Show only label and name per entry")]
        short: bool,
    },
    /// Generate a custom report
    Generate {
        #[arg(value_name = "BASE")]
        base: String,
        #[arg(long, value_name = "DIMENSION", help = "X-axis dimension")]
        x: String,
        #[arg(long, value_name = "MEASURE", help = "Y-axis measure")]
        y: String,
        #[arg(long, value_name = "DIMENSION", help = "Category dimension")]
        category: String,
        #[arg(long, value_name = "INTERVAL", help = "Time interval, e.g. monthly")]
        interval: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let store = SettingsStore::new(SettingsStore::default_path()?);

    match &cli.command {
        Commands::Configure { key } => {
            store.set_api_key(key)?;
            println!("Saved API key to {}", store.path().display());
            return Ok(());
        }
        Commands::ConfigShow => {
            let mut settings = store.load()?;
            if settings.creds.api_key.is_some() {
                settings.creds.api_key = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let effective = settings::resolve(&store, cli.api_key.clone())?;
    let base_url = cli.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let api = ApiClient::new(base_url, &effective.api_key)?;
    let output = cli.output;

    match cli.command {
        Commands::Accounts(command) => {
            let client = AccountClient::new(&api);
            match command {
                AccountsCommand::List {
                    page,
                    page_count,
                    all,
                    stats,
                } => {
                    if stats {
                        print_json(&serde_json::to_value(client.stats()?)?, output)?;
                    } else if all {
                        print_json(&Value::Array(client.list_all()?), output)?;
                    } else {
                        print_json(&Value::Array(client.list(page, page_count)?), output)?;
                    }
                }
                AccountsCommand::Get { id } => print_json(&client.get(&id)?, output)?,
                AccountsCommand::FindBy { field, value } => {
                    print_json(&Value::Array(client.find_by(&field, &value, None)?), output)?
                }
                AccountsCommand::Create { body, body_file } => {
                    let account = require_body(&body, &body_file)?;
                    print_json(&client.create(account)?, output)?
                }
                AccountsCommand::Update { body, body_file } => {
                    let account = require_body(&body, &body_file)?;
                    print_json(&client.update(account)?, output)?
                }
                AccountsCommand::Destroy { id } => println!("{}", client.destroy(&id)?),
                AccountsCommand::UpdateFromCsv { file } => {
                    let csv = fs::read_to_string(&file)
                        .with_context(|| format!("reading {}", file.display()))?;
                    for line in client.bulk_update_from_csv(&csv)? {
                        println!("{}", line);
                    }
                }
            }
        }
        Commands::Perspectives(command) => {
            let client = PerspectiveClient::new(&api, &store);
            match command {
                PerspectivesCommand::List { cache } => print_json(&client.list(cache)?, output)?,
                PerspectivesCommand::Get { perspective, cache } => {
                    let schema = client.get(&perspective, cache)?;
                    print_json(&serde_json::to_value(&schema)?, output)?
                }
                PerspectivesCommand::Groups { perspective } => {
                    let groups = client.list_groups(&perspective)?;
                    print_json(&serde_json::to_value(&groups)?, output)?
                }
                PerspectivesCommand::AddToGroup {
                    perspective,
                    group,
                    accounts,
                } => {
                    let refs = accounts.into_iter().map(AccountRef::Id).collect();
                    let updated = client.add_to_group_by_id(&perspective, refs, &group)?;
                    print_json(&serde_json::to_value(&updated)?, output)?
                }
                PerspectivesCommand::RemoveAccount {
                    perspective,
                    account_ref,
                } => {
                    let updated = client.remove_account(&perspective, &account_ref)?;
                    print_json(&serde_json::to_value(&updated)?, output)?
                }
                PerspectivesCommand::Create { body, body_file } => {
                    let schema = require_body(&body, &body_file)?;
                    print_json(&client.create(schema)?, output)?
                }
                PerspectivesCommand::Update { body, body_file } => {
                    let document = require_body(&body, &body_file)?;
                    let schema = match document {
                        Value::Object(mut map) if map.contains_key("schema") => {
                            map.remove("schema").unwrap_or(Value::Null)
                        }
                        other => other,
                    };
                    let perspective: Perspective = serde_json::from_value(schema)
                        .context("parsing body as a perspective schema")?;
                    let updated = client.update(perspective)?;
                    print_json(&serde_json::to_value(&updated)?, output)?
                }
                PerspectivesCommand::Destroy {
                    id,
                    force,
                    hard_delete,
                } => println!("{}", client.destroy(&id, force, hard_delete)?),
            }
        }
        Commands::Assets(command) => {
            let client = AssetClient::new(&api);
            match command {
                AssetsCommand::ListTypes => {
                    print_json(&Value::Array(client.list_types()?), output)?
                }
                AssetsCommand::FieldsFor { asset_type } => {
                    print_json(&Value::Array(client.fields_for(&asset_type)?), output)?
                }
                AssetsCommand::Query {
                    asset_type,
                    body,
                    body_file,
                } => {
                    let matches = match parse_body(&body, &body_file)? {
                        Some(Value::Object(map)) => map,
                        Some(_) => return Err(anyhow!("match body must be a JSON object")),
                        None => serde_json::Map::new(),
                    };
                    print_json(&Value::Array(client.query(&asset_type, &matches)?), output)?
                }
            }
        }
        Commands::Tags(command) => {
            let client = TagClient::new(&api);
            match command {
                TagsCommand::Set {
                    owner_id,
                    aws_account_id,
                    instance_id,
                    body,
                    body_file,
                } => {
                    let target = tag_target(owner_id, aws_account_id, instance_id)?;
                    let tags = match require_body(&body, &body_file)? {
                        Value::Object(map) => map,
                        _ => return Err(anyhow!("tag body must be a JSON object")),
                    };
                    print_json(&client.set(&target, &tags)?, output)?
                }
                TagsCommand::Delete {
                    owner_id,
                    aws_account_id,
                    instance_id,
                    keys,
                } => {
                    let target = tag_target(owner_id, aws_account_id, instance_id)?;
                    print_json(&client.delete(&target, &keys)?, output)?
                }
            }
        }
        Commands::Reports(command) => {
            let client = ReportClient::new(&api);
            match command {
                ReportsCommand::List { topic, nest } => {
                    let topics = if nest {
                        client.list_nested()?
                    } else {
                        client.list(topic.as_deref())?
                    };
                    print_json(&serde_json::to_value(&topics)?, output)?
                }
                ReportsCommand::Get { id } => print_json(&client.get(&id)?, output)?,
                ReportsCommand::Dimensions { base, short } => {
                    print_json(&client.dimensions(&base, short)?, output)?
                }
                ReportsCommand::Generate {
                    base,
                    x,
                    y,
                    category,
                    interval,
                } => print_json(
                    &client.generate(&base, &x, &y, &category, interval.as_deref())?,
                    output,
                )?,
            }
        }
        Commands::Configure { .. } | Commands::ConfigShow | Commands::Completion { .. } => {
            unreachable!("handled earlier")
        }
    }

    Ok(())
}

fn print_json(value: &Value, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
    }
    Ok(())
}

fn tag_target(
    owner_id: Option<String>,
    aws_account_id: Option<String>,
    instance_id: Option<String>,
) -> Result<TagTarget> {
    match (owner_id, aws_account_id, instance_id) {
        (Some(owner_id), None, None) => Ok(TagTarget::Account { owner_id }),
        (None, Some(aws_account_id), Some(instance_id)) => Ok(TagTarget::Asset {
            aws_account_id,
            instance_id,
        }),
        _ => Err(anyhow!(
            "use either --owner-id or both --aws-account-id and --instance-id"
        )),
    }
}

fn require_body(body: &Option<String>, body_file: &Option<PathBuf>) -> Result<Value> {
    parse_body(body, body_file)?
        .ok_or_else(|| anyhow!("Provide --body or --body-file with JSON content"))
}

fn parse_body(body: &Option<String>, body_file: &Option<PathBuf>) -> Result<Option<Value>> {
    match (body, body_file) {
        (Some(inline), None) => {
            let value = serde_json::from_str(inline).context("parsing --body as JSON")?;
            Ok(Some(value))
        }
        (None, Some(path)) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading body file {}", path.display()))?;
            let value = serde_json::from_str(&content).context("parsing --body-file as JSON")?;
            Ok(Some(value))
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err(anyhow!("use only one of --body or --body-file")),
    }
}
