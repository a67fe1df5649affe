use clap::{Parser, Subcommand, ValueEnum};
use paperdb::schema::parse_schema_str;
use paperdb::{IdStrategy, Item, KeyValue, Query, Store, StoreOptions};
use std::path::PathBuf;
use std::process;

/// PaperDB CLI — work with a PaperDB database file from the command line
#[derive(Parser)]
#[command(name = "paperdb", version, about)]
struct Cli {
    /// Storage directory holding database files (default: .db)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Database file inside the storage directory
    #[arg(long, default_value = "test.json")]
    file: String,

    /// YAML file with store options (dir, id_strategy, pretty)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How new item ids are generated
    #[arg(long)]
    id_strategy: Option<IdArg>,

    /// Pretty-print the database file
    #[arg(long)]
    pretty: bool,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, ValueEnum)]
enum IdArg {
    Uuid,
    Ulid,
    Nanoid,
}

impl From<IdArg> for IdStrategy {
    fn from(arg: IdArg) -> Self {
        match arg {
            IdArg::Uuid => IdStrategy::Uuid,
            IdArg::Ulid => IdStrategy::Ulid,
            IdArg::Nanoid => IdStrategy::Nanoid,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a new empty database file
    CreateFile {
        /// File name inside the storage directory
        name: String,
    },

    /// List collections in the database file
    Collections,

    /// Create a collection
    AddCollection {
        /// Collection name (first letter is upper-cased)
        name: String,
        /// Field types, e.g. --schema '{name: string, age: number}'
        #[arg(long)]
        schema: Option<String>,
    },

    /// Show a collection's schema and items
    ShowCollection {
        /// Collection name
        name: String,
    },

    /// Delete a collection and all of its items
    DropCollection {
        /// Collection name
        name: String,
    },

    /// Insert an item
    Insert {
        /// Collection name
        collection: String,
        /// Field values (e.g. --field name=John --field age=20)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Whole item as a JSON object
        #[arg(long, conflicts_with = "fields")]
        json: Option<String>,
    },

    /// Insert several items from a JSON array, all or nothing
    InsertMany {
        /// Collection name
        collection: String,
        /// JSON array of objects
        items: String,
    },

    /// Find items; only the first --where filter is applied
    Find {
        /// Collection name
        collection: String,
        /// Equality filter (e.g. --where age=20)
        #[arg(long = "where", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Find the first matching item
    FindOne {
        /// Collection name
        collection: String,
        /// Equality filter (e.g. --where name=John)
        #[arg(long = "where", value_parser = parse_key_value, required = true)]
        filters: Vec<(String, String)>,
    },

    /// Find an item by its id
    FindById {
        /// Collection name
        collection: String,
        /// Item id
        id: String,
    },

    /// Update the first item where KEY equals VALUE
    Update {
        /// Collection name
        collection: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
        /// Field values to set (e.g. --field age=21)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete the first item where KEY equals VALUE
    Delete {
        /// Collection name
        collection: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
    },

    /// Print the whole database
    Dump,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn load_options(cli: &Cli) -> Result<StoreOptions, Box<dyn std::error::Error>> {
    let mut options = match &cli.config {
        Some(path) => StoreOptions::from_yaml_file(path)?,
        None => StoreOptions::default(),
    };
    if let Some(dir) = &cli.dir {
        options = options.dir(dir);
    }
    if let Some(strategy) = &cli.id_strategy {
        options = options.id_strategy(strategy.clone().into());
    }
    if cli.pretty {
        options = options.pretty(true);
    }
    Ok(options)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(&cli)?;
    let mut store = Store::open_with(options, &cli.file)?;

    match cli.command {
        Command::CreateFile { name } => {
            let path = store.create_file(&name)?;
            print_output(
                &serde_json::json!({ "ok": true, "path": path.display().to_string() }),
                &cli.format,
            );
        }

        Command::Collections => {
            let names = store.collections().names();
            print_output(&serde_json::json!(names), &cli.format);
        }

        Command::AddCollection { name, schema } => {
            let schema = schema.as_deref().map(parse_schema_str).transpose()?;
            let name = store.collections().add(&name, schema)?;
            print_output(&serde_json::json!({ "ok": true, "collection": name }), &cli.format);
        }

        Command::ShowCollection { name } => {
            let record = store.collections().find(&name)?;
            print_output(&serde_json::to_value(record)?, &cli.format);
        }

        Command::DropCollection { name } => {
            let record = store.collections().delete(&name)?;
            print_output(
                &serde_json::json!({ "ok": true, "deleted_items": record.data.len() }),
                &cli.format,
            );
        }

        Command::Insert {
            collection,
            fields,
            json,
        } => {
            let item = match json {
                Some(text) => paperdb::document::item_from_value(serde_json::from_str(&text)?)?,
                None => fields_to_item(&fields),
            };
            let stored = store.collection(&collection)?.insert(item)?;
            print_output(&serde_json::Value::Object(stored), &cli.format);
        }

        Command::InsertMany { collection, items } => {
            let values: Vec<serde_json::Value> = serde_json::from_str(&items)?;
            let items = values
                .into_iter()
                .map(paperdb::document::item_from_value)
                .collect::<paperdb::Result<Vec<Item>>>()?;
            let stored = store.collection(&collection)?.insert_many(items)?;
            print_output(&serde_json::to_value(stored)?, &cli.format);
        }

        Command::Find { collection, filters } => {
            let query = (!filters.is_empty()).then(|| fields_to_item(&filters));
            let found = store.collection(&collection)?.find(query.as_ref())?;
            print_output(&serde_json::to_value(found)?, &cli.format);
        }

        Command::FindOne { collection, filters } => {
            let query: Query = fields_to_item(&filters);
            let found = store.collection(&collection)?.find_one(&query)?;
            print_output(&serde_json::to_value(found)?, &cli.format);
        }

        Command::FindById { collection, id } => {
            let found = store.collection(&collection)?.find_by_id(&id)?;
            print_output(&serde_json::to_value(found)?, &cli.format);
        }

        Command::Update {
            collection,
            key,
            value,
            fields,
        } => {
            let filter = KeyValue::new(key, parse_value(&value));
            let patch = fields_to_item(&fields);
            let updated = store.collection(&collection)?.update(&filter, &patch)?;
            print_output(&serde_json::Value::Object(updated), &cli.format);
        }

        Command::Delete {
            collection,
            key,
            value,
        } => {
            let filter = KeyValue::new(key, parse_value(&value));
            let removed = store.collection(&collection)?.delete(&filter)?;
            print_output(
                &serde_json::json!({ "ok": true, "deleted": removed }),
                &cli.format,
            );
        }

        Command::Dump => {
            let db = store.get()?;
            print_output(&serde_json::to_value(db)?, &cli.format);
        }
    }

    Ok(())
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => log::error!("Failed to render output: {e}"),
    }
}

/// Parse a CLI value as JSON (numbers, booleans, arrays, objects), falling back to a string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn fields_to_item(fields: &[(String, String)]) -> Item {
    let mut item = Item::new();
    for (key, val) in fields {
        item.insert(key.clone(), parse_value(val));
    }
    item
}
