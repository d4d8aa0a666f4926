use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands::{self, display_path, TagLine};
use inventory_core::config;
use inventory_core::models::{Item, ItemId};
use inventory_core::Catalog;
use serde::Serialize;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let catalog = Catalog::open(&cfg).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            println!("Initialised {} (images in {})", cfg.database.path, cfg.images.base_path);
            Ok(())
        }
        Commands::Add {
            name,
            types,
            locations,
            manufacturer,
        } => {
            let item = commands::add_item(&catalog, &name, &types, &locations, manufacturer).await?;
            print_items(&[item], json)
        }
        Commands::Show { id } => {
            let item = commands::show_item(&catalog, id).await?;
            print_items(&[item], json)
        }
        Commands::Items { archived, query } => {
            let items = commands::list_items(&catalog, archived, query.as_deref()).await?;
            print_items(&items, json)
        }
        Commands::Tags { category, order } => {
            let tags = commands::list_tags(&catalog, category.as_deref(), &order).await?;
            print_tags(&tags, json)
        }
        Commands::TopTags { category } => {
            let tags = commands::top_tags(&catalog, &category).await?;
            print_tags(&tags, json)
        }
        Commands::Delete { id } => print_changes("deleted", id, catalog.delete_item(id).await?, json),
        Commands::Archive { id } => {
            print_changes("archived", id, catalog.archive_item(id).await?, json)
        }
        Commands::Unarchive { id } => {
            print_changes("unarchived", id, catalog.unarchive_item(id).await?, json)
        }
        Commands::Upload {
            id,
            files,
            generate_names,
        } => {
            let stored = commands::upload(&catalog, id, &files, generate_names).await?;
            print_names(&stored, json)
        }
        Commands::Images { id } => print_names(&catalog.item_images(id).await?, json),
        Commands::Image {
            id,
            filename,
            width,
            height,
        } => {
            let path = commands::image_path(&catalog, id, &filename, width, height).await?;
            if json {
                println!("{}", serde_json::json!({ "path": display_path(&path) }));
            } else {
                println!("{}", display_path(&path));
            }
            Ok(())
        }
        Commands::RmImage { id, filename } => {
            let removed = catalog.delete_image(id, &filename).await?;
            if json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {removed} file(s)");
            }
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "inventory")]
#[command(about = "Inventory catalog maintenance", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and image root
    Init,
    /// Add an item
    Add {
        name: String,
        /// Type tags (comma-separated)
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        types: Vec<String>,
        /// Location tags (comma-separated)
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        locations: Vec<String>,
        #[arg(long)]
        manufacturer: Option<String>,
    },
    /// Show one item
    Show { id: ItemId },
    /// List items, or search them with --query
    Items {
        /// Archived items instead of active ones
        #[arg(long, default_value_t = false)]
        archived: bool,
        /// Full-text query
        #[arg(short, long)]
        query: Option<String>,
    },
    /// List tags with their reference counts
    Tags {
        /// type|location
        #[arg(long)]
        category: Option<String>,
        /// count|name|id
        #[arg(long, default_value = "count")]
        order: String,
    },
    /// Most referenced tags of a category
    TopTags {
        #[arg(default_value = "type")]
        category: String,
    },
    /// Soft-delete an item, dropping its tags and images
    Delete { id: ItemId },
    /// Archive an item, dropping its tags and images
    Archive { id: ItemId },
    /// Restore an archived item
    Unarchive { id: ItemId },
    /// Store image files for an item
    Upload {
        id: ItemId,
        files: Vec<PathBuf>,
        /// Name uploads from timestamp and content instead of their file names
        #[arg(long, default_value_t = false)]
        generate_names: bool,
    },
    /// List an item's original images
    Images { id: ItemId },
    /// Print the path of an image, generating the derivative if needed
    Image {
        id: ItemId,
        filename: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Delete an image and its derivatives
    RmImage { id: ItemId, filename: String },
}

fn print_items(items: &[Item], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    for item in items {
        let id = item.id.map(|i| i.to_string()).unwrap_or_default();
        let types: Vec<&str> = item.types().iter().map(String::as_str).collect();
        let locations: Vec<&str> = item.locations().iter().map(String::as_str).collect();
        println!(
            "{id}\t{}\ttypes={}\tlocations={}\t{:?}",
            item.name,
            types.join(","),
            locations.join(","),
            item.lifecycle()
        );
    }
    Ok(())
}

fn print_tags(tags: &[TagLine], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tags)?);
        return Ok(());
    }
    for t in tags {
        println!("{}\t{}\t{}", t.category, t.name, t.count);
    }
    Ok(())
}

fn print_names(names: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(names)?);
    } else {
        for n in names {
            println!("{n}");
        }
    }
    Ok(())
}

fn print_changes<T: Serialize>(verb: &str, id: ItemId, changes: T, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({ "item": id, "status": verb, "tags": changes })
        );
    } else {
        println!("Item {id} {verb}");
    }
    Ok(())
}
