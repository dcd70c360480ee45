//! Command handlers. Each one works on an opened [`Collection`].

use std::{fs, path::Path};

use anyhow::{Context, Result};
use gamevault_core::{
    Category, Collection, CollectionItem, ExportOptions, Format, GameStatus, ItemDraft, Rating,
};
use tracing::info;

use crate::cli::{AddArgs, Command, ExportArgs};

pub fn run(collection: &mut Collection, command: Command) -> Result<()> {
    match command {
        Command::List { status } => list(collection, status),
        Command::Add(args) => add(collection, args),
        Command::Status { id, status } => {
            let item = collection.set_status(&id, status)?;
            println!("{} is now {}", item.title, item.status);
            Ok(())
        }
        Command::Remove { id } => {
            let item = collection.remove(&id)?;
            println!("removed {}", item.title);
            Ok(())
        }
        Command::Import { file, format } => import(collection, &file, format),
        Command::Export(args) => export(collection, args),
        Command::Search {
            query,
            status,
            category,
        } => search(collection, &query, status, category),
        Command::Suggest { query } => {
            collection.search().set_query(query);
            collection.search().commit_query();
            for suggestion in collection.suggestions() {
                match suggestion.count {
                    Some(count) => println!("{:<10} {} ({count})", suggestion.kind, suggestion.text),
                    None => println!("{:<10} {}", suggestion.kind, suggestion.text),
                }
            }
            Ok(())
        }
        Command::History { clear, remove } => {
            let search = collection.search();
            if clear {
                search.clear_history()?;
            } else if let Some(query) = remove {
                search.remove_history_entry(&query)?;
            }
            for entry in search.history() {
                println!("{entry}");
            }
            Ok(())
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&collection.stats())?);
            Ok(())
        }
    }
}

fn list(collection: &Collection, status: Option<GameStatus>) -> Result<()> {
    let items = collection
        .items()
        .iter()
        .filter(|item| status.map_or(true, |status| item.status == status));
    for item in items {
        print_item(item);
    }
    Ok(())
}

fn print_item(item: &CollectionItem) {
    let rating = item
        .rating
        .map(|rating| format!("{rating}/10"))
        .unwrap_or_else(|| "-".to_string());
    println!("{}  {:<10} {:>5}  {}", item.id, item.status, rating, item.title);
}

fn add(collection: &mut Collection, args: AddArgs) -> Result<()> {
    let mut draft = ItemDraft::new(args.title, args.categories, args.platforms);
    draft.status = args.status;
    draft.rating = args.rating.map(Rating::new).transpose()?;
    draft.hours_played = args.hours;
    draft.developer = args.developer;
    draft.publisher = args.publisher;
    draft.notes = args.notes;

    let item = collection.add(draft)?;
    println!("{}", item.id);
    Ok(())
}

fn import(collection: &mut Collection, file: &Path, format: Format) -> Result<()> {
    let input = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let result = collection.import(&input, format);
    println!("{}", result.summary());
    for error in &result.errors {
        println!("  {error}");
    }
    Ok(())
}

fn export(collection: &Collection, args: ExportArgs) -> Result<()> {
    let options = ExportOptions {
        include_metadata: !args.no_metadata,
        include_notes: !args.no_notes,
        include_ratings: !args.no_ratings,
        base_name: args.name,
    };
    let file = collection.export(args.format, &options)?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let path = args.out.join(&file.filename);
    fs::write(&path, &file.content).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "export written");
    println!("exported {} games to {}", file.item_count, path.display());
    Ok(())
}

fn search(
    collection: &Collection,
    query: &str,
    status: Option<GameStatus>,
    category: Option<Category>,
) -> Result<()> {
    let search = collection.search();
    search.set_status_filter(status);
    search.set_category_filter(category);
    search.set_query(query);
    search.commit_query();
    search.record_history(query)?;
    for item in collection.search_results() {
        print_item(item);
    }
    Ok(())
}
