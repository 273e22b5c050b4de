//! Categories command - view and edit the expense category set.

use clap::{Args, Subcommand};
use console::style;

use rcpt_core::{CategorySet, CategoryStore};

use super::{categories_path, load_config};

/// Arguments for the categories command.
#[derive(Args)]
pub struct CategoriesArgs {
    #[command(subcommand)]
    command: CategoriesCommand,
}

#[derive(Subcommand)]
enum CategoriesCommand {
    /// List categories in classification order
    List {
        /// Also show each category's keywords
        #[arg(short, long)]
        keywords: bool,
    },

    /// Add a new category
    Add {
        /// Category name
        name: String,

        /// Comma-separated keywords
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,
    },

    /// Remove a category
    Remove {
        /// Category name
        name: String,
    },

    /// Add a keyword to an existing category
    AddKeyword {
        /// Category name
        category: String,
        /// Keyword to match
        keyword: String,
    },

    /// Restore the default category set
    Reset,
}

pub async fn run(args: CategoriesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = categories_path(&config);
    let store = CategoryStore::load(&path)?;

    match args.command {
        CategoriesCommand::List { keywords } => {
            print!("{}", render_list(&store.snapshot(), keywords));
            return Ok(());
        }
        CategoriesCommand::Add { name, keywords } => {
            let keywords: Vec<&str> = keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).collect();
            store.add(&name, &keywords)?;
            println!(
                "{} Added category '{}' ({} keywords)",
                style("✓").green(),
                name,
                keywords.len()
            );
        }
        CategoriesCommand::Remove { name } => {
            store.remove(&name)?;
            println!("{} Removed category '{}'", style("✓").green(), name);
        }
        CategoriesCommand::AddKeyword { category, keyword } => {
            store.add_keyword(&category, &keyword)?;
            println!(
                "{} Added keyword '{}' to '{}'",
                style("✓").green(),
                keyword,
                category
            );
        }
        CategoriesCommand::Reset => {
            store.replace(CategorySet::default());
            println!("{} Restored default categories", style("✓").green());
        }
    }

    store.save(&path)?;
    println!("{} Saved to {}", style("ℹ").blue(), path.display());

    Ok(())
}

fn render_list(set: &CategorySet, with_keywords: bool) -> String {
    let mut output = String::new();

    for category in set.categories() {
        if with_keywords && !category.keywords.is_empty() {
            output.push_str(&format!("{}: {}\n", category.name, category.keywords.join(", ")));
        } else {
            output.push_str(&format!("{}\n", category.name));
        }
    }

    output
}
