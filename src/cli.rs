use clap::{Parser, Subcommand};

use crate::models::{Namespace, TagPayload};
use crate::store::TagStore;

#[derive(Parser)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "taglet - live tag expansion",
)]
pub struct Taglet {
    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add or overwrite a tag
    Add {
        #[clap(help = "The tag, typed as /tag/")]
        tag: String,

        #[clap(help = "Replacement text, or an image id with --image")]
        content: String,

        #[clap(long, help = "Store as an image reference")]
        image: bool,
    },
    /// Delete a tag
    Delete {
        tag: String,

        #[clap(long, help = "Delete from the image namespace")]
        image: bool,
    },
    /// List tags
    List {
        #[clap(long, help = "List the image namespace")]
        image: bool,

        #[clap(long, help = "Newest first instead of alphabetical")]
        newest: bool,
    },
    /// Toggle a tag's favorite status (favorites rank higher)
    Favorite { tag: String },
    /// Start the background daemon
    Start,
    /// Stop the background daemon
    Stop,
    /// Check whether the daemon is running
    Status,
}

fn open(image: bool) -> TagStore {
    if image {
        TagStore::open(Namespace::Image)
    } else {
        TagStore::open(Namespace::CustomText)
    }
}

pub fn add_tag(tag: &str, content: String, image: bool) {
    let payload = if image {
        TagPayload::ImageRef(content)
    } else {
        TagPayload::Text(content)
    };
    if open(image).set(tag, payload) {
        println!("Added tag '{}'", tag.trim().to_lowercase());
    } else {
        eprintln!("Nothing added: tag and content must be non-empty");
    }
}

pub fn delete_tag(tag: &str, image: bool) {
    if open(image).remove(tag) {
        println!("Deleted tag '{}'", tag.trim().to_lowercase());
    } else {
        eprintln!("No such tag: '{}'", tag);
    }
}

pub fn list_tags(image: bool, newest: bool) {
    let store = open(image);
    let records = if newest {
        store.records_newest_first()
    } else {
        store.records_alphabetical()
    };

    if records.is_empty() {
        println!("No tags yet. Add one with: taglet add <tag> <content>");
        return;
    }
    for record in records {
        let marker = if store.is_favorite(&record.tag) { "★ " } else { "" };
        println!("{}{} -> {}", marker, record.tag, record.payload.as_insert_text());
    }
}

pub fn favorite_tag(tag: &str) {
    let mut store = open(false);
    if store.get(tag).is_none() {
        eprintln!("No such tag: '{}'", tag);
        return;
    }
    if store.toggle_favorite(tag) {
        println!("'{}' is now a favorite", tag.trim().to_lowercase());
    } else {
        println!("'{}' is no longer a favorite", tag.trim().to_lowercase());
    }
}
