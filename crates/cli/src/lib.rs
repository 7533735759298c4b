pub mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc_model::{DocumentId, EditorKind, ForumDocument};
use forum_cache::{
    CacheConfig, ConfirmPort, DraftKeyDeriver, KeyedCache, ScriptedPrompt, StoreBackend,
    TerminalPrompt,
};
use layout_core::{OverflowDetector, QueuedResizeSource, RegionId};
use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "forum-cli")]
#[command(about = "Inspect and edit locally autosaved forum drafts")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Storage backend: disk, memory or disabled.
    #[arg(long, global = true)]
    backend: Option<StoreBackend>,
    /// Directory for the disk backend.
    #[arg(long, global = true, value_name = "DIR")]
    store_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the storage key for a slot and whether restoring it asks first.
    Key {
        #[command(flatten)]
        slot: SlotArgs,
    },
    /// Print the saved draft for a slot, or null.
    Get {
        #[command(flatten)]
        slot: SlotArgs,
        /// Accept the restore prompt without asking.
        #[arg(long, conflicts_with = "no")]
        yes: bool,
        /// Decline the restore prompt without asking.
        #[arg(long)]
        no: bool,
    },
    /// Save a JSON draft into a slot.
    Set {
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long, value_name = "JSON")]
        state: String,
    },
    /// Forget the saved draft for a slot.
    Reset {
        #[command(flatten)]
        slot: SlotArgs,
    },
    /// Report whether measured heights reach a threshold, one line per height.
    Overflow {
        #[arg(long = "height", value_name = "PX", required = true, allow_negative_numbers = true)]
        heights: Vec<f32>,
        #[arg(long, value_name = "PX")]
        threshold: f32,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct SlotArgs {
    /// Id of a saved document.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    post_id: Option<String>,
    #[arg(long)]
    tag_id: Option<String>,
    #[arg(long)]
    parent_comment_id: Option<String>,
    /// Editor field the draft belongs to.
    #[arg(long, default_value = "contents")]
    field: String,
    /// Raw key prefix.
    #[arg(long, conflicts_with = "editor")]
    prefix: Option<String>,
    /// Use the key prefix of an editor: ckeditor, markdown or html.
    #[arg(long)]
    editor: Option<EditorKind>,
}

impl SlotArgs {
    fn document(&self) -> ForumDocument {
        ForumDocument {
            id: self.id.clone().map(DocumentId),
            post_id: self.post_id.clone().map(DocumentId),
            tag_id: self.tag_id.clone().map(DocumentId),
            parent_comment_id: self.parent_comment_id.clone().map(DocumentId),
        }
    }

    fn prefix(&self) -> &str {
        match (&self.prefix, self.editor) {
            (Some(prefix), _) => prefix,
            (None, Some(editor)) => editor.storage_prefix(),
            (None, None) => "",
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyOutput {
    key: String,
    verify: bool,
}

#[derive(Debug, Serialize)]
struct SetOutput {
    key: String,
    saved: bool,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        Commands::Key { slot } => run_key(&cli, slot),
        Commands::Get { slot, yes, no } => run_get(&cli, slot, *yes, *no),
        Commands::Set { slot, state } => run_set(&cli, slot, state),
        Commands::Reset { slot } => run_reset(&cli, slot),
        Commands::Overflow { heights, threshold } => {
            run_overflow(heights, *threshold);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Defaults, then the config file, then `FORUM_CACHE_*`, then flags.
fn resolve_config(cli: &Cli) -> Result<CacheConfig> {
    let config = match &cli.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CacheConfig::default(),
    };
    let mut config = config.merge_env().context("invalid cache environment")?;

    if let Some(backend) = cli.backend {
        config = config.with_backend(backend);
    }
    if let Some(dir) = &cli.store_dir {
        config = config.with_store_dir(dir);
    }
    tracing::debug!(backend = %config.backend, store_dir = %config.store_dir.display(), "config");
    Ok(config)
}

fn open_cache(cli: &Cli) -> Result<KeyedCache<DraftKeyDeriver>> {
    Ok(KeyedCache::from_config(&resolve_config(cli)?, DraftKeyDeriver))
}

fn run_key(cli: &Cli, slot: &SlotArgs) -> Result<()> {
    let cache = open_cache(cli)?;
    let (key, verify) = cache.key_for(&slot.document(), &slot.field, slot.prefix());
    print_json(&KeyOutput { key: key.to_string(), verify })
}

fn run_get(cli: &Cli, slot: &SlotArgs, yes: bool, no: bool) -> Result<()> {
    let prompt: Box<dyn ConfirmPort> = if yes {
        Box::new(ScriptedPrompt::accepting())
    } else if no {
        Box::new(ScriptedPrompt::declining())
    } else {
        Box::new(TerminalPrompt::stdio())
    };

    let cache = open_cache(cli)?.with_prompt(prompt);
    let saved: Option<Value> = cache.get(&slot.document(), &slot.field, slot.prefix());
    print_json(&saved)
}

fn run_set(cli: &Cli, slot: &SlotArgs, state: &str) -> Result<()> {
    let state: Value = serde_json::from_str(state).context("--state is not valid JSON")?;

    let cache = open_cache(cli)?;
    let doc = slot.document();
    let slot = cache.slot(&doc, &slot.field, slot.prefix());
    let saved = slot.set(&state);
    print_json(&SetOutput { key: slot.key().to_string(), saved })
}

fn run_reset(cli: &Cli, slot: &SlotArgs) -> Result<()> {
    let cache = open_cache(cli)?;
    let doc = slot.document();
    let slot = cache.slot(&doc, &slot.field, slot.prefix());
    slot.reset();
    println!("{}", slot.key());
    Ok(())
}

/// Feed each height to a detector as a layout pass and print the signal after it.
fn run_overflow(heights: &[f32], threshold: f32) {
    let source = QueuedResizeSource::new();
    let region = RegionId(1);
    let mut detector = OverflowDetector::new(&source);
    let signal = detector.observe(Some(region), threshold);

    for &height in heights {
        source.set_height(region, height);
        source.flush();
        println!("{}", signal.get());
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value).context("failed to encode output")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_args(args: &[&str]) -> SlotArgs {
        let cli = Cli::parse_from(["forum-cli", "key"].iter().chain(args));
        match cli.command {
            Commands::Key { slot } => slot,
            other => panic!("expected key command, got {other:?}"),
        }
    }

    #[test]
    fn editor_flag_selects_storage_prefix() {
        assert_eq!(slot_args(&["--editor", "markdown"]).prefix(), "markdown_");
        assert_eq!(slot_args(&["--prefix", "post_draft_"]).prefix(), "post_draft_");
        assert_eq!(slot_args(&[]).prefix(), "");
    }

    #[test]
    fn prefix_and_editor_conflict() {
        let result = Cli::try_parse_from([
            "forum-cli", "key", "--prefix", "x_", "--editor", "html",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn document_flags_build_the_document() {
        let doc = slot_args(&["--post-id", "p1", "--parent-comment-id", "c1"]).document();
        assert!(doc.is_new());
        assert_eq!(doc.post_id, Some(DocumentId::new("p1")));
        assert_eq!(doc.parent_comment_id, Some(DocumentId::new("c1")));
        assert_eq!(slot_args(&[]).field, "contents");
    }
}
