//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "binary"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Record listing, lookup, creation and deletion commands."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use splitwatch_client::ApiClient;
use splitwatch_common::format_duration;
use splitwatch_store::{NewTimingRecord, TimingRecord};

/// Record management commands.
#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// List saved records, newest last.
    List(ListOptions),
    /// Show a single record.
    Get {
        /// Record identifier.
        id: i64,
    },
    /// Save a record with an explicit duration.
    Save(SaveOptions),
    /// Delete a record.
    Delete {
        /// Record identifier.
        id: i64,
    },
    /// Show daemon status.
    Status,
}

#[derive(Debug, Args)]
pub struct ListOptions {
    /// Only records owned by this user.
    #[arg(long)]
    pub user: Option<i64>,
    /// Print raw JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SaveOptions {
    /// Elapsed milliseconds.
    #[arg(long)]
    pub duration: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub user: Option<i64>,
}

pub async fn run(client: &ApiClient, command: RecordCommand) -> Result<()> {
    match command {
        RecordCommand::List(options) => {
            let records = client.list_records(options.user).await?;
            if options.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No records");
            } else {
                for record in &records {
                    println!("{}", render_record(record));
                }
            }
        }
        RecordCommand::Get { id } => match client.get_record(id).await? {
            Some(record) => println!("{}", render_record(&record)),
            None => bail!("record {id} not found"),
        },
        RecordCommand::Save(options) => {
            let mut input = NewTimingRecord::new(options.duration);
            input.title = options.title;
            input.user_id = options.user;
            let record = client.create_record(&input).await?;
            println!("Saved {}", render_record(&record));
        }
        RecordCommand::Delete { id } => {
            if client.delete_record(id).await? {
                println!("Deleted record {id}");
            } else {
                bail!("record {id} not found");
            }
        }
        RecordCommand::Status => {
            let status = client.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn render_record(record: &TimingRecord) -> String {
    let user = record
        .user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "#{:<5} {:>14}  user={:<6} {}  {}",
        record.id,
        format_duration(record.duration_ms, true),
        user,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.title.as_deref().unwrap_or("")
    )
}
