use std::fs::File;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::prelude::*;

use sui_state_walker::cancel::cancel_pair;
use sui_state_walker::config::RpcConfig;
use sui_state_walker::ledger::{read_dynamic_field, read_object};
use sui_state_walker::rpc::SuiRpcClient;
use sui_state_walker::schema::{DynamicField, DynamicFieldName, MoveStruct, TableField, UID};
use sui_state_walker::types::ObjectId;
use sui_state_walker::walker::collect_table;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    rpc: RpcConfig,
    app: ObjectId,
    proposal: ObjectId,
}

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Application {
    id: UID,
    comments: TableField,
}

/// `0x2::table_vec::TableVec`: a table keyed by index.
#[derive(Debug, Deserialize)]
struct TableVec {
    contents: TableField,
}

type ProposalComments = DynamicField<ObjectId, MoveStruct<TableVec>>;
type CommentEntry = DynamicField<serde_json::Value, MoveStruct<serde_json::Value>>;

#[tokio::main]
async fn main() {
    let result = _main().await;
    result.unwrap();
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer().with_test_writer();

    let http_filter = tracing_subscriber::filter::Targets::new()
        .with_target("reqwest", tracing::Level::WARN)
        .with_target("hyper", tracing::Level::WARN)
        .with_default(tracing_subscriber::fmt::Subscriber::DEFAULT_MAX_LEVEL);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(http_filter)
        .init();

    let Cli { config_path } = Cli::parse();

    tracing::info!("Config file {:?}", config_path);
    let file = File::open(&config_path).with_context(|| {
        format!(
            "Cannot read config file {path}",
            path = config_path.display()
        )
    })?;
    let config: Config = serde_yaml::from_reader(file).with_context(|| {
        format!(
            "Cannot read config file {path}",
            path = config_path.display()
        )
    })?;

    let client = SuiRpcClient::new(&config.rpc)?;
    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            handle.cancel();
        }
    });

    let app = read_object::<Application, _>(&client, config.app).await?;
    tracing::info!(
        "application {} has comments for {} proposals",
        app.fields.id.id,
        app.fields.comments.fields.size
    );

    let comments = read_dynamic_field::<ObjectId, MoveStruct<TableVec>, _>(
        &client,
        app.fields.comments.table_id(),
        &DynamicFieldName::object_id(config.proposal),
    )
    .await?
    .ok_or_else(|| anyhow!("no comments on proposal {}", config.proposal))?;
    let ProposalComments { value, .. } = comments.fields;
    let contents = value.fields.contents;
    tracing::info!(
        "{} comments on proposal {} in {}",
        contents.fields.size,
        config.proposal,
        contents.table_id()
    );

    let entries =
        collect_table::<CommentEntry, _>(&client, contents.table_id(), Some(cancel)).await?;
    for entry in entries {
        tracing::info!(
            "comment {} ({}): {}",
            entry.fields.name,
            entry.fields.value.struct_type,
            entry.fields.value.fields
        );
    }

    Ok(())
}
