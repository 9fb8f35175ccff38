use std::fs::File;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use futures::TryStreamExt;
use serde::Deserialize;
use tracing_subscriber::prelude::*;

use sui_state_walker::cancel::{cancel_pair, CancelSignal};
use sui_state_walker::config::RpcConfig;
use sui_state_walker::ledger::{read_dynamic_field, read_object, read_objects};
use sui_state_walker::rpc::SuiRpcClient;
use sui_state_walker::schema::{DynamicField, DynamicFieldName, TableField, UID};
use sui_state_walker::types::{string_u64, ObjectId, SuiAddress};
use sui_state_walker::walker::{collect_table, walk, DynamicFieldTable};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    rpc: RpcConfig,
    space_store: ObjectId,
    /// Looks up this address in the voter tables.
    #[serde(default)]
    voter: Option<SuiAddress>,
    /// Stops listing voters of a table after this many.
    #[serde(default)]
    max_voters: Option<usize>,
}

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SpaceStore {
    id: UID,
    spaces: TableField,
}

#[derive(Debug, Deserialize)]
struct GovSpace {
    id: UID,
    #[serde(with = "string_u64")]
    propose_threshold: u64,
    proposals: Vec<ObjectId>,
}

#[derive(Debug, Deserialize)]
struct GovProposal {
    id: UID,
    #[serde(default)]
    title: String,
    yes_voters: TableField,
    no_voters: TableField,
}

#[derive(Debug, Deserialize)]
struct VoteAmount(#[serde(with = "string_u64")] u64);

type SpaceEntry = DynamicField<serde_json::Value, ObjectId>;
type VoterEntry = DynamicField<SuiAddress, VoteAmount>;

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

    let store = read_object::<SpaceStore, _>(&client, config.space_store).await?;
    tracing::info!(
        "space store {} keeps {} spaces in table {}",
        store.fields.id.id,
        store.fields.spaces.fields.size,
        store.fields.spaces.table_id()
    );

    let spaces_table = store.fields.spaces.table_id();
    let space_ids: Vec<ObjectId> =
        collect_table::<SpaceEntry, _>(&client, spaces_table, Some(cancel.clone()))
            .await?
            .into_iter()
            .map(|entry| entry.fields.value)
            .collect();
    let spaces = read_objects::<GovSpace, _>(&client, &space_ids).await?;

    for space in spaces {
        let tag = space.struct_tag()?;
        let (propose_token, vote_token) = match tag.type_params.as_slice() {
            [propose, vote] => (propose, vote),
            params => return Err(anyhow!("space {} has type params {:?}", space.object_id, params)),
        };
        tracing::info!(
            "space {} ({}): propose with {} (threshold {}), vote with {}, {} proposals",
            space.fields.id.id,
            tag.name,
            propose_token,
            space.fields.propose_threshold,
            vote_token,
            space.fields.proposals.len()
        );

        let proposals = read_objects::<GovProposal, _>(&client, &space.fields.proposals).await?;
        for proposal in proposals {
            tracing::info!("proposal {} {:?}", proposal.fields.id.id, proposal.fields.title);
            for (side, table) in [
                ("yes", &proposal.fields.yes_voters),
                ("no", &proposal.fields.no_voters),
            ] {
                let total = list_voters(
                    &client,
                    table.table_id(),
                    side,
                    config.max_voters,
                    cancel.clone(),
                )
                .await?;
                tracing::info!(
                    "{} votes on {}: {} (table size {})",
                    side,
                    proposal.object_id,
                    total,
                    table.fields.size
                );

                if let Some(voter) = config.voter {
                    let vote = read_dynamic_field::<SuiAddress, VoteAmount, _>(
                        &client,
                        table.table_id(),
                        &DynamicFieldName::address(voter),
                    )
                    .await?;
                    let amount = vote.map(|vote| vote.fields.value.0).unwrap_or(0);
                    tracing::info!("{} voted {} {} on {}", voter, side, amount, proposal.object_id);
                }
            }
        }
    }

    Ok(())
}

/// Streams one voters table, stopping early once `limit` voters were seen.
async fn list_voters(
    client: &SuiRpcClient,
    table: ObjectId,
    side: &str,
    limit: Option<usize>,
    cancel: CancelSignal,
) -> anyhow::Result<u128> {
    let voters = DynamicFieldTable::<_, VoterEntry>::new(client);
    let entries = walk(&voters, table, Some(cancel));
    futures::pin_mut!(entries);

    let mut seen = 0;
    let mut total: u128 = 0;
    while let Some(entry) = entries.try_next().await? {
        tracing::info!("  {} {} votes {}", entry.fields.name, side, entry.fields.value.0);
        total += u128::from(entry.fields.value.0);
        seen += 1;
        if limit.map_or(false, |limit| seen >= limit) {
            tracing::info!("  stopping after {} voters", seen);
            break;
        }
    }
    Ok(total)
}
