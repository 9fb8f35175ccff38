use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::prelude::*;

use sui_state_walker::cancel::cancel_pair;
use sui_state_walker::coin_selection::{prepare_amount, take_owned_objects};
use sui_state_walker::config::RpcConfig;
use sui_state_walker::rpc::SuiRpcClient;
use sui_state_walker::types::{CoinType, SuiAddress};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NftConfig {
    struct_type: String,
    count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    rpc: RpcConfig,
    owner: SuiAddress,
    coin_type: CoinType,
    amount: u64,
    #[serde(default)]
    native_from_gas: bool,
    /// Sends the prepared coin here when set.
    #[serde(default)]
    recipient: Option<SuiAddress>,
    /// Bundles owned NFTs into a vector, as for voting with NFTs.
    #[serde(default)]
    nfts: Option<NftConfig>,
    tx_output_path: PathBuf,
}

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,
}

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

    let balance = client.get_balance(config.owner, &config.coin_type).await?;
    tracing::info!(
        "balance of {}: {} in {} coins",
        config.coin_type,
        balance.total()?,
        balance.coin_object_count
    );

    let mut prepared = prepare_amount(
        &client,
        config.owner,
        &config.coin_type,
        config.amount,
        config.native_from_gas,
        Some(cancel.clone()),
    )
    .await
    .context("Failed to prepare the amount")?;

    match &prepared.selection {
        Some(selection) => tracing::info!(
            "selected {} coins worth {}: {:?}",
            selection.chosen_ids.len(),
            selection.total_selected,
            selection.chosen_ids
        ),
        None => tracing::info!("split {} from the gas coin", config.amount),
    }

    if let Some(nfts) = &config.nfts {
        let ids = take_owned_objects(
            &client,
            config.owner,
            &nfts.struct_type,
            nfts.count,
            Some(cancel.clone()),
        )
        .await
        .context("Failed to collect owned objects")?;
        tracing::info!("using {} objects of {}", ids.len(), nfts.struct_type);
        let elements = ids
            .into_iter()
            .map(|id| prepared.tx.object(id))
            .collect::<Result<Vec<_>, _>>()?;
        prepared.tx.make_move_vec(None, elements)?;
    }

    if let Some(recipient) = config.recipient {
        let address = prepared.tx.pure(recipient.to_string())?;
        prepared.tx.transfer_objects(vec![prepared.coin], address)?;
    }

    let output = File::create(&config.tx_output_path).with_context(|| {
        format!(
            "Cannot create output file {path}",
            path = config.tx_output_path.display()
        )
    })?;
    serde_json::to_writer_pretty(output, &prepared.tx)?;
    tracing::info!(
        "transaction with {} inputs and {} commands written to {:?}",
        prepared.tx.inputs().len(),
        prepared.tx.commands().len(),
        config.tx_output_path
    );

    Ok(())
}
