//! Greedy coin selection and consolidation.
//!
//! Coins are taken in the order the ledger enumerates them, with no sorting,
//! until their sum covers the target. The selection is then consolidated:
//! merged into the first chosen coin when more than one was needed, then split
//! into the exact amount. The rest stays with the owner as change.

use futures::TryStreamExt;

use crate::cancel::CancelSignal;
use crate::error::{Error, Result};
use crate::ledger::{CoinSource, OwnedObjectSource};
use crate::transaction::{Argument, ProgrammableTransaction};
use crate::types::{Coin, CoinType, ObjectId, SuiAddress};
use crate::walker::walk_pages;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoinSelection {
    /// Enumeration order.
    pub chosen_ids: Vec<ObjectId>,
    pub total_selected: u128,
    pub success: bool,
}

struct GreedyAccumulator {
    amount: u64,
    selection: CoinSelection,
}

impl GreedyAccumulator {
    fn new(amount: u64) -> Result<Self> {
        if amount == 0 {
            return Err(Error::InvalidArgument(
                "amount must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            amount,
            selection: CoinSelection::default(),
        })
    }

    /// Returns true once the target is covered.
    fn push(&mut self, coin: Coin) -> bool {
        self.selection.chosen_ids.push(coin.id);
        self.selection.total_selected += u128::from(coin.balance);
        self.selection.success = self.selection.total_selected >= u128::from(self.amount);
        self.selection.success
    }

    fn finish(self) -> CoinSelection {
        self.selection
    }
}

/// Takes coins from `coins` in order until their sum reaches `amount`.
///
/// Running out of coins is not an error: the result has `success == false` and
/// lists everything that was scanned.
pub fn select_coins<I>(amount: u64, coins: I) -> Result<CoinSelection>
where
    I: IntoIterator<Item = Coin>,
{
    let mut accumulator = GreedyAccumulator::new(amount)?;
    for coin in coins {
        if accumulator.push(coin) {
            break;
        }
    }
    Ok(accumulator.finish())
}

/// Same as [`select_coins`] over the owner's coins on the ledger. Coin pages
/// are requested only while the target is not yet covered.
pub async fn select_owned_coins<S>(
    source: &S,
    owner: SuiAddress,
    coin_type: &CoinType,
    amount: u64,
    cancel: Option<CancelSignal>,
) -> Result<CoinSelection>
where
    S: CoinSource + ?Sized,
{
    let mut accumulator = GreedyAccumulator::new(amount)?;
    let coins = walk_pages(
        move |cursor| source.coins_page(owner, coin_type, cursor),
        cancel,
    );
    futures::pin_mut!(coins);
    while let Some(coin) = coins.try_next().await? {
        if accumulator.push(coin) {
            break;
        }
    }

    let selection = accumulator.finish();
    tracing::debug!(
        "selected {:?} coins of {} for owner {}, total: {:?}, success: {:?}",
        selection.chosen_ids.len(),
        coin_type,
        owner,
        selection.total_selected,
        selection.success
    );
    Ok(selection)
}

/// How a successful selection turns into one coin of exactly `amount`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidationPlan {
    pub primary: ObjectId,
    /// Merged into `primary` before the split; empty for a single coin.
    pub merge_sources: Vec<ObjectId>,
    pub amount: u64,
    pub change: u128,
}

impl CoinSelection {
    pub fn consolidation(&self, amount: u64) -> Result<ConsolidationPlan> {
        if amount == 0 {
            return Err(Error::InvalidArgument(
                "amount must be greater than 0".to_string(),
            ));
        }
        let (primary, rest) = match self.chosen_ids.split_first() {
            Some(split) if self.total_selected >= u128::from(amount) => split,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "selection of {} coins totalling {} doesn't cover {}",
                    self.chosen_ids.len(),
                    self.total_selected,
                    amount
                )))
            }
        };
        Ok(ConsolidationPlan {
            primary: *primary,
            merge_sources: rest.to_vec(),
            amount,
            change: self.total_selected - u128::from(amount),
        })
    }
}

impl ConsolidationPlan {
    /// Appends merge (if needed) then split; returns the exact-amount coin.
    ///
    /// Fails when the selection needs more inputs than one transaction holds.
    pub fn apply(&self, tx: &mut ProgrammableTransaction) -> Result<Argument> {
        let primary = tx.object(self.primary)?;
        if !self.merge_sources.is_empty() {
            let sources = self
                .merge_sources
                .iter()
                .map(|id| tx.object(*id))
                .collect::<Result<Vec<_>>>()?;
            tx.merge_coins(primary, sources)?;
        }
        let amount = tx.pure(self.amount.to_string())?;
        Ok(tx.split_coins(primary, vec![amount])?[0])
    }
}

#[derive(Clone, Debug)]
pub struct PreparedAmount {
    pub tx: ProgrammableTransaction,
    /// Coin of exactly the requested amount, ready for the next command.
    pub coin: Argument,
    /// `None` when the coin was split from gas.
    pub selection: Option<CoinSelection>,
}

/// Starts a fresh transaction holding a coin of exactly `amount`.
///
/// With `native_from_gas` set and a native `coin_type`, the coin is split off
/// the gas coin and the ledger is not queried at all.
pub async fn prepare_amount<S>(
    source: &S,
    owner: SuiAddress,
    coin_type: &CoinType,
    amount: u64,
    native_from_gas: bool,
    cancel: Option<CancelSignal>,
) -> Result<PreparedAmount>
where
    S: CoinSource + ?Sized,
{
    if amount == 0 {
        return Err(Error::InvalidArgument(
            "amount must be greater than 0".to_string(),
        ));
    }

    let mut tx = ProgrammableTransaction::new();
    if native_from_gas && coin_type.is_native() {
        let pure_amount = tx.pure(amount.to_string())?;
        let coin = tx.split_coins(Argument::GasCoin, vec![pure_amount])?[0];
        return Ok(PreparedAmount {
            tx,
            coin,
            selection: None,
        });
    }

    let selection = select_owned_coins(source, owner, coin_type, amount, cancel).await?;
    if !selection.success {
        return Err(Error::InsufficientFunds {
            coin_type: coin_type.to_string(),
            required: amount,
            available: selection.total_selected,
        });
    }
    let plan = selection.consolidation(amount)?;
    tracing::debug!(
        "consolidating {:?} coins into {}, change: {:?}",
        plan.merge_sources.len() + 1,
        plan.primary,
        plan.change
    );
    let coin = plan.apply(&mut tx)?;

    Ok(PreparedAmount {
        tx,
        coin,
        selection: Some(selection),
    })
}

/// First `count` objects of `struct_type` owned by `owner`, in ledger order.
pub async fn take_owned_objects<S>(
    source: &S,
    owner: SuiAddress,
    struct_type: &str,
    count: usize,
    cancel: Option<CancelSignal>,
) -> Result<Vec<ObjectId>>
where
    S: OwnedObjectSource + ?Sized,
{
    if count == 0 {
        return Err(Error::InvalidArgument(
            "count must be greater than 0".to_string(),
        ));
    }

    let objects = walk_pages(
        move |cursor| source.owned_objects_page(owner, struct_type, cursor),
        cancel,
    );
    futures::pin_mut!(objects);
    let mut result = vec![];
    while let Some(object) = objects.try_next().await? {
        let id = object.object_id().ok_or_else(|| {
            anyhow::anyhow!(
                "owned object of {} came back without data: {:?}",
                struct_type,
                object.error
            )
        })?;
        result.push(id);
        if result.len() == count {
            return Ok(result);
        }
    }

    Err(Error::NotEnoughObjects {
        required: count,
        found: result.len(),
    })
}
