//! Per-token reward accumulator.
//!
//! Each stake token owns one [`PoolState`]. The state is advanced lazily: every
//! entry point that reads or mutates a pool first calls [`settle`], which folds
//! the emission accrued since `last_update_time` into `acc_reward_per_share`.
//!
//! ```text
//! Δacc = elapsed × emission_per_second × SCALE / total_staked   (floor)
//! pending(record) = amount × (acc − reward_debt) / SCALE         (floor)
//! ```
//!
//! Both divisions round down, so the accumulator under-reports and the pool
//! can never owe more than it has emitted.

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol};

use crate::ContractError;

/// Fixed-point scaling factor for `acc_reward_per_share`.
pub const SCALE: i128 = 1_000_000_000_000;

const POOL: Symbol = symbol_short!("POOL");

const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 518_400;

/// Accrual state shared by every staker of one token.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolState {
    pub total_staked: i128,
    /// Cumulative reward per staked unit, scaled by [`SCALE`]. Never decreases.
    pub acc_reward_per_share: i128,
    pub last_update_time: u64,
}

impl PoolState {
    pub fn new(now: u64) -> Self {
        Self {
            total_staked: 0,
            acc_reward_per_share: 0,
            last_update_time: now,
        }
    }

    /// Return this state advanced to `now` under `emission_per_second`.
    ///
    /// Time running backwards is a no-op. Seconds elapsed while nothing is
    /// staked are dropped: the clock moves but the accumulator does not.
    pub fn advanced(&self, emission_per_second: i128, now: u64) -> Result<Self, ContractError> {
        if now <= self.last_update_time {
            return Ok(self.clone());
        }
        let elapsed = now - self.last_update_time;

        let acc_reward_per_share = accrue(
            self.acc_reward_per_share,
            emission_per_second,
            elapsed,
            self.total_staked,
        )?;

        Ok(Self {
            total_staked: self.total_staked,
            acc_reward_per_share,
            last_update_time: now,
        })
    }

    pub fn pending_for(&self, amount: i128, reward_debt: i128) -> Result<i128, ContractError> {
        pending_reward(amount, self.acc_reward_per_share, reward_debt)
    }
}

// ── Pure math ────────────────────────────────────────────────────────────────

/// Fold `elapsed` seconds of emission into the accumulator.
pub fn accrue(
    acc: i128,
    emission_per_second: i128,
    elapsed: u64,
    total_staked: i128,
) -> Result<i128, ContractError> {
    if total_staked <= 0 || elapsed == 0 || emission_per_second <= 0 {
        return Ok(acc);
    }

    let delta = emission_per_second
        .checked_mul(i128::from(elapsed))
        .and_then(|emitted| emitted.checked_mul(SCALE))
        .ok_or(ContractError::ArithmeticOverflow)?
        / total_staked;

    acc.checked_add(delta)
        .ok_or(ContractError::ArithmeticOverflow)
}

/// Reward owed to a stake of `amount` whose debt snapshot is `reward_debt`.
pub fn pending_reward(amount: i128, acc: i128, reward_debt: i128) -> Result<i128, ContractError> {
    if amount <= 0 || acc <= reward_debt {
        return Ok(0);
    }
    let owed = amount
        .checked_mul(acc - reward_debt)
        .ok_or(ContractError::ArithmeticOverflow)?;
    Ok(owed / SCALE)
}

// ── Storage ──────────────────────────────────────────────────────────────────

fn pool_key(token: &Address) -> (Symbol, Address) {
    (POOL, token.clone())
}

pub fn load(env: &Env, token: &Address) -> Result<PoolState, ContractError> {
    let key = pool_key(token);
    let pool: PoolState = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(ContractError::NotConfigured)?;
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    Ok(pool)
}

pub fn store(env: &Env, token: &Address, pool: &PoolState) {
    let key = pool_key(token);
    env.storage().persistent().set(&key, pool);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

/// Advance the stored pool to the current ledger time and persist it.
///
/// Must run before anything reads `acc_reward_per_share` or changes either
/// `total_staked` or the emission rate.
pub fn settle(
    env: &Env,
    token: &Address,
    emission_per_second: i128,
) -> Result<PoolState, ContractError> {
    let pool = load(env, token)?;
    let settled = pool.advanced(emission_per_second, env.ledger().timestamp())?;
    if settled != pool {
        store(env, token, &settled);
    }
    Ok(settled)
}

/// Same as [`settle`] but never writes; used by read-only queries.
pub fn project(
    env: &Env,
    token: &Address,
    emission_per_second: i128,
) -> Result<PoolState, ContractError> {
    load(env, token)?.advanced(emission_per_second, env.ledger().timestamp())
}
