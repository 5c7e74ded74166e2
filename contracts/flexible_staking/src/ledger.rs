//! Append-only stake ledger.
//!
//! Records are addressed by `(user, token, index)`. Indices are handed out in
//! order starting at zero and are never reused: a fully withdrawn record stays
//! in place with `active == false` so every later index keeps its meaning.

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol};

use crate::ContractError;

const STAKE: Symbol = symbol_short!("STAKE");
const STAKE_COUNT: Symbol = symbol_short!("STK_CNT");

const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 518_400;

/// One deposit made by one user into one token's pool.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeRecord {
    /// Principal. Zeroed when the record is retired.
    pub amount: i128,
    /// `acc_reward_per_share` at the last settlement of this record.
    pub reward_debt: i128,
    pub active: bool,
    pub staked_at: u64,
}

impl StakeRecord {
    pub fn open(amount: i128, reward_debt: i128, staked_at: u64) -> Self {
        Self {
            amount,
            reward_debt,
            active: true,
            staked_at,
        }
    }

    pub fn retire(&mut self) {
        self.amount = 0;
        self.active = false;
    }
}

fn count_key(user: &Address, token: &Address) -> (Symbol, Address, Address) {
    (STAKE_COUNT, user.clone(), token.clone())
}

fn record_key(user: &Address, token: &Address, index: u32) -> (Symbol, Address, Address, u32) {
    (STAKE, user.clone(), token.clone(), index)
}

/// Number of records ever opened by `user` on `token`.
pub fn count(env: &Env, user: &Address, token: &Address) -> u32 {
    let key = count_key(user, token);
    match env.storage().persistent().get(&key) {
        Some(count) => {
            env.storage()
                .persistent()
                .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
            count
        }
        None => 0,
    }
}

/// Store `record` at the next free index and return that index.
pub fn append(
    env: &Env,
    user: &Address,
    token: &Address,
    record: &StakeRecord,
) -> Result<u32, ContractError> {
    let index = count(env, user, token);
    let next = index
        .checked_add(1)
        .ok_or(ContractError::ArithmeticOverflow)?;

    put(env, user, token, index, record);

    let key = count_key(user, token);
    env.storage().persistent().set(&key, &next);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

    Ok(index)
}

/// Fetch a record regardless of its lifecycle state.
pub fn get(
    env: &Env,
    user: &Address,
    token: &Address,
    index: u32,
) -> Result<StakeRecord, ContractError> {
    let key = record_key(user, token, index);
    let record: StakeRecord = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(ContractError::InvalidIndex)?;
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    // A stored record implies its counter; keep both alive together.
    env.storage()
        .persistent()
        .extend_ttl(&count_key(user, token), TTL_THRESHOLD, TTL_EXTEND_TO);
    Ok(record)
}

/// Fetch a record that can still be claimed or withdrawn.
pub fn get_active(
    env: &Env,
    user: &Address,
    token: &Address,
    index: u32,
) -> Result<StakeRecord, ContractError> {
    let record = get(env, user, token, index)?;
    if !record.active {
        return Err(ContractError::InvalidIndex);
    }
    Ok(record)
}

pub fn put(env: &Env, user: &Address, token: &Address, index: u32, record: &StakeRecord) {
    let key = record_key(user, token, index);
    env.storage().persistent().set(&key, record);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}
