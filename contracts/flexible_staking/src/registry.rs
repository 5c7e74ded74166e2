//! Emission registry: protocol owner and per-token emission configuration.

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol};

use crate::ContractError;

pub const SECONDS_PER_DAY: i128 = 86_400;

const OWNER: Symbol = symbol_short!("OWNER");
const PENDING_OWNER: Symbol = symbol_short!("PEND_OWN");
const CONFIG: Symbol = symbol_short!("CONFIG");

const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 518_400;

/// Emission settings for one stake token.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmissionConfig {
    /// The token's stake owner. Only this address may change the emission.
    pub admin: Address,
    pub emission_per_second: i128,
    /// Asset paid out as rewards. Defaults to the stake token itself.
    pub reward_token: Address,
    /// Set by `initialize_stake`; staking is refused until then.
    pub initialized: bool,
}

// ── Protocol owner ───────────────────────────────────────────────────────────

pub fn has_owner(env: &Env) -> bool {
    env.storage().instance().has(&OWNER)
}

pub fn owner(env: &Env) -> Result<Address, ContractError> {
    env.storage()
        .instance()
        .get(&OWNER)
        .ok_or(ContractError::NotInitialized)
}

pub fn set_owner(env: &Env, owner: &Address) {
    env.storage().instance().set(&OWNER, owner);
}

pub fn pending_owner(env: &Env) -> Option<Address> {
    env.storage().instance().get(&PENDING_OWNER)
}

pub fn set_pending_owner(env: &Env, candidate: &Address) {
    env.storage().instance().set(&PENDING_OWNER, candidate);
}

pub fn clear_pending_owner(env: &Env) {
    env.storage().instance().remove(&PENDING_OWNER);
}

pub fn require_owner(env: &Env, caller: &Address) -> Result<(), ContractError> {
    if *caller != owner(env)? {
        return Err(ContractError::Unauthorized);
    }
    Ok(())
}

// ── Per-token configuration ──────────────────────────────────────────────────

fn config_key(token: &Address) -> (Symbol, Address) {
    (CONFIG, token.clone())
}

pub fn has_config(env: &Env, token: &Address) -> bool {
    env.storage().persistent().has(&config_key(token))
}

pub fn load(env: &Env, token: &Address) -> Result<EmissionConfig, ContractError> {
    let key = config_key(token);
    let config: EmissionConfig = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(ContractError::NotConfigured)?;
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    Ok(config)
}

pub fn store(env: &Env, token: &Address, config: &EmissionConfig) {
    let key = config_key(token);
    env.storage().persistent().set(&key, config);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

/// Validate the identities passed to `register_stake_token`.
///
/// Soroban addresses cannot be null, so the contract's own address plays the
/// role of the zero identity: it can neither be staked nor administer a pool.
pub fn validate_registration(
    env: &Env,
    token: &Address,
    admin: &Address,
) -> Result<(), ContractError> {
    let this = env.current_contract_address();
    if *token == this {
        return Err(ContractError::InvalidToken);
    }
    if *admin == this {
        return Err(ContractError::InvalidAdmin);
    }
    if has_config(env, token) {
        return Err(ContractError::AlreadyConfigured);
    }
    Ok(())
}

/// Capability check: is `caller` the stake owner of `token`?
pub fn is_admin(env: &Env, token: &Address, caller: &Address) -> bool {
    load(env, token)
        .map(|config| config.admin == *caller)
        .unwrap_or(false)
}

pub fn require_admin(
    config: &EmissionConfig,
    caller: &Address,
) -> Result<(), ContractError> {
    if config.admin != *caller {
        return Err(ContractError::Unauthorized);
    }
    Ok(())
}

/// Either the protocol owner or the token's current admin.
pub fn require_owner_or_admin(
    env: &Env,
    config: &EmissionConfig,
    caller: &Address,
) -> Result<(), ContractError> {
    if config.admin == *caller || *caller == owner(env)? {
        return Ok(());
    }
    Err(ContractError::Unauthorized)
}

pub fn validate_rate(rate: i128) -> Result<i128, ContractError> {
    if rate < 0 {
        return Err(ContractError::InvalidRate);
    }
    Ok(rate)
}

/// Convert a per-day emission into the per-second rate the accumulator uses.
/// Truncates: any remainder below one unit per second is not emitted.
pub fn per_day_to_per_second(per_day: i128) -> Result<i128, ContractError> {
    Ok(validate_rate(per_day)? / SECONDS_PER_DAY)
}
