#![no_std]

pub mod accumulator;
pub mod events;
pub mod ledger;
pub mod registry;

use soroban_sdk::{contract, contractimpl, contracttype, token, Address, Env, Vec};

pub use accumulator::{PoolState, SCALE};
pub use ledger::StakeRecord;
pub use registry::{EmissionConfig, SECONDS_PER_DAY};

/// Largest page `get_user_stakes_page` returns.
pub const MAX_STAKES_PAGE: u32 = 50;

// ── Contract errors ──────────────────────────────────────────────────────────

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ContractError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    AlreadyConfigured = 5,
    NotConfigured = 6,
    InvalidIndex = 7,
    TransferFailed = 8,
    InvalidAdmin = 9,
    InvalidToken = 10,
    InvalidRate = 11,
    ArithmeticOverflow = 12,
    NoPendingOwner = 13,
}

// ── Public-facing types ──────────────────────────────────────────────────────

/// A stake record together with the reward it would pay if claimed now.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeView {
    pub index: u32,
    pub amount: i128,
    pub reward_debt: i128,
    pub active: bool,
    pub staked_at: u64,
    pub pending_reward: i128,
}

/// What `withdraw_all_with_rewards` sent back to the staker.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Payout {
    pub principal: i128,
    pub reward: i128,
}

// ── Contract ─────────────────────────────────────────────────────────────────

#[contract]
pub struct FlexibleStakingContract;

#[contractimpl]
impl FlexibleStakingContract {
    // ── Initialisation ──────────────────────────────────────────────────────

    /// Set the protocol owner. The owner registers stake tokens and may
    /// reassign any token's admin.
    pub fn initialize(env: Env, owner: Address) -> Result<(), ContractError> {
        if registry::has_owner(&env) {
            return Err(ContractError::AlreadyInitialized);
        }
        owner.require_auth();

        registry::set_owner(&env, &owner);

        events::publish_initialized(&env, owner);

        Ok(())
    }

    pub fn is_initialized(env: Env) -> bool {
        registry::has_owner(&env)
    }

    pub fn get_owner(env: Env) -> Result<Address, ContractError> {
        registry::owner(&env)
    }

    // ── Emission registry ───────────────────────────────────────────────────

    /// Give `token` a stake owner. Owner only.
    ///
    /// The pool starts with a zero emission rate and pays rewards in `token`
    /// itself until `initialize_stake` says otherwise.
    pub fn register_stake_token(
        env: Env,
        caller: Address,
        token: Address,
        admin: Address,
    ) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();
        registry::require_owner(&env, &caller)?;
        registry::validate_registration(&env, &token, &admin)?;

        let config = EmissionConfig {
            admin: admin.clone(),
            emission_per_second: 0,
            reward_token: token.clone(),
            initialized: false,
        };
        registry::store(&env, &token, &config);
        accumulator::store(&env, &token, &PoolState::new(env.ledger().timestamp()));

        events::publish_stake_token_registered(&env, token, admin);

        Ok(())
    }

    /// Open `token` for deposits with its reward asset and starting emission.
    /// Admin only, once per token.
    pub fn initialize_stake(
        env: Env,
        caller: Address,
        token: Address,
        emission_per_day: i128,
        reward_token: Address,
    ) -> Result<(), ContractError> {
        caller.require_auth();

        let mut config = registry::load(&env, &token)?;
        registry::require_admin(&config, &caller)?;
        if config.initialized {
            return Err(ContractError::AlreadyConfigured);
        }
        if reward_token == env.current_contract_address() {
            return Err(ContractError::InvalidToken);
        }
        let rate = registry::per_day_to_per_second(emission_per_day)?;

        accumulator::settle(&env, &token, config.emission_per_second)?;

        config.emission_per_second = rate;
        config.reward_token = reward_token.clone();
        config.initialized = true;
        registry::store(&env, &token, &config);

        events::publish_stake_initialized(&env, token, reward_token, rate);

        Ok(())
    }

    /// Change the emission rate of `token`. Admin only.
    ///
    /// The accumulator is settled under the old rate first, so every second
    /// before this call is paid at the rate that was in force during it.
    pub fn set_emission_per_second(
        env: Env,
        caller: Address,
        token: Address,
        new_rate: i128,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::apply_emission(&env, &caller, &token, new_rate, registry::validate_rate)
    }

    /// Per-day flavour of `set_emission_per_second`; the rate is
    /// `per_day / 86_400`, truncated.
    pub fn set_emission_per_day(
        env: Env,
        caller: Address,
        token: Address,
        per_day: i128,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::apply_emission(&env, &caller, &token, per_day, registry::per_day_to_per_second)
    }

    /// Hand a token's admin role to `new_admin`. Callable by the protocol
    /// owner or the current admin.
    pub fn transfer_admin(
        env: Env,
        caller: Address,
        token: Address,
        new_admin: Address,
    ) -> Result<(), ContractError> {
        caller.require_auth();

        let mut config = registry::load(&env, &token)?;
        registry::require_owner_or_admin(&env, &config, &caller)?;
        if new_admin == env.current_contract_address() {
            return Err(ContractError::InvalidAdmin);
        }

        let old_admin = config.admin.clone();
        config.admin = new_admin.clone();
        registry::store(&env, &token, &config);

        events::publish_admin_transferred(&env, token, old_admin, new_admin);

        Ok(())
    }

    // ── Staking ─────────────────────────────────────────────────────────────

    /// Deposit `amount` of `token` as a new stake and return its index.
    ///
    /// The new record's debt is the freshly settled accumulator, so it earns
    /// nothing for time that passed before it existed.
    pub fn stake(
        env: Env,
        staker: Address,
        token: Address,
        amount: i128,
    ) -> Result<u32, ContractError> {
        staker.require_auth();
        if amount <= 0 {
            return Err(ContractError::InvalidAmount);
        }

        let config = registry::load(&env, &token)?;
        if !config.initialized {
            return Err(ContractError::NotConfigured);
        }

        // 1. Flush emission up to now.
        let mut pool = accumulator::settle(&env, &token, config.emission_per_second)?;

        // 2. Pull the principal in.
        Self::transfer(
            &env,
            &token,
            &staker,
            &env.current_contract_address(),
            amount,
        )?;

        // 3. Grow the pool and open the record.
        pool.total_staked = pool
            .total_staked
            .checked_add(amount)
            .ok_or(ContractError::ArithmeticOverflow)?;
        accumulator::store(&env, &token, &pool);

        let record = StakeRecord::open(amount, pool.acc_reward_per_share, env.ledger().timestamp());
        let index = ledger::append(&env, &staker, &token, &record)?;

        events::publish_staked(&env, staker, token, index, amount, pool.total_staked);

        Ok(index)
    }

    /// Pay out everything stake `index` has earned so far. The principal
    /// stays in the pool.
    ///
    /// There is no reserve check: if the contract holds too little of the
    /// reward token the transfer fails and the whole call is reverted.
    pub fn claim_rewards(
        env: Env,
        staker: Address,
        token: Address,
        index: u32,
    ) -> Result<i128, ContractError> {
        staker.require_auth();

        let config = registry::load(&env, &token)?;
        let mut record = ledger::get_active(&env, &staker, &token, index)?;

        let pool = accumulator::settle(&env, &token, config.emission_per_second)?;
        let reward = pool.pending_for(record.amount, record.reward_debt)?;

        record.reward_debt = pool.acc_reward_per_share;
        ledger::put(&env, &staker, &token, index, &record);

        Self::transfer(
            &env,
            &config.reward_token,
            &env.current_contract_address(),
            &staker,
            reward,
        )?;

        events::publish_reward_claimed(&env, staker, token, index, reward);

        Ok(reward)
    }

    /// Retire stake `index`: return its principal plus pending reward and
    /// mark it inactive. A retired index can never be used again.
    pub fn withdraw_all_with_rewards(
        env: Env,
        staker: Address,
        token: Address,
        index: u32,
    ) -> Result<Payout, ContractError> {
        staker.require_auth();

        let config = registry::load(&env, &token)?;
        let mut record = ledger::get_active(&env, &staker, &token, index)?;

        let mut pool = accumulator::settle(&env, &token, config.emission_per_second)?;
        let reward = pool.pending_for(record.amount, record.reward_debt)?;
        let principal = record.amount;

        // Effects before interactions.
        pool.total_staked = pool
            .total_staked
            .checked_sub(principal)
            .ok_or(ContractError::ArithmeticOverflow)?;
        accumulator::store(&env, &token, &pool);

        record.retire();
        ledger::put(&env, &staker, &token, index, &record);

        let this = env.current_contract_address();
        if config.reward_token == token {
            let total = principal
                .checked_add(reward)
                .ok_or(ContractError::ArithmeticOverflow)?;
            Self::transfer(&env, &token, &this, &staker, total)?;
        } else {
            Self::transfer(&env, &token, &this, &staker, principal)?;
            Self::transfer(&env, &config.reward_token, &this, &staker, reward)?;
        }

        events::publish_withdrawn(
            &env,
            staker,
            token,
            index,
            principal,
            reward,
            pool.total_staked,
        );

        Ok(Payout { principal, reward })
    }

    // ── View functions ───────────────────────────────────────────────────────

    pub fn get_emission_config(env: Env, token: Address) -> Result<EmissionConfig, ContractError> {
        registry::load(&env, &token)
    }

    pub fn get_emission_per_second(env: Env, token: Address) -> Result<i128, ContractError> {
        Ok(registry::load(&env, &token)?.emission_per_second)
    }

    pub fn get_reward_token(env: Env, token: Address) -> Result<Address, ContractError> {
        Ok(registry::load(&env, &token)?.reward_token)
    }

    pub fn get_admin(env: Env, token: Address) -> Result<Address, ContractError> {
        Ok(registry::load(&env, &token)?.admin)
    }

    pub fn is_admin(env: Env, token: Address, caller: Address) -> bool {
        registry::is_admin(&env, &token, &caller)
    }

    /// Pool state as it would look if settled at the current ledger time.
    pub fn get_pool_state(env: Env, token: Address) -> Result<PoolState, ContractError> {
        let config = registry::load(&env, &token)?;
        accumulator::project(&env, &token, config.emission_per_second)
    }

    /// Sum of all live principal for `token`; zero for unknown tokens.
    pub fn get_total_staked(env: Env, token: Address) -> i128 {
        accumulator::load(&env, &token)
            .map(|pool| pool.total_staked)
            .unwrap_or(0)
    }

    pub fn get_stake_count(env: Env, user: Address, token: Address) -> u32 {
        ledger::count(&env, &user, &token)
    }

    pub fn get_stake(
        env: Env,
        user: Address,
        token: Address,
        index: u32,
    ) -> Result<StakeView, ContractError> {
        let config = registry::load(&env, &token)?;
        let pool = accumulator::project(&env, &token, config.emission_per_second)?;
        let record = ledger::get(&env, &user, &token, index)?;
        Self::view(&pool, index, record)
    }

    /// Reward stake `index` would receive if claimed now. Retired stakes
    /// report zero.
    pub fn pending_reward(
        env: Env,
        user: Address,
        token: Address,
        index: u32,
    ) -> Result<i128, ContractError> {
        Ok(Self::get_stake(env, user, token, index)?.pending_reward)
    }

    /// Every stake `user` ever opened on `token`, retired ones included, in
    /// index order.
    pub fn get_user_stakes(
        env: Env,
        user: Address,
        token: Address,
    ) -> Result<Vec<StakeView>, ContractError> {
        let count = ledger::count(&env, &user, &token);
        Self::collect_stakes(&env, &user, &token, 0, count)
    }

    /// At most `limit` stakes of `user` on `token` starting at index `start`.
    /// `limit` is capped at [`MAX_STAKES_PAGE`]; a `start` past the end
    /// yields an empty list.
    pub fn get_user_stakes_page(
        env: Env,
        user: Address,
        token: Address,
        start: u32,
        limit: u32,
    ) -> Result<Vec<StakeView>, ContractError> {
        let count = ledger::count(&env, &user, &token);
        let end = start
            .saturating_add(limit.min(MAX_STAKES_PAGE))
            .min(count);
        Self::collect_stakes(&env, &user, &token, start, end)
    }

    // ── Owner transfer (two-step) ───────────────────────────────────────────

    /// Propose a new protocol owner. The candidate must call `accept_owner`.
    pub fn propose_owner(
        env: Env,
        current_owner: Address,
        new_owner: Address,
    ) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        current_owner.require_auth();
        registry::require_owner(&env, &current_owner)?;

        registry::set_pending_owner(&env, &new_owner);

        events::publish_owner_transfer_proposed(&env, current_owner, new_owner);

        Ok(())
    }

    pub fn accept_owner(env: Env, new_owner: Address) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        new_owner.require_auth();

        let pending = registry::pending_owner(&env).ok_or(ContractError::NoPendingOwner)?;
        if new_owner != pending {
            return Err(ContractError::Unauthorized);
        }

        let old_owner = registry::owner(&env)?;
        registry::set_owner(&env, &new_owner);
        registry::clear_pending_owner(&env);

        events::publish_owner_transfer_accepted(&env, old_owner, new_owner);

        Ok(())
    }

    pub fn cancel_owner_transfer(env: Env, current_owner: Address) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        current_owner.require_auth();
        registry::require_owner(&env, &current_owner)?;

        let pending = registry::pending_owner(&env).ok_or(ContractError::NoPendingOwner)?;
        registry::clear_pending_owner(&env);

        events::publish_owner_transfer_cancelled(&env, current_owner, pending);

        Ok(())
    }

    pub fn get_pending_owner(env: Env) -> Option<Address> {
        registry::pending_owner(&env)
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), ContractError> {
        if !registry::has_owner(env) {
            return Err(ContractError::NotInitialized);
        }
        Ok(())
    }

    /// Authorise `caller` first, then turn `input` into a per-second rate
    /// with `to_rate`.
    fn apply_emission(
        env: &Env,
        caller: &Address,
        token: &Address,
        input: i128,
        to_rate: fn(i128) -> Result<i128, ContractError>,
    ) -> Result<(), ContractError> {
        let mut config = registry::load(env, token)?;
        registry::require_admin(&config, caller)?;
        let new_rate = to_rate(input)?;

        // Flush accumulator at the old rate before changing.
        accumulator::settle(env, token, config.emission_per_second)?;

        let old_rate = config.emission_per_second;
        config.emission_per_second = new_rate;
        registry::store(env, token, &config);

        events::publish_emission_set(env, token.clone(), old_rate, new_rate);

        Ok(())
    }

    /// Move `amount` of `asset` and map any failure to `TransferFailed`.
    /// Zero-amount moves are skipped.
    fn transfer(
        env: &Env,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: i128,
    ) -> Result<(), ContractError> {
        if amount == 0 {
            return Ok(());
        }
        match token::Client::new(env, asset).try_transfer(from, to, &amount) {
            Ok(Ok(())) => Ok(()),
            _ => Err(ContractError::TransferFailed),
        }
    }

    fn collect_stakes(
        env: &Env,
        user: &Address,
        token: &Address,
        start: u32,
        end: u32,
    ) -> Result<Vec<StakeView>, ContractError> {
        let config = registry::load(env, token)?;
        let pool = accumulator::project(env, token, config.emission_per_second)?;

        let mut stakes = Vec::new(env);
        for index in start..end {
            let record = ledger::get(env, user, token, index)?;
            stakes.push_back(Self::view(&pool, index, record)?);
        }
        Ok(stakes)
    }

    fn view(pool: &PoolState, index: u32, record: StakeRecord) -> Result<StakeView, ContractError> {
        let pending_reward = pool.pending_for(record.amount, record.reward_debt)?;
        Ok(StakeView {
            index,
            amount: record.amount,
            reward_debt: record.reward_debt,
            active: record.active,
            staked_at: record.staked_at,
            pending_reward,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
