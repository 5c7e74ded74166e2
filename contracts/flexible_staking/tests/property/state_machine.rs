//! Random operation sequences replayed against the contract and a plain
//! model of the pool.
//!
//! After every step the contract must agree with the model on the staked
//! total and on its own token balance, the accumulator must not move
//! backwards, and the rewards paid so far may never exceed what the schedule
//! has emitted. Once every open record is withdrawn, the unpaid remainder must
//! be within the rounding slack of the operations performed.

use proptest::prelude::*;
use soroban_sdk::{testutils::Address as _, Address};

use flexible_staking::{ContractError, SCALE};

use crate::common::{advance, balance, setup_pool, stake, TestContext, DAY};

const USERS: usize = 3;
const FLOAT: i128 = 1_000_000_000_000_000_000;

#[derive(Clone, Debug)]
enum Op {
    Advance(u64),
    Stake { user: usize, amount: i128 },
    Claim { user: usize, slot: usize },
    Withdraw { user: usize, slot: usize },
    SetRate(i128),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..=DAY).prop_map(Op::Advance),
        3 => (0..USERS, 1i128..=1_000_000_000_000)
            .prop_map(|(user, amount)| Op::Stake { user, amount }),
        2 => (0..USERS, 0usize..8).prop_map(|(user, slot)| Op::Claim { user, slot }),
        2 => (0..USERS, 0usize..8).prop_map(|(user, slot)| Op::Withdraw { user, slot }),
        1 => (0i128..=10_000).prop_map(Op::SetRate),
    ]
}

struct Model {
    /// Per user, `(amount, active)` in index order.
    records: Vec<Vec<(i128, bool)>>,
    total: i128,
    rate: i128,
    emitted: i128,
    paid: i128,
    slack: i128,
}

impl Model {
    fn new(rate: i128) -> Self {
        Self {
            records: (0..USERS).map(|_| Vec::new()).collect(),
            total: 0,
            rate,
            emitted: 0,
            paid: 0,
            slack: 0,
        }
    }

    /// One settlement may drop up to `total / SCALE + 1` units of reward.
    fn settle_slack(&mut self) {
        self.slack += self.total / SCALE + 1;
    }
}

fn pick(model: &Model, user: usize, slot: usize) -> Option<u32> {
    let records = &model.records[user];
    if records.is_empty() {
        None
    } else {
        Some((slot % records.len()) as u32)
    }
}

fn apply(
    ctx: &TestContext,
    users: &[Address],
    model: &mut Model,
    op: &Op,
) -> Result<(), TestCaseError> {
    match *op {
        Op::Advance(seconds) => {
            if model.total > 0 {
                model.emitted += model.rate * i128::from(seconds);
            }
            advance(ctx, seconds);
        }
        Op::Stake { user, amount } => {
            model.settle_slack();
            let index = stake(ctx, &users[user], amount);
            prop_assert_eq!(index as usize, model.records[user].len());
            model.records[user].push((amount, true));
            model.total += amount;
        }
        Op::Claim { user, slot } => {
            let Some(index) = pick(model, user, slot) else {
                return Ok(());
            };
            model.settle_slack();
            let result = ctx.client.try_claim_rewards(&users[user], &ctx.token, &index);
            if model.records[user][index as usize].1 {
                let reward = result.unwrap().unwrap();
                prop_assert!(reward >= 0);
                model.paid += reward;
                model.slack += 1;
            } else {
                prop_assert_eq!(result, Err(Ok(ContractError::InvalidIndex)));
            }
        }
        Op::Withdraw { user, slot } => {
            let Some(index) = pick(model, user, slot) else {
                return Ok(());
            };
            model.settle_slack();
            let result = ctx
                .client
                .try_withdraw_all_with_rewards(&users[user], &ctx.token, &index);
            let (amount, active) = model.records[user][index as usize];
            if active {
                let payout = result.unwrap().unwrap();
                prop_assert_eq!(payout.principal, amount);
                prop_assert!(payout.reward >= 0);
                model.paid += payout.reward;
                model.slack += 1;
                model.total -= amount;
                model.records[user][index as usize].1 = false;
            } else {
                prop_assert_eq!(result, Err(Ok(ContractError::InvalidIndex)));
            }
        }
        Op::SetRate(rate) => {
            model.settle_slack();
            ctx.client
                .set_emission_per_second(&ctx.admin, &ctx.token, &rate);
            model.rate = rate;
        }
    }
    Ok(())
}

fn check(ctx: &TestContext, model: &Model, last_acc: &mut i128) -> Result<(), TestCaseError> {
    prop_assert_eq!(ctx.client.get_total_staked(&ctx.token), model.total);
    prop_assert_eq!(
        balance(ctx, &ctx.contract),
        FLOAT + model.total - model.paid
    );

    let acc = ctx.client.get_pool_state(&ctx.token).acc_reward_per_share;
    prop_assert!(acc >= *last_acc, "accumulator went from {} to {}", last_acc, acc);
    *last_acc = acc;

    prop_assert!(
        model.paid <= model.emitted,
        "paid {} exceeds emitted {}",
        model.paid,
        model.emitted
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pool_conserves_rewards_under_random_operations(
        rate in 0i128..=10_000,
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let ctx = setup_pool(rate, FLOAT);
        let users: Vec<Address> = (0..USERS).map(|_| Address::generate(&ctx.env)).collect();
        let mut model = Model::new(rate);
        let mut last_acc = 0;

        for op in &ops {
            apply(&ctx, &users, &mut model, op)?;
            check(&ctx, &model, &mut last_acc)?;
        }

        // Close out every open record so all accrued reward is realized.
        for user in 0..USERS {
            for index in 0..model.records[user].len() {
                if model.records[user][index].1 {
                    apply(
                        &ctx,
                        &users,
                        &mut model,
                        &Op::Withdraw { user, slot: index },
                    )?;
                }
            }
        }
        check(&ctx, &model, &mut last_acc)?;

        prop_assert_eq!(model.total, 0);
        prop_assert!(
            model.emitted - model.paid <= model.slack,
            "unpaid {} exceeds rounding slack {}",
            model.emitted - model.paid,
            model.slack
        );
    }
}
