use super::{
    ModuleClient,
    ensure_amount,
    ensure_id,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::{
        Balance,
        PendingReward,
    },
    normalize::{
        Row,
        Schema,
        cast_number,
        first_scalar,
        map_rows,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "treasury";

pub static REWARDS: Schema = Schema {
    name: "pending_rewards",
    columns: &["id", "kind", "amount", "claimable_at"],
};

pub fn map_reward(row: &Row) -> PendingReward {
    PendingReward {
        id: row.u64(&["id", "reward_id"]),
        kind: row.u8(&["kind", "reward_type"]),
        amount: Balance::game(row.u64(&["amount", "value"])),
        claimable_at: row.u64(&["claimable_at", "unlock_time"]),
    }
}

#[derive(Clone, Debug)]
pub struct TreasuryService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> TreasuryService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_pending_rewards(
        &self,
        owner: AccountAddress,
    ) -> Result<Vec<PendingReward>> {
        let raw = self
            .client
            .view("get_pending_rewards", &[MoveArg::Address(owner)])
            .await?;
        let mut rewards = map_rows(&raw, &REWARDS, map_reward)?;
        rewards.retain(|reward| reward.amount.atomic > 0);
        Ok(rewards)
    }

    pub async fn pending_rewards(&self, owner: AccountAddress) -> Vec<PendingReward> {
        or_empty(
            "treasury::get_pending_rewards",
            self.try_pending_rewards(owner).await,
        )
    }

    pub async fn try_country_treasury(&self, country_id: u64) -> Result<Option<Balance>> {
        let raw = self
            .client
            .view("get_treasury_balance", &[MoveArg::U64(country_id)])
            .await?;
        Ok(first_scalar(&raw)
            .and_then(cast_number)
            .map(|n| Balance::game(u64::try_from(n).unwrap_or(0))))
    }

    pub async fn country_treasury(&self, country_id: u64) -> Option<Balance> {
        or_empty(
            "treasury::get_treasury_balance",
            self.try_country_treasury(country_id).await,
        )
    }

    pub async fn claim_reward(&self, reward_id: u64) -> Result<TxHash> {
        ensure_id("reward id", reward_id)?;
        self.client
            .call("claim_reward", vec![MoveArg::U64(reward_id)])
            .await
    }

    pub async fn claim_daily(&self) -> Result<TxHash> {
        self.client.call("claim_daily_reward", vec![]).await
    }

    pub async fn donate(&self, country_id: u64, amount: u64) -> Result<TxHash> {
        ensure_id("country id", country_id)?;
        ensure_amount("donation", amount)?;
        self.client
            .call(
                "donate",
                vec![MoveArg::U64(country_id), MoveArg::U64(amount)],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeLedger;
    use serde_json::json;

    #[tokio::test]
    async fn pending_rewards__skips_empty_rewards() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_pending_rewards",
            json!([[1, 2], [0, 1], ["500", "0"], [10, 20]]),
        );
        let service = TreasuryService::new(ledger);

        // when
        let rewards = service.pending_rewards(AccountAddress::new([1; 32])).await;

        // then
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].amount.display, 5.0);
        assert!(rewards[0].is_claimable(10));
        assert!(!rewards[0].is_claimable(9));
    }

    #[tokio::test]
    async fn country_treasury__reads_single_value() {
        let ledger = FakeLedger::new();
        ledger.set_view(MODULE, "get_treasury_balance", json!(["12345"]));
        let service = TreasuryService::new(ledger);
        assert_eq!(service.country_treasury(1).await, Some(Balance::game(12_345)));
    }

    #[tokio::test]
    async fn donate__rejects_zero_amount() {
        let service = TreasuryService::new(FakeLedger::new());
        assert!(service.donate(1, 0).await.is_err());
    }
}
