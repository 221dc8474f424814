use super::{
    ModuleClient,
    ensure_address,
    ensure_amount,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    normalize::{
        cast_number,
        first_scalar,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "admin";

#[derive(Clone, Debug)]
pub struct AdminService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> AdminService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_is_admin(&self, address: AccountAddress) -> Result<bool> {
        let raw = self
            .client
            .view("is_admin", &[MoveArg::Address(address)])
            .await?;
        Ok(first_scalar(&raw)
            .and_then(cast_number)
            .is_some_and(|n| n != 0))
    }

    pub async fn is_admin(&self, address: AccountAddress) -> bool {
        or_empty("admin::is_admin", self.try_is_admin(address).await)
    }

    pub async fn grant_coins(&self, to: AccountAddress, amount: u64) -> Result<TxHash> {
        ensure_address("recipient", &to)?;
        ensure_amount("grant", amount)?;
        self.client
            .call(
                "grant_coins",
                vec![MoveArg::Address(to), MoveArg::U64(amount)],
            )
            .await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<TxHash> {
        self.client
            .call("set_paused", vec![MoveArg::Bool(paused)])
            .await
    }
}
