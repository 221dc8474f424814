use super::{
    ModuleClient,
    ensure_address,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::Friend,
    normalize::{
        Row,
        Schema,
        map_rows,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "social";

pub static FRIENDS: Schema = Schema {
    name: "friends",
    columns: &["address", "username"],
};

pub fn map_friend(row: &Row) -> Friend {
    Friend {
        address: row.address(&["address", "friend"]),
        username: row.text(&["username", "name"]),
    }
}

#[derive(Clone, Debug)]
pub struct SocialService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> SocialService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_friends(&self, owner: AccountAddress) -> Result<Vec<Friend>> {
        let raw = self
            .client
            .view("get_friends", &[MoveArg::Address(owner)])
            .await?;
        let mut friends = map_rows(&raw, &FRIENDS, map_friend)?;
        friends.retain(|friend| !friend.address.is_zero());
        Ok(friends)
    }

    pub async fn friends(&self, owner: AccountAddress) -> Vec<Friend> {
        or_empty("social::get_friends", self.try_friends(owner).await)
    }

    pub async fn add_friend(&self, friend: AccountAddress) -> Result<TxHash> {
        ensure_address("friend", &friend)?;
        self.client
            .call("add_friend", vec![MoveArg::Address(friend)])
            .await
    }

    pub async fn remove_friend(&self, friend: AccountAddress) -> Result<TxHash> {
        ensure_address("friend", &friend)?;
        self.client
            .call("remove_friend", vec![MoveArg::Address(friend)])
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
    async fn friends__accepts_bare_address_list() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_friends",
            json!([["0xb0b", "0xca7"], ["0x426f62", "Cat"]]),
        );
        let service = SocialService::new(ledger);

        // when
        let friends = service.friends(AccountAddress::new([1; 32])).await;

        // then
        assert_eq!(friends.len(), 2);
        assert_eq!(friends[0].username, "Bob");
        assert_eq!(friends[1].address, "0xca7".parse().unwrap());
    }

    #[tokio::test]
    async fn add_friend__rejects_zero_address() {
        let service = SocialService::new(FakeLedger::new());
        assert!(service.add_friend(AccountAddress::ZERO).await.is_err());
    }
}
