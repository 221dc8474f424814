use super::{
    ModuleClient,
    ensure_id,
};
use crate::{
    encoding::MoveArg,
    error::{
        ClientError,
        Result,
    },
    model::{
        Battle,
        MAX_QUALITY,
        RoundHistory,
    },
    normalize::{
        Row,
        Schema,
        map_first,
        map_rows,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "battle";

pub const MAX_WALL: u8 = 100;

pub static BATTLES: Schema = Schema {
    name: "battles",
    columns: &[
        "id",
        "region_id",
        "attacker_country",
        "defender_country",
        "attacker_influence",
        "defender_influence",
        "wall",
        "round",
        "is_open",
    ],
};

pub static ROUNDS: Schema = Schema {
    name: "round_history",
    columns: &[
        "round",
        "attacker_top",
        "defender_top",
        "attacker_influence",
        "defender_influence",
    ],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Attacker,
    Defender,
}

pub fn map_battle(row: &Row) -> Battle {
    Battle {
        id: row.u64(&["id", "battle_id"]),
        region_id: row.u64(&["region_id", "region"]),
        attacker_country: row.u64(&["attacker_country", "attacker"]),
        defender_country: row.u64(&["defender_country", "defender"]),
        attacker_influence: row.u64(&["attacker_influence", "attacker_damage"]),
        defender_influence: row.u64(&["defender_influence", "defender_damage"]),
        wall: row.u8(&["wall", "wall_percent"]).min(MAX_WALL),
        round: row.u64(&["round", "current_round"]),
        is_open: !row.has(&["is_open", "active"]) || row.bool(&["is_open", "active"]),
    }
}

/// The zero address means nobody contributed on that side.
pub fn map_round(row: &Row) -> RoundHistory {
    RoundHistory {
        round: row.u64(&["round"]),
        attacker_top: row.opt_address(&["attacker_top", "top_attacker"]),
        defender_top: row.opt_address(&["defender_top", "top_defender"]),
        attacker_influence: row.u64(&["attacker_influence", "attacker_damage"]),
        defender_influence: row.u64(&["defender_influence", "defender_damage"]),
    }
}

pub fn validate_fight(battle_id: u64, weapon_quality: u8) -> Result<()> {
    ensure_id("battle id", battle_id)?;
    if weapon_quality > MAX_QUALITY {
        return Err(ClientError::precondition(format!(
            "weapon quality {weapon_quality} is above {MAX_QUALITY}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct BattleService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> BattleService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_active_battles(&self) -> Result<Vec<Battle>> {
        let raw = self.client.view("get_active_battles", &[]).await?;
        map_rows(&raw, &BATTLES, map_battle)
    }

    pub async fn active_battles(&self) -> Vec<Battle> {
        or_empty("battle::get_active_battles", self.try_active_battles().await)
    }

    pub async fn try_battle(&self, battle_id: u64) -> Result<Option<Battle>> {
        let raw = self
            .client
            .view("get_battle", &[MoveArg::U64(battle_id)])
            .await?;
        map_first(&raw, &BATTLES, map_battle)
    }

    pub async fn battle(&self, battle_id: u64) -> Option<Battle> {
        or_empty("battle::get_battle", self.try_battle(battle_id).await)
    }

    pub async fn try_round_history(&self, battle_id: u64) -> Result<Vec<RoundHistory>> {
        let raw = self
            .client
            .view("get_round_history", &[MoveArg::U64(battle_id)])
            .await?;
        let mut rounds = map_rows(&raw, &ROUNDS, map_round)?;
        rounds.sort_by_key(|round| round.round);
        Ok(rounds)
    }

    pub async fn round_history(&self, battle_id: u64) -> Vec<RoundHistory> {
        or_empty(
            "battle::get_round_history",
            self.try_round_history(battle_id).await,
        )
    }

    /// `weapon_quality` 0 fights bare-handed.
    pub async fn fight(&self, battle_id: u64, side: Side, weapon_quality: u8) -> Result<TxHash> {
        validate_fight(battle_id, weapon_quality)?;
        self.client
            .call(
                "fight",
                vec![
                    MoveArg::U64(battle_id),
                    MoveArg::Bool(side == Side::Attacker),
                    MoveArg::U8(weapon_quality),
                ],
            )
            .await
    }

    pub async fn attack_region(&self, region_id: u64) -> Result<TxHash> {
        ensure_id("region id", region_id)?;
        self.client
            .call("attack_region", vec![MoveArg::U64(region_id)])
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        address::AccountAddress,
        test_helpers::{
            FakeLedger,
            FakeWallet,
        },
    };
    use serde_json::json;

    #[tokio::test]
    async fn active_battles__clamps_wall_and_defaults_open() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_active_battles",
            json!([
                [1, 2],
                [10, 11],
                [1, 1],
                [2, 3],
                ["500", "0"],
                ["300", "0"],
                [250, 40],
                [3, 1],
                [true, false],
            ]),
        );
        let service = BattleService::new(ledger);

        // when
        let battles = service.active_battles().await;

        // then
        assert_eq!(battles.len(), 2);
        assert_eq!(battles[0].wall, 100);
        assert_eq!(battles[0].round, 3);
        assert!(battles[0].is_open);
        assert!(!battles[1].is_open);
    }

    #[tokio::test]
    async fn round_history__zero_address_has_no_top_contributor() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_round_history",
            json!([
                { "round": 2, "attacker_top": "0x0", "defender_top": "0xd" },
                { "round": 1, "attacker_top": "0xa" },
            ]),
        );
        let service = BattleService::new(ledger);

        // when
        let rounds = service.round_history(9).await;

        // then
        assert_eq!(rounds[0].round, 1);
        assert_eq!(rounds[0].attacker_top, Some("0xa".parse().unwrap()));
        assert_eq!(rounds[0].defender_top, None);
        assert_eq!(rounds[1].attacker_top, None);
    }

    #[tokio::test]
    async fn fight__encodes_side_as_bool_and_weapon_as_u8() {
        // given
        let wallet = FakeWallet::connected(AccountAddress::new([5; 32]));
        let service = BattleService::new(FakeLedger::with_wallet(wallet.clone()));

        // when
        service.fight(7, Side::Defender, 3).await.unwrap();

        // then
        let descriptor = &wallet.descriptors()[0];
        assert_eq!(descriptor.encoded_args[1], vec![0]);
        assert_eq!(descriptor.encoded_args[2], vec![3]);
    }

    #[tokio::test]
    async fn fight__rejects_impossible_weapon() {
        let service = BattleService::new(FakeLedger::new());
        assert!(service.fight(7, Side::Attacker, 9).await.is_err());
    }
}
