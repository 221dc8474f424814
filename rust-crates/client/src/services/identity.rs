use super::{
    ModuleClient,
    ensure_id,
    ensure_quality,
    ensure_text,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::{
        Balance,
        Profile,
    },
    normalize::{
        Row,
        Schema,
        cast_number,
        first_scalar,
        map_first,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "citizen";

pub static PROFILE: Schema = Schema {
    name: "profile",
    columns: &[
        "address",
        "username",
        "level",
        "experience",
        "energy",
        "max_energy",
        "strength",
        "rank_points",
        "native_balance",
        "game_balance",
        "is_admin",
        "country_id",
        "employer_id",
        "region_id",
    ],
};

pub fn map_profile(row: &Row) -> Profile {
    let max_energy = row.u64(&["max_energy", "energy_cap"]);
    let energy = row.u64(&["energy"]).min(max_energy);
    Profile {
        address: row.address(&["address", "owner"]),
        username: row.text(&["username", "name"]),
        level: row.u64(&["level"]),
        experience: row.u64(&["experience", "xp"]),
        energy,
        max_energy,
        strength: row.u64(&["strength"]),
        rank_points: row.u64(&["rank_points", "military_rank"]),
        native_balance: Balance::native(row.u64(&["native_balance", "balance"])),
        game_balance: Balance::game(row.u64(&["game_balance", "gold", "coins"])),
        is_admin: row.bool(&["is_admin", "admin"]),
        country_id: row.u64(&["country_id", "citizenship"]),
        employer_id: row.id(&["employer_id", "employer", "company_id"]),
        region_id: row.id(&["region_id", "current_region", "location"]),
    }
}

#[derive(Clone, Debug)]
pub struct IdentityService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> IdentityService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_profile(&self, address: AccountAddress) -> Result<Option<Profile>> {
        let raw = self
            .client
            .view("get_profile", &[MoveArg::Address(address)])
            .await?;
        let profile = map_first(&raw, &PROFILE, map_profile)?;
        Ok(profile.map(|mut profile| {
            if profile.address.is_zero() {
                profile.address = address;
            }
            profile
        }))
    }

    pub async fn profile(&self, address: AccountAddress) -> Option<Profile> {
        or_empty("citizen::get_profile", self.try_profile(address).await)
    }

    pub async fn try_is_registered(&self, address: AccountAddress) -> Result<bool> {
        let raw = self
            .client
            .view("is_registered", &[MoveArg::Address(address)])
            .await?;
        Ok(first_scalar(&raw)
            .and_then(cast_number)
            .is_some_and(|n| n != 0))
    }

    pub async fn is_registered(&self, address: AccountAddress) -> bool {
        or_empty("citizen::is_registered", self.try_is_registered(address).await)
    }

    pub async fn register(&self, username: &str, country_id: u64) -> Result<TxHash> {
        ensure_text("username", username)?;
        ensure_id("country id", country_id)?;
        self.client
            .call(
                "register",
                vec![
                    MoveArg::Str(username.trim().to_string()),
                    MoveArg::U64(country_id),
                ],
            )
            .await
    }

    pub async fn train(&self) -> Result<TxHash> {
        self.client.call("train", vec![]).await
    }

    pub async fn work(&self) -> Result<TxHash> {
        self.client.call("work", vec![]).await
    }

    pub async fn eat(&self, food_quality: u8) -> Result<TxHash> {
        ensure_quality(food_quality)?;
        self.client.call("eat", vec![MoveArg::U8(food_quality)]).await
    }
}
