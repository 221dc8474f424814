//! Domain records as the client caches them.
//!
//! Every record serializes with the raw field names the normalizer reads
//! first, so a serialized record parses back to the same value.

use crate::{
    address::AccountAddress,
    proposal::ProposalArgs,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Serialize,
    Serializer,
};

pub const NATIVE_COIN_DECIMALS: u32 = 8;
pub const GAME_COIN_DECIMALS: u32 = 2;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 5;
pub const EMPLOYEES_PER_QUALITY: usize = 3;

/// An integer amount in atomic units plus its human value.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Balance {
    pub atomic: u64,
    pub display: f64,
}

impl Balance {
    pub fn from_atomic(atomic: u64, decimals: u32) -> Self {
        Self {
            atomic,
            display: atomic as f64 / 10f64.powi(decimals as i32),
        }
    }

    pub fn native(atomic: u64) -> Self {
        Self::from_atomic(atomic, NATIVE_COIN_DECIMALS)
    }

    pub fn game(atomic: u64) -> Self {
        Self::from_atomic(atomic, GAME_COIN_DECIMALS)
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.atomic)
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct Profile {
    pub address: AccountAddress,
    pub username: String,
    pub level: u64,
    pub experience: u64,
    pub energy: u64,
    pub max_energy: u64,
    pub strength: u64,
    pub rank_points: u64,
    pub native_balance: Balance,
    pub game_balance: Balance,
    pub is_admin: bool,
    pub country_id: u64,
    pub employer_id: Option<u64>,
    pub region_id: Option<u64>,
}

impl Profile {
    pub fn is_employed(&self) -> bool {
        self.employer_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct InventoryItem {
    pub item_id: u64,
    pub category: u8,
    pub quality: u8,
    pub quantity: u64,
}

/// Items without an explicit id are keyed by category and quality.
pub fn derived_item_id(category: u8, quality: u8) -> u64 {
    u64::from(category) * 10 + u64::from(quality)
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct CompanyProfile {
    pub id: u64,
    pub name: String,
    pub company_type: u8,
    pub region_id: u64,
    pub owner: AccountAddress,
    pub quality: u8,
    pub funds: Balance,
    pub input_stock: u64,
    pub output_stock: u64,
    pub employees: Vec<AccountAddress>,
}

impl CompanyProfile {
    pub fn capacity(&self) -> usize {
        usize::from(self.quality) * EMPLOYEES_PER_QUALITY
    }

    pub fn is_full(&self) -> bool {
        self.employees.len() >= self.capacity()
    }

    pub fn employs(&self, address: &AccountAddress) -> bool {
        self.employees.contains(address)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct ListedItem {
    pub item_id: u64,
    pub category: u8,
    pub quality: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct MarketListing {
    pub id: u64,
    pub seller: AccountAddress,
    #[serde(rename = "item_type")]
    pub item: ListedItem,
    pub quantity: u64,
    #[serde(rename = "price_per_unit")]
    pub price_per_unit_atomic: u64,
    pub country_id: u64,
    pub created_at: u64,
}

impl MarketListing {
    pub fn price_per_unit(&self) -> f64 {
        Balance::game(self.price_per_unit_atomic).display
    }

    pub fn total_price_atomic(&self) -> u64 {
        self.price_per_unit_atomic.saturating_mul(self.quantity)
    }

    /// Derived, never stored.
    pub fn total_price(&self) -> f64 {
        self.price_per_unit() * self.quantity as f64
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.created_at).ok()?, 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Battle {
    pub id: u64,
    pub region_id: u64,
    pub attacker_country: u64,
    pub defender_country: u64,
    pub attacker_influence: u64,
    pub defender_influence: u64,
    /// 0 (defender holds) ..= 100 (attacker breaks through).
    pub wall: u8,
    pub round: u64,
    pub is_open: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct RoundHistory {
    pub round: u64,
    pub attacker_top: Option<AccountAddress>,
    pub defender_top: Option<AccountAddress>,
    pub attacker_influence: u64,
    pub defender_influence: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Proposal {
    pub id: u64,
    pub country_id: u64,
    pub proposer: AccountAddress,
    pub proposal_type: u8,
    pub payload: Vec<u8>,
    #[serde(skip)]
    pub args: Option<ProposalArgs>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub executed: bool,
    pub created_at: u64,
}

impl Proposal {
    pub fn is_open(&self) -> bool {
        !self.executed
    }

    pub fn passing(&self) -> bool {
        self.yes_votes > self.no_votes
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct CountryData {
    pub id: u64,
    pub name: String,
    pub president: Option<AccountAddress>,
    pub treasury: Balance,
    pub income_tax_bps: u64,
    pub import_tax_bps: u64,
    pub vat_bps: u64,
    pub region_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct RegionData {
    pub id: u64,
    pub name: String,
    pub original_owner: u64,
    pub occupier: u64,
    pub population: u64,
    pub resource_category: u8,
}

impl RegionData {
    pub fn is_occupied(&self) -> bool {
        self.occupier != 0 && self.occupier != self.original_owner
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct PendingReward {
    pub id: u64,
    pub kind: u8,
    pub amount: Balance,
    pub claimable_at: u64,
}

impl PendingReward {
    pub fn is_claimable(&self, now_secs: u64) -> bool {
        now_secs >= self.claimable_at
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Friend {
    pub address: AccountAddress,
    pub username: String,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn balance__uses_coin_decimals() {
        assert_eq!(Balance::game(150).display, 1.5);
        assert_eq!(Balance::native(250_000_000).display, 2.5);
    }

    #[test]
    fn market_listing__total_is_unit_price_times_quantity() {
        // given
        let listing = MarketListing {
            quantity: 5,
            price_per_unit_atomic: 150,
            ..Default::default()
        };

        // then
        assert_eq!(listing.price_per_unit(), 1.5);
        assert_eq!(listing.total_price(), 7.5);
        assert_eq!(listing.total_price_atomic(), 750);
    }

    #[test]
    fn company_profile__capacity_follows_quality() {
        let company = CompanyProfile {
            quality: 2,
            employees: vec![AccountAddress::new([1; 32]); 6],
            ..Default::default()
        };
        assert_eq!(company.capacity(), 6);
        assert!(company.is_full());
    }

    #[test]
    fn region_data__occupied_only_by_foreign_country() {
        let mut region = RegionData {
            original_owner: 1,
            occupier: 1,
            ..Default::default()
        };
        assert!(!region.is_occupied());
        region.occupier = 2;
        assert!(region.is_occupied());
    }

    #[test]
    fn derived_item_id__combines_category_and_quality() {
        assert_eq!(derived_item_id(1, 2), 12);
    }
}
