use crate::{
    address::AccountAddress,
    error::Result,
    model::{
        Battle,
        CompanyProfile,
        CountryData,
        Friend,
        InventoryItem,
        MarketListing,
        PendingReward,
        Profile,
        Proposal,
        RegionData,
        RoundHistory,
    },
    services::Services,
    transport::Transport,
};
use std::sync::{
    Arc,
    atomic::{
        AtomicU64,
        Ordering,
    },
};

/// One independently fetched slice of client state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntitySet {
    Identity,
    Inventory,
    Companies,
    Listings,
    Battles,
    Rounds(u64),
    Proposals,
    Country,
    Regions,
    Rewards,
    Friends,
}

impl EntitySet {
    /// Everything a session mounts up front. Round histories are mounted
    /// per battle.
    pub const MOUNTED: [EntitySet; 10] = [
        EntitySet::Identity,
        EntitySet::Inventory,
        EntitySet::Companies,
        EntitySet::Listings,
        EntitySet::Battles,
        EntitySet::Proposals,
        EntitySet::Country,
        EntitySet::Regions,
        EntitySet::Rewards,
        EntitySet::Friends,
    ];

    /// Sets read by country id; fetched again once the country is known.
    pub const COUNTRY_SCOPED: [EntitySet; 4] = [
        EntitySet::Listings,
        EntitySet::Proposals,
        EntitySet::Country,
        EntitySet::Regions,
    ];

    /// Fast sets reconcile on the short delay.
    pub fn is_fast(&self) -> bool {
        matches!(
            self,
            EntitySet::Identity
                | EntitySet::Inventory
                | EntitySet::Listings
                | EntitySet::Battles
                | EntitySet::Rounds(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fetched {
    Identity(Option<Profile>),
    Inventory(Vec<InventoryItem>),
    Companies(Vec<CompanyProfile>),
    Listings(Vec<MarketListing>),
    Battles(Vec<Battle>),
    Rounds(u64, Vec<RoundHistory>),
    Proposals(Vec<Proposal>),
    Country(Option<CountryData>),
    Regions(Vec<RegionData>),
    Rewards(Vec<PendingReward>),
    Friends(Vec<Friend>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOrigin {
    Mount,
    Poll,
    Reconcile,
}

/// A finished fetch on its way back to the store.
#[derive(Debug)]
pub struct StoreEvent {
    pub set: EntitySet,
    pub seq: u64,
    pub origin: FetchOrigin,
    pub result: Result<Fetched>,
}

/// Numbers fetches and patches in issue order. Shared with background
/// tasks so a delayed fetch can take its number when it actually fires.
#[derive(Clone, Debug, Default)]
pub struct Sequencer(Arc<AtomicU64>);

impl Sequencer {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The session's country id, 0 while unknown. Pollers hold a clone and read
/// it on every tick.
#[derive(Clone, Debug, Default)]
pub struct CountryCell(Arc<AtomicU64>);

impl CountryCell {
    pub fn new(country_id: u64) -> Self {
        Self(Arc::new(AtomicU64::new(country_id)))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the country only if none is known yet.
    pub fn resolve(&self, country_id: u64) -> bool {
        country_id != 0
            && self
                .0
                .compare_exchange(0, country_id, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }
}

/// What a background task needs to read one entity set.
#[derive(Clone, Debug)]
pub struct FetchContext<T> {
    pub services: Services<T>,
    pub player: AccountAddress,
    pub country: CountryCell,
}

impl<T: Transport> FetchContext<T> {
    pub async fn fetch(&self, set: EntitySet) -> Result<Fetched> {
        let services = &self.services;
        let country_id = self.country.get();
        Ok(match set {
            EntitySet::Identity => {
                Fetched::Identity(services.identity.try_profile(self.player).await?)
            }
            EntitySet::Inventory => {
                Fetched::Inventory(services.inventory.try_items(self.player).await?)
            }
            EntitySet::Companies => Fetched::Companies(
                services.company.try_companies_by_owner(self.player).await?,
            ),
            EntitySet::Listings => {
                Fetched::Listings(services.market.try_listings(country_id).await?)
            }
            EntitySet::Battles => {
                Fetched::Battles(services.battle.try_active_battles().await?)
            }
            EntitySet::Rounds(battle_id) => Fetched::Rounds(
                battle_id,
                services.battle.try_round_history(battle_id).await?,
            ),
            EntitySet::Proposals => Fetched::Proposals(
                services.governance.try_proposals(country_id).await?,
            ),
            EntitySet::Country => {
                Fetched::Country(services.territory.try_country(country_id).await?)
            }
            EntitySet::Regions => Fetched::Regions(
                services
                    .territory
                    .try_regions_of_country(country_id)
                    .await?,
            ),
            EntitySet::Rewards => {
                Fetched::Rewards(services.treasury.try_pending_rewards(self.player).await?)
            }
            EntitySet::Friends => {
                Fetched::Friends(services.social.try_friends(self.player).await?)
            }
        })
    }
}
