use crate::{
    address::AccountAddress,
    error::Result,
    price_history::{
        self,
        InMemoryPriceHistory,
        PriceHistory,
        SledPriceHistory,
    },
    store::EntitySet,
    transport::LedgerTransport,
};
use deployments::DeploymentEnv;
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.statecraft.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.statecraft.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8080/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Devnet,
    Testnet,
    Local,
}

impl NetworkTarget {
    pub fn default_url(self) -> &'static str {
        match self {
            NetworkTarget::Devnet => DEFAULT_DEVNET_RPC_URL,
            NetworkTarget::Testnet => DEFAULT_TESTNET_RPC_URL,
            NetworkTarget::Local => DEFAULT_LOCAL_RPC_URL,
        }
    }

    pub fn env(self) -> DeploymentEnv {
        match self {
            NetworkTarget::Devnet => DeploymentEnv::Dev,
            NetworkTarget::Testnet => DeploymentEnv::Test,
            NetworkTarget::Local => DeploymentEnv::Local,
        }
    }
}

/// How long after a successful write the affected sets are re-read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileTimings {
    pub fast: Duration,
    pub slow: Duration,
}

impl Default for ReconcileTimings {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(3),
            slow: Duration::from_secs(30),
        }
    }
}

impl ReconcileTimings {
    pub fn delay_for(&self, set: EntitySet) -> Duration {
        if set.is_fast() { self.fast } else { self.slow }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollIntervals {
    pub battles: Duration,
    pub listings: Duration,
    pub proposals: Duration,
    pub regions: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            battles: Duration::from_secs(10),
            listings: Duration::from_secs(30),
            proposals: Duration::from_secs(30),
            regions: Duration::from_secs(60),
        }
    }
}

impl PollIntervals {
    pub fn schedule(&self) -> [(EntitySet, Duration); 4] {
        [
            (EntitySet::Battles, self.battles),
            (EntitySet::Listings, self.listings),
            (EntitySet::Proposals, self.proposals),
            (EntitySet::Regions, self.regions),
        ]
    }
}

/// Per-player settings of one store session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub player: AccountAddress,
    /// 0 until known; taken from the profile once it loads.
    pub country_id: u64,
    pub timings: ReconcileTimings,
    pub polls: PollIntervals,
}

impl SessionConfig {
    pub fn new(player: AccountAddress, country_id: u64) -> Self {
        Self {
            player,
            country_id,
            timings: ReconcileTimings::default(),
            polls: PollIntervals::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub network: NetworkTarget,
    pub rpc_url: String,
    pub module_address: AccountAddress,
    pub session: SessionConfig,
    pub price_cache: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(
        network: NetworkTarget,
        module_address: AccountAddress,
        session: SessionConfig,
    ) -> Self {
        Self {
            network,
            rpc_url: network.default_url().to_string(),
            module_address,
            session,
            price_cache: None,
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_price_cache(mut self, path: Option<PathBuf>) -> Self {
        self.price_cache = path;
        self
    }

    pub fn read_only_transport(&self) -> Result<LedgerTransport> {
        LedgerTransport::read_only(self.rpc_url.clone(), self.module_address)
    }

    /// Sled-backed when a cache path is configured, in memory otherwise.
    pub fn open_price_history(&self) -> price_history::Result<PriceHistory> {
        Ok(match &self.price_cache {
            Some(path) => PriceHistory::Sled(SledPriceHistory::open(path)?),
            None => PriceHistory::Memory(InMemoryPriceHistory::new()),
        })
    }
}
