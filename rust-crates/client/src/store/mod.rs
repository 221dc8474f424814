//! Client state store.
//!
//! A `Store` holds the last known snapshot of every entity set for one
//! player session. It is owned by the session loop and mutated only through
//! `&mut self`. Background work (mount fetches, pollers and the delayed
//! re-fetches that reconcile optimistic patches) runs in a `JoinSet` and
//! reports back over a channel; dropping the store aborts all of it.
//!
//! Every fetch and every optimistic patch takes a number from one
//! [`Sequencer`]. A fetch result is applied only if it is newer than the
//! last applied result and was issued after the last patch on that set.

use crate::{
    address::AccountAddress,
    config::SessionConfig,
    error::{
        ClientError,
        Result,
    },
    model::{
        Balance,
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
    notify::{
        Notifier,
        Severity,
    },
    price_history::PriceHistoryStorage,
    proposal::ProposalArgs,
    services::{
        Services,
        battle::{
            self,
            Side,
        },
        ensure_address,
        ensure_amount,
        ensure_id,
        ensure_quality,
        governance,
        market,
    },
    transport::{
        Transport,
        TxHash,
    },
};
use chrono::Utc;
use futures::future::join_all;
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

mod fetch;
mod tracked;

pub use fetch::{
    CountryCell,
    EntitySet,
    FetchContext,
    FetchOrigin,
    Fetched,
    Sequencer,
    StoreEvent,
};
pub use tracked::{
    FetchOutcome,
    LoadTracking,
    Phase,
    Tracked,
};

pub const TRAIN_ENERGY_COST: u64 = 10;
pub const WORK_ENERGY_COST: u64 = 10;
pub const FIGHT_ENERGY_COST: u64 = 10;

pub const FOOD_CATEGORY: u8 = 1;
pub const WEAPON_CATEGORY: u8 = 2;

/// Cached snapshot of every entity set.
#[derive(Debug, Default)]
pub struct StoreState {
    pub identity: Tracked<Option<Profile>>,
    pub inventory: Tracked<Vec<InventoryItem>>,
    pub companies: Tracked<Vec<CompanyProfile>>,
    pub listings: Tracked<Vec<MarketListing>>,
    pub battles: Tracked<Vec<Battle>>,
    pub rounds: HashMap<u64, Tracked<Vec<RoundHistory>>>,
    pub proposals: Tracked<Vec<Proposal>>,
    pub country: Tracked<Option<CountryData>>,
    pub regions: Tracked<Vec<RegionData>>,
    pub rewards: Tracked<Vec<PendingReward>>,
    pub friends: Tracked<Vec<Friend>>,
}

impl StoreState {
    pub fn phase(&self, set: EntitySet) -> Phase {
        match set {
            EntitySet::Identity => self.identity.phase(),
            EntitySet::Inventory => self.inventory.phase(),
            EntitySet::Companies => self.companies.phase(),
            EntitySet::Listings => self.listings.phase(),
            EntitySet::Battles => self.battles.phase(),
            EntitySet::Rounds(battle_id) => self
                .rounds
                .get(&battle_id)
                .map(Tracked::phase)
                .unwrap_or_default(),
            EntitySet::Proposals => self.proposals.phase(),
            EntitySet::Country => self.country.phase(),
            EntitySet::Regions => self.regions.phase(),
            EntitySet::Rewards => self.rewards.phase(),
            EntitySet::Friends => self.friends.phase(),
        }
    }

    /// The loaded profile, if any.
    pub fn profile(&self) -> Option<&Profile> {
        self.identity.value().as_ref()
    }

    fn slot_mut(&mut self, set: EntitySet) -> &mut dyn LoadTracking {
        match set {
            EntitySet::Identity => &mut self.identity,
            EntitySet::Inventory => &mut self.inventory,
            EntitySet::Companies => &mut self.companies,
            EntitySet::Listings => &mut self.listings,
            EntitySet::Battles => &mut self.battles,
            EntitySet::Rounds(battle_id) => self.rounds.entry(battle_id).or_default(),
            EntitySet::Proposals => &mut self.proposals,
            EntitySet::Country => &mut self.country,
            EntitySet::Regions => &mut self.regions,
            EntitySet::Rewards => &mut self.rewards,
            EntitySet::Friends => &mut self.friends,
        }
    }
}

/// Result of applying one fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreUpdate {
    pub set: EntitySet,
    pub origin: FetchOrigin,
    pub seq: u64,
    pub outcome: FetchOutcome,
}

/// Lowest listed unit price of an item now and at the last change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceDelta {
    pub current: u64,
    pub previous: Option<u64>,
}

impl PriceDelta {
    pub fn change(&self) -> Option<i128> {
        self.previous
            .map(|previous| i128::from(self.current) - i128::from(previous))
    }
}

pub struct Store<T, N, P> {
    context: FetchContext<T>,
    config: SessionConfig,
    notifier: N,
    prices: P,
    state: StoreState,
    price_deltas: HashMap<u64, PriceDelta>,
    round_marks: HashMap<u64, u64>,
    sequencer: Sequencer,
    events_tx: mpsc::UnboundedSender<StoreEvent>,
    events_rx: mpsc::UnboundedReceiver<StoreEvent>,
    tasks: JoinSet<()>,
    polling: bool,
}

impl<T, N, P> Store<T, N, P>
where
    T: Transport,
    N: Notifier,
    P: PriceHistoryStorage,
{
    pub fn new(services: Services<T>, notifier: N, prices: P, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            context: FetchContext {
                services,
                player: config.player,
                country: CountryCell::new(config.country_id),
            },
            config,
            notifier,
            prices,
            state: StoreState::default(),
            price_deltas: HashMap::new(),
            round_marks: HashMap::new(),
            sequencer: Sequencer::default(),
            events_tx,
            events_rx,
            tasks: JoinSet::new(),
            polling: false,
        }
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn player(&self) -> AccountAddress {
        self.context.player
    }

    pub fn country_id(&self) -> u64 {
        self.context.country.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn price_delta(&self, item_id: u64) -> Option<&PriceDelta> {
        self.price_deltas.get(&item_id)
    }

    /// Background tasks not yet reaped.
    pub fn background_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn mount(&mut self, set: EntitySet) {
        self.state.slot_mut(set).begin_load();
        self.spawn_fetch(set, FetchOrigin::Mount, None);
    }

    pub fn mount_all(&mut self) {
        for set in EntitySet::MOUNTED {
            self.mount(set);
        }
    }

    /// Round history of one battle, kept current while battles poll.
    pub fn watch_battle(&mut self, battle_id: u64) {
        self.mount(EntitySet::Rounds(battle_id));
    }

    /// Fetches every mounted set concurrently and applies the results
    /// before returning.
    pub async fn refresh_all(&mut self) -> Vec<StoreUpdate> {
        let requests: Vec<(EntitySet, u64)> = EntitySet::MOUNTED
            .into_iter()
            .map(|set| {
                self.state.slot_mut(set).begin_load();
                (set, self.sequencer.next())
            })
            .collect();
        let context = &self.context;
        let results = join_all(requests.iter().map(|(set, _)| context.fetch(*set))).await;
        requests
            .into_iter()
            .zip(results)
            .map(|((set, seq), result)| {
                self.apply_event(StoreEvent {
                    set,
                    seq,
                    origin: FetchOrigin::Mount,
                    result,
                })
            })
            .collect()
    }

    pub fn start_polling(&mut self) {
        if self.polling {
            return;
        }
        self.polling = true;
        for (set, every) in self.config.polls.schedule() {
            let context = self.context.clone();
            let sequencer = self.sequencer.clone();
            let events = self.events_tx.clone();
            self.tasks.spawn(async move {
                let mut ticker = time::interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let seq = sequencer.next();
                    let result = context.fetch(set).await;
                    let event = StoreEvent {
                        set,
                        seq,
                        origin: FetchOrigin::Poll,
                        result,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
            });
        }
        info!(pollers = self.config.polls.schedule().len(), "background polling started");
    }

    /// Immediate fetches are numbered now; delayed ones when they fire, so
    /// a re-fetch always counts as issued after the patch that scheduled it.
    pub fn spawn_fetch(&mut self, set: EntitySet, origin: FetchOrigin, delay: Option<Duration>) {
        let context = self.context.clone();
        let sequencer = self.sequencer.clone();
        let events = self.events_tx.clone();
        let issued = delay.is_none().then(|| sequencer.next());
        self.tasks.spawn(async move {
            if let Some(delay) = delay {
                time::sleep(delay).await;
            }
            let seq = issued.unwrap_or_else(|| sequencer.next());
            let result = context.fetch(set).await;
            let _ = events.send(StoreEvent {
                set,
                seq,
                origin,
                result,
            });
        });
    }

    /// Waits for the next finished fetch and applies it.
    pub async fn next_event(&mut self) -> Option<StoreUpdate> {
        let event = self.events_rx.recv().await?;
        self.reap_finished();
        Some(self.apply_event(event))
    }

    /// Applies every fetch that has already finished.
    pub fn drain_ready(&mut self) -> Vec<StoreUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.push(self.apply_event(event));
        }
        self.reap_finished();
        updates
    }

    pub fn cancel_background(&mut self) {
        let aborted = self.tasks.len();
        self.tasks.abort_all();
        self.polling = false;
        debug!(aborted, "background tasks cancelled");
    }

    fn reap_finished(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }

    fn apply_event(&mut self, event: StoreEvent) -> StoreUpdate {
        let StoreEvent {
            set,
            seq,
            origin,
            result,
        } = event;
        let outcome = match result {
            Ok(fetched) => self.apply_fetched(seq, fetched),
            Err(e) => {
                warn!(?set, ?origin, "fetch failed, keeping cached value: {e}");
                self.state.slot_mut(set).fetch_failed();
                FetchOutcome::Absorbed
            }
        };
        match outcome {
            FetchOutcome::Outdated | FetchOutcome::PrecedesPatch | FetchOutcome::Regressed => {
                warn!(?set, ?origin, seq, ?outcome, "discarded stale fetch");
            }
            FetchOutcome::Applied => debug!(?set, ?origin, seq, "fetch applied"),
            FetchOutcome::Absorbed => {}
        }
        StoreUpdate {
            set,
            origin,
            seq,
            outcome,
        }
    }

    fn apply_fetched(&mut self, seq: u64, fetched: Fetched) -> FetchOutcome {
        match fetched {
            Fetched::Identity(profile) => {
                let outcome = self.state.identity.accept(seq, profile);
                if outcome == FetchOutcome::Applied {
                    self.adopt_country();
                }
                outcome
            }
            Fetched::Inventory(items) => self.state.inventory.accept(seq, items),
            Fetched::Companies(companies) => self.state.companies.accept(seq, companies),
            Fetched::Listings(listings) => {
                let outcome = self.state.listings.accept(seq, listings);
                if outcome == FetchOutcome::Applied {
                    self.update_price_deltas();
                }
                outcome
            }
            Fetched::Battles(battles) => self.apply_battles(seq, battles),
            Fetched::Rounds(battle_id, rounds) => self.apply_rounds(seq, battle_id, rounds),
            Fetched::Proposals(proposals) => self.state.proposals.accept(seq, proposals),
            Fetched::Country(country) => self.state.country.accept(seq, country),
            Fetched::Regions(regions) => self.state.regions.accept(seq, regions),
            Fetched::Rewards(rewards) => self.state.rewards.accept(seq, rewards),
            Fetched::Friends(friends) => self.state.friends.accept(seq, friends),
        }
    }

    /// Sessions started without a country pick it up from the profile.
    /// Country-scoped sets read so far asked for country 0 and are fetched
    /// again; running pollers share the cell and follow on their next tick.
    fn adopt_country(&mut self) {
        let Some(country_id) = self.state.profile().map(|profile| profile.country_id) else {
            return;
        };
        if self.context.country.resolve(country_id) {
            info!(country_id, "country resolved from profile");
            for set in EntitySet::COUNTRY_SCOPED {
                self.mount(set);
            }
        }
    }

    /// Rounds never move backwards, whatever a lagging node reports.
    fn apply_battles(&mut self, seq: u64, mut battles: Vec<Battle>) -> FetchOutcome {
        let mut advanced = Vec::new();
        for battle in &mut battles {
            let mark = self.round_marks.entry(battle.id).or_insert(0);
            if battle.round < *mark {
                debug!(battle = battle.id, reported = battle.round, kept = *mark, "round went backwards");
                battle.round = *mark;
            } else if battle.round > *mark {
                advanced.push(battle.id);
            }
            *mark = battle.round;
        }
        let outcome = self.state.battles.accept(seq, battles);
        if outcome == FetchOutcome::Applied {
            for battle_id in advanced {
                if self.state.rounds.contains_key(&battle_id) {
                    self.spawn_fetch(EntitySet::Rounds(battle_id), FetchOrigin::Poll, None);
                }
            }
        }
        outcome
    }

    /// A history whose latest round is behind the one held comes from a
    /// lagging node and is dropped.
    fn apply_rounds(&mut self, seq: u64, battle_id: u64, rounds: Vec<RoundHistory>) -> FetchOutcome {
        let latest = latest_round(&rounds);
        let tracked = self.state.rounds.entry(battle_id).or_default();
        let held = latest_round(tracked.value());
        if tracked.has_value() && latest < held {
            debug!(battle = battle_id, reported = ?latest, kept = ?held, "round history went backwards");
            return FetchOutcome::Regressed;
        }
        let outcome = tracked.accept(seq, rounds);
        if outcome == FetchOutcome::Applied
            && let Some(latest) = latest
        {
            let mark = self.round_marks.entry(battle_id).or_insert(0);
            *mark = (*mark).max(latest);
        }
        outcome
    }

    fn update_price_deltas(&mut self) {
        let mut lowest: BTreeMap<u64, u64> = BTreeMap::new();
        for listing in self.state.listings.value() {
            let price = listing.price_per_unit_atomic;
            lowest
                .entry(listing.item.item_id)
                .and_modify(|current| *current = (*current).min(price))
                .or_insert(price);
        }
        for (item_id, current) in lowest {
            let stored = match self.prices.previous_price(item_id) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(item_id, "price history unavailable: {e}");
                    continue;
                }
            };
            let previous = if stored == Some(current) {
                self.price_deltas
                    .get(&item_id)
                    .and_then(|delta| delta.previous)
            } else {
                if let Err(e) = self.prices.record_price(item_id, current) {
                    warn!(item_id, "failed to record price: {e}");
                }
                stored
            };
            self.price_deltas
                .insert(item_id, PriceDelta { current, previous });
        }
    }

    // actions

    pub async fn train(&mut self) -> Result<TxHash> {
        const ACTION: &str = "train";
        self.guard(ACTION, self.require_energy(TRAIN_ENERGY_COST))?;
        let seq = self.sequencer.next();
        self.state
            .identity
            .patch(seq, |profile| spend_energy(profile, TRAIN_ENERGY_COST));
        let result = self.context.services.identity.train().await;
        self.settle(ACTION, result, &[EntitySet::Identity])
    }

    pub async fn work(&mut self) -> Result<TxHash> {
        const ACTION: &str = "work";
        self.guard(ACTION, self.require_employer().map(|_| ()))?;
        self.guard(ACTION, self.require_energy(WORK_ENERGY_COST))?;
        let seq = self.sequencer.next();
        self.state
            .identity
            .patch(seq, |profile| spend_energy(profile, WORK_ENERGY_COST));
        let result = self.context.services.identity.work().await;
        self.settle(ACTION, result, &[EntitySet::Identity])
    }

    pub async fn eat(&mut self, food_quality: u8) -> Result<TxHash> {
        const ACTION: &str = "eat";
        self.guard(ACTION, ensure_quality(food_quality))?;
        let item_id = self.guard(
            ACTION,
            self.require_item(FOOD_CATEGORY, food_quality, 1, "food"),
        )?;
        let seq = self.sequencer.next();
        self.state
            .inventory
            .patch(seq, |items| take_items(items, item_id, 1));
        let result = self.context.services.identity.eat(food_quality).await;
        self.settle(ACTION, result, &[EntitySet::Identity, EntitySet::Inventory])
    }

    pub async fn fight(&mut self, battle_id: u64, side: Side, weapon_quality: u8) -> Result<TxHash> {
        const ACTION: &str = "fight";
        self.guard(ACTION, battle::validate_fight(battle_id, weapon_quality))?;
        self.guard(ACTION, self.require_open_battle(battle_id))?;
        self.guard(ACTION, self.require_energy(FIGHT_ENERGY_COST))?;
        let weapon = if weapon_quality > 0 {
            Some(self.guard(
                ACTION,
                self.require_item(WEAPON_CATEGORY, weapon_quality, 1, "weapon"),
            )?)
        } else {
            None
        };
        let seq = self.sequencer.next();
        self.state
            .identity
            .patch(seq, |profile| spend_energy(profile, FIGHT_ENERGY_COST));
        if let Some(item_id) = weapon {
            self.state
                .inventory
                .patch(seq, |items| take_items(items, item_id, 1));
        }
        let result = self
            .context
            .services
            .battle
            .fight(battle_id, side, weapon_quality)
            .await;
        self.settle(
            ACTION,
            result,
            &[
                EntitySet::Identity,
                EntitySet::Inventory,
                EntitySet::Battles,
                EntitySet::Rounds(battle_id),
            ],
        )
    }

    pub async fn create_listing(
        &mut self,
        item_id: u64,
        quantity: u64,
        price_per_unit: u64,
    ) -> Result<TxHash> {
        const ACTION: &str = "create listing";
        self.guard(
            ACTION,
            market::validate_listing(item_id, quantity, price_per_unit),
        )?;
        self.guard(ACTION, self.require_stock(item_id, quantity))?;
        let seq = self.sequencer.next();
        self.state
            .inventory
            .patch(seq, |items| take_items(items, item_id, quantity));
        let result = self
            .context
            .services
            .market
            .create_listing(item_id, quantity, price_per_unit)
            .await;
        self.settle(ACTION, result, &[EntitySet::Inventory, EntitySet::Listings])
    }

    /// Asks for confirmation first; `Ok(None)` means the player declined
    /// and nothing was submitted.
    pub async fn buy_listing(&mut self, listing_id: u64, quantity: u64) -> Result<Option<TxHash>> {
        const ACTION: &str = "buy listing";
        self.guard(ACTION, market::validate_purchase(listing_id, quantity))?;
        let listing = self.guard(ACTION, self.check_purchase(listing_id, quantity))?;
        let total = Balance::game(listing.price_per_unit_atomic.saturating_mul(quantity));
        let prompt = format!(
            "Buy {quantity} of item {} at {:.2} each for {:.2}?",
            listing.item.item_id,
            listing.price_per_unit(),
            total.display
        );
        if !self.notifier.confirm("Confirm purchase", &prompt).await {
            info!(listing_id, "purchase declined");
            return Ok(None);
        }
        let seq = self.sequencer.next();
        self.state.listings.patch(seq, |listings| {
            if let Some(listing) = listings.iter_mut().find(|l| l.id == listing_id) {
                listing.quantity = listing.quantity.saturating_sub(quantity);
            }
            listings.retain(|l| l.quantity > 0);
        });
        self.state.identity.patch(seq, |profile| {
            if let Some(profile) = profile {
                profile.game_balance =
                    Balance::game(profile.game_balance.atomic.saturating_sub(total.atomic));
            }
        });
        let result = self
            .context
            .services
            .market
            .buy_listing(listing_id, quantity)
            .await;
        self.settle(
            ACTION,
            result,
            &[EntitySet::Listings, EntitySet::Identity, EntitySet::Inventory],
        )
        .map(Some)
    }

    pub async fn cancel_listing(&mut self, listing_id: u64) -> Result<TxHash> {
        const ACTION: &str = "cancel listing";
        self.guard(ACTION, ensure_id("listing id", listing_id))?;
        self.guard(ACTION, self.require_own_listing(listing_id))?;
        let seq = self.sequencer.next();
        self.state
            .listings
            .patch(seq, |listings| listings.retain(|l| l.id != listing_id));
        let result = self.context.services.market.cancel_listing(listing_id).await;
        self.settle(ACTION, result, &[EntitySet::Listings, EntitySet::Inventory])
    }

    pub async fn vote(&mut self, proposal_id: u64, support: bool) -> Result<TxHash> {
        const ACTION: &str = "vote";
        self.guard(ACTION, ensure_id("proposal id", proposal_id))?;
        self.guard(ACTION, self.require_open_proposal(proposal_id))?;
        let seq = self.sequencer.next();
        self.state.proposals.patch(seq, |proposals| {
            if let Some(proposal) = proposals.iter_mut().find(|p| p.id == proposal_id) {
                if support {
                    proposal.yes_votes += 1;
                } else {
                    proposal.no_votes += 1;
                }
            }
        });
        let result = self
            .context
            .services
            .governance
            .vote(proposal_id, support)
            .await;
        self.settle(ACTION, result, &[EntitySet::Proposals])
    }

    /// Shows the proposal as a placeholder with id 0 until the ledger
    /// assigns one.
    pub async fn propose(&mut self, args: ProposalArgs) -> Result<TxHash> {
        const ACTION: &str = "propose";
        let country_id = self.guard(ACTION, self.require_country())?;
        let payload = self.guard(ACTION, governance::proposal_payload(country_id, &args))?;
        let player = self.context.player;
        let seq = self.sequencer.next();
        let placeholder = Proposal {
            id: 0,
            country_id,
            proposer: player,
            proposal_type: args.type_id(),
            payload,
            args: Some(args.clone()),
            created_at: now_secs(),
            ..Default::default()
        };
        self.state
            .proposals
            .patch(seq, |proposals| proposals.push(placeholder));
        let result = self
            .context
            .services
            .governance
            .propose(country_id, &args)
            .await;
        self.settle(ACTION, result, &[EntitySet::Proposals])
    }

    pub async fn execute_proposal(&mut self, proposal_id: u64) -> Result<TxHash> {
        const ACTION: &str = "execute proposal";
        self.guard(ACTION, ensure_id("proposal id", proposal_id))?;
        self.guard(ACTION, self.require_open_proposal(proposal_id))?;
        let seq = self.sequencer.next();
        self.state.proposals.patch(seq, |proposals| {
            if let Some(proposal) = proposals.iter_mut().find(|p| p.id == proposal_id) {
                proposal.executed = true;
            }
        });
        let result = self.context.services.governance.execute(proposal_id).await;
        self.settle(ACTION, result, &[EntitySet::Proposals, EntitySet::Country])
    }

    pub async fn travel(&mut self, region_id: u64) -> Result<TxHash> {
        const ACTION: &str = "travel";
        self.guard(ACTION, ensure_id("region id", region_id))?;
        let current = self.guard(ACTION, self.require_profile().map(|p| p.region_id))?;
        if current == Some(region_id) {
            return Err(self.report(
                ACTION,
                ClientError::precondition(format!("already in region {region_id}")),
            ));
        }
        let seq = self.sequencer.next();
        self.state.identity.patch(seq, |profile| {
            if let Some(profile) = profile {
                profile.region_id = Some(region_id);
            }
        });
        let result = self.context.services.territory.travel(region_id).await;
        self.settle(ACTION, result, &[EntitySet::Identity])
    }

    pub async fn claim_reward(&mut self, reward_id: u64) -> Result<TxHash> {
        const ACTION: &str = "claim reward";
        self.guard(ACTION, ensure_id("reward id", reward_id))?;
        let reward = self.guard(ACTION, self.require_claimable(reward_id))?;
        let seq = self.sequencer.next();
        self.state
            .rewards
            .patch(seq, |rewards| rewards.retain(|r| r.id != reward_id));
        self.state.identity.patch(seq, |profile| {
            if let Some(profile) = profile {
                profile.game_balance = Balance::game(
                    profile
                        .game_balance
                        .atomic
                        .saturating_add(reward.amount.atomic),
                );
            }
        });
        let result = self.context.services.treasury.claim_reward(reward_id).await;
        self.settle(ACTION, result, &[EntitySet::Rewards, EntitySet::Identity])
    }

    pub async fn donate(&mut self, amount: u64) -> Result<TxHash> {
        const ACTION: &str = "donate";
        let country_id = self.guard(ACTION, self.require_country())?;
        self.guard(ACTION, ensure_amount("donation", amount))?;
        self.guard(ACTION, self.require_funds(amount))?;
        let seq = self.sequencer.next();
        self.state.identity.patch(seq, |profile| {
            if let Some(profile) = profile {
                profile.game_balance =
                    Balance::game(profile.game_balance.atomic.saturating_sub(amount));
            }
        });
        self.state.country.patch(seq, |country| {
            if let Some(country) = country {
                country.treasury =
                    Balance::game(country.treasury.atomic.saturating_add(amount));
            }
        });
        let result = self
            .context
            .services
            .treasury
            .donate(country_id, amount)
            .await;
        self.settle(ACTION, result, &[EntitySet::Identity, EntitySet::Country])
    }

    pub async fn apply_job(&mut self, company_id: u64) -> Result<TxHash> {
        const ACTION: &str = "apply for job";
        self.guard(ACTION, ensure_id("company id", company_id))?;
        let employer = self.guard(ACTION, self.require_profile().map(|p| p.employer_id))?;
        if let Some(employer) = employer {
            return Err(self.report(
                ACTION,
                ClientError::precondition(format!("already employed by company {employer}")),
            ));
        }
        let seq = self.sequencer.next();
        self.state.identity.patch(seq, |profile| {
            if let Some(profile) = profile {
                profile.employer_id = Some(company_id);
            }
        });
        let result = self.context.services.company.apply_job(company_id).await;
        self.settle(ACTION, result, &[EntitySet::Identity])
    }

    pub async fn add_friend(&mut self, friend: AccountAddress) -> Result<TxHash> {
        const ACTION: &str = "add friend";
        self.guard(ACTION, ensure_address("friend", &friend))?;
        self.guard(ACTION, self.check_new_friend(&friend))?;
        let seq = self.sequencer.next();
        self.state.friends.patch(seq, |friends| {
            friends.push(Friend {
                address: friend,
                username: String::new(),
            })
        });
        let result = self.context.services.social.add_friend(friend).await;
        self.settle(ACTION, result, &[EntitySet::Friends])
    }

    // preconditions

    fn require_profile(&self) -> Result<&Profile> {
        self.state
            .profile()
            .ok_or_else(|| ClientError::precondition("profile is not loaded"))
    }

    fn require_energy(&self, cost: u64) -> Result<()> {
        let profile = self.require_profile()?;
        if profile.energy < cost {
            return Err(ClientError::precondition(format!(
                "not enough energy: {} of {cost} needed",
                profile.energy
            )));
        }
        Ok(())
    }

    fn require_employer(&self) -> Result<u64> {
        self.require_profile()?
            .employer_id
            .ok_or_else(|| ClientError::precondition("not employed by any company"))
    }

    fn require_funds(&self, amount: u64) -> Result<()> {
        let balance = self.require_profile()?.game_balance;
        if balance.atomic < amount {
            return Err(ClientError::precondition(format!(
                "insufficient funds: have {:.2}, need {:.2}",
                balance.display,
                Balance::game(amount).display
            )));
        }
        Ok(())
    }

    fn require_country(&self) -> Result<u64> {
        match self.context.country.get() {
            0 => Err(ClientError::precondition("country is not known yet")),
            country_id => Ok(country_id),
        }
    }

    fn require_item(&self, category: u8, quality: u8, quantity: u64, what: &str) -> Result<u64> {
        self.state
            .inventory
            .value()
            .iter()
            .find(|item| {
                item.category == category && item.quality == quality && item.quantity >= quantity
            })
            .map(|item| item.item_id)
            .ok_or_else(|| ClientError::precondition(format!("no quality {quality} {what} in inventory")))
    }

    fn require_stock(&self, item_id: u64, quantity: u64) -> Result<()> {
        let held = self
            .state
            .inventory
            .value()
            .iter()
            .find(|item| item.item_id == item_id)
            .map(|item| item.quantity)
            .unwrap_or(0);
        if held < quantity {
            return Err(ClientError::precondition(format!(
                "only {held} of item {item_id} in inventory, {quantity} needed"
            )));
        }
        Ok(())
    }

    fn require_open_battle(&self, battle_id: u64) -> Result<()> {
        match self.state.battles.value().iter().find(|b| b.id == battle_id) {
            Some(battle) if battle.is_open => Ok(()),
            Some(_) => Err(ClientError::precondition(format!("battle {battle_id} is over"))),
            None => Err(ClientError::precondition(format!("battle {battle_id} is not active"))),
        }
    }

    fn check_purchase(&self, listing_id: u64, quantity: u64) -> Result<MarketListing> {
        let listing = self
            .state
            .listings
            .value()
            .iter()
            .find(|l| l.id == listing_id)
            .ok_or_else(|| {
                ClientError::precondition(format!("listing {listing_id} is not on the market"))
            })?;
        if listing.seller == self.context.player {
            return Err(ClientError::precondition("cannot buy your own listing"));
        }
        if quantity == 0 || quantity > listing.quantity {
            return Err(ClientError::precondition(format!(
                "quantity must be between 1 and {}",
                listing.quantity
            )));
        }
        self.require_funds(listing.price_per_unit_atomic.saturating_mul(quantity))?;
        Ok(listing.clone())
    }

    fn require_own_listing(&self, listing_id: u64) -> Result<()> {
        match self.state.listings.value().iter().find(|l| l.id == listing_id) {
            Some(listing) if listing.seller == self.context.player => Ok(()),
            Some(_) => Err(ClientError::precondition(format!(
                "listing {listing_id} belongs to another seller"
            ))),
            None => Err(ClientError::precondition(format!(
                "listing {listing_id} is not on the market"
            ))),
        }
    }

    fn require_open_proposal(&self, proposal_id: u64) -> Result<()> {
        match self
            .state
            .proposals
            .value()
            .iter()
            .find(|p| p.id == proposal_id)
        {
            Some(proposal) if proposal.is_open() => Ok(()),
            Some(_) => Err(ClientError::precondition(format!(
                "proposal {proposal_id} was already executed"
            ))),
            None => Err(ClientError::precondition(format!(
                "proposal {proposal_id} is unknown"
            ))),
        }
    }

    fn require_claimable(&self, reward_id: u64) -> Result<PendingReward> {
        let reward = self
            .state
            .rewards
            .value()
            .iter()
            .find(|r| r.id == reward_id)
            .ok_or_else(|| ClientError::precondition(format!("reward {reward_id} is not pending")))?;
        if !reward.is_claimable(now_secs()) {
            return Err(ClientError::precondition(format!(
                "reward {reward_id} unlocks at {}",
                reward.claimable_at
            )));
        }
        Ok(reward.clone())
    }

    fn check_new_friend(&self, friend: &AccountAddress) -> Result<()> {
        if *friend == self.context.player {
            return Err(ClientError::precondition("cannot befriend yourself"));
        }
        if self
            .state
            .friends
            .value()
            .iter()
            .any(|f| f.address == *friend)
        {
            return Err(ClientError::precondition(format!(
                "{} is already a friend",
                friend.short()
            )));
        }
        Ok(())
    }

    // outcome handling

    fn guard<V>(&self, action: &str, check: Result<V>) -> Result<V> {
        check.map_err(|e| self.report(action, e))
    }

    /// The single place a failed action reaches the player.
    fn report(&self, action: &str, e: ClientError) -> ClientError {
        let severity = match e {
            ClientError::DomainPreconditionFailure(_) => {
                warn!(action, "action refused: {e}");
                Severity::Warning
            }
            _ => {
                error!(action, "action failed: {e}");
                Severity::Error
            }
        };
        self.notifier.alert(severity, &format!("{action}: {e}"));
        e
    }

    fn settle(
        &mut self,
        action: &str,
        result: Result<TxHash>,
        reconcile: &[EntitySet],
    ) -> Result<TxHash> {
        match result {
            Ok(hash) => {
                info!(action, %hash, "action submitted");
                for set in reconcile {
                    let delay = self.config.timings.delay_for(*set);
                    self.spawn_fetch(*set, FetchOrigin::Reconcile, Some(delay));
                }
                Ok(hash)
            }
            Err(e) => Err(self.report(action, e)),
        }
    }
}

fn spend_energy(profile: &mut Option<Profile>, cost: u64) {
    if let Some(profile) = profile {
        profile.energy = profile.energy.saturating_sub(cost);
    }
}

fn take_items(items: &mut Vec<InventoryItem>, item_id: u64, quantity: u64) {
    if let Some(item) = items.iter_mut().find(|item| item.item_id == item_id) {
        item.quantity = item.quantity.saturating_sub(quantity);
    }
    items.retain(|item| item.quantity > 0);
}

fn latest_round(rounds: &[RoundHistory]) -> Option<u64> {
    rounds.iter().map(|r| r.round).max()
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
