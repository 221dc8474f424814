use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentStore,
    record_network,
};
use statecraft_client::{
    AccountAddress,
    config::{
        ClientConfig,
        NetworkTarget,
        SessionConfig,
    },
    notify::{
        LogNotifier,
        Notifier,
    },
    price_history::PriceHistoryStorage,
    services::Services,
    store::{
        EntitySet,
        FetchOutcome,
        Store,
        StoreUpdate,
    },
    transport::Transport,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

/// Follows one player's state on the ledger and logs every change.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    group(
        ArgGroup::new("network")
            .args(["local", "devnet", "testnet"])
            .required(true)
    )
)]
struct Args {
    #[arg(long)]
    local: bool,

    #[arg(long)]
    devnet: bool,

    #[arg(long)]
    testnet: bool,

    /// Override the node URL of the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// Player account to watch
    #[arg(short, long)]
    address: String,

    /// Country id; read from the profile when omitted
    #[arg(short, long, default_value_t = 0)]
    country: u64,

    /// Address the game modules are published at; defaults to the
    /// deployment record of the selected network
    #[arg(long)]
    module_address: Option<String>,

    /// Store --module-address and the node URL as the network record
    #[arg(long, requires = "module_address")]
    save_deployment: bool,

    /// Directory for the persistent market price cache
    #[arg(long)]
    price_cache: Option<String>,

    /// Write daily rolling log files here instead of stderr
    #[arg(long)]
    log_dir: Option<String>,
}

impl Args {
    fn network(&self) -> NetworkTarget {
        if self.local {
            NetworkTarget::Local
        } else if self.devnet {
            NetworkTarget::Devnet
        } else {
            NetworkTarget::Testnet
        }
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).wrap_err_with(|| format!("expanding path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "statecraft-watch.log"));
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = fmt().with_env_filter(filter).try_init();
            None
        }
    }
}

fn resolve_module_address(
    args: &Args,
    network: NetworkTarget,
    rpc_url: &str,
) -> Result<AccountAddress> {
    if let Some(raw) = &args.module_address {
        let address: AccountAddress = raw
            .parse()
            .wrap_err_with(|| format!("parsing --module-address {raw}"))?;
        if args.save_deployment {
            record_network(network.env(), address.to_hex_literal(), rpc_url, None)
                .map_err(|e| eyre!(e))
                .wrap_err("saving network record")?;
            tracing::info!(env = %network.env(), module = %address.short(), "network record saved");
        }
        return Ok(address);
    }
    let store = DeploymentStore::new(network.env())
        .map_err(|e| eyre!(e))
        .wrap_err("opening deployments store")?;
    let record = store
        .load()
        .map_err(|e| eyre!(e))
        .wrap_err("loading network record")?
        .ok_or_else(|| {
            eyre!("no network record for {}; provide --module-address", network.env())
        })?;
    if !record.is_for_node(rpc_url) {
        tracing::warn!(
            recorded = %record.node_url,
            rpc = %rpc_url,
            "network record was made against another node"
        );
    }
    record
        .module_address
        .parse()
        .wrap_err_with(|| format!("parsing recorded module address {}", record.module_address))
}

fn log_update<T, N, P>(store: &Store<T, N, P>, update: StoreUpdate)
where
    T: Transport,
    N: Notifier,
    P: PriceHistoryStorage,
{
    if update.outcome != FetchOutcome::Applied {
        return;
    }
    let state = store.state();
    match update.set {
        EntitySet::Identity => {
            if let Some(profile) = state.profile() {
                tracing::info!(
                    energy = profile.energy,
                    level = profile.level,
                    balance = profile.game_balance.display,
                    "profile"
                );
            }
        }
        EntitySet::Battles => {
            for battle in state.battles.value() {
                tracing::info!(
                    battle = battle.id,
                    round = battle.round,
                    wall = battle.wall,
                    "battle"
                );
            }
        }
        EntitySet::Listings => {
            for listing in state.listings.value() {
                let item_id = listing.item.item_id;
                let change = store
                    .price_delta(item_id)
                    .and_then(|delta| delta.change())
                    .unwrap_or(0);
                tracing::info!(
                    listing = listing.id,
                    item_id,
                    quantity = listing.quantity,
                    price = listing.price_per_unit(),
                    change,
                    "listing"
                );
            }
        }
        set => tracing::info!(?set, origin = ?update.origin, "updated"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let log_dir = args.log_dir.as_deref().map(expand_path).transpose()?;
    let _guard = init_tracing(log_dir.as_deref());

    let network = args.network();
    let player: AccountAddress = args
        .address
        .parse()
        .wrap_err_with(|| format!("parsing --address {}", args.address))?;
    let rpc_url = args
        .rpc_url
        .clone()
        .unwrap_or_else(|| network.default_url().to_string());
    let module_address = resolve_module_address(&args, network, &rpc_url)?;
    let price_cache = args.price_cache.as_deref().map(expand_path).transpose()?;

    let config = ClientConfig::new(
        network,
        module_address,
        SessionConfig::new(player, args.country),
    )
    .with_rpc_url(rpc_url)
    .with_price_cache(price_cache);

    let transport = config.read_only_transport()?;
    let prices = config
        .open_price_history()
        .wrap_err("opening price history")?;
    let mut store = Store::new(
        Services::new(transport),
        LogNotifier::default(),
        prices,
        config.session,
    );
    tracing::info!(
        network = ?network,
        rpc = %config.rpc_url,
        player = %player.short(),
        "watching player"
    );

    store.mount_all();
    store.start_polling();
    loop {
        tokio::select! {
            update = store.next_event() => {
                let Some(update) = update else { break };
                log_update(&store, update);
            }
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => tracing::info!("Received interrupt, exiting"),
                    Err(_) => tracing::warn!("Received interrupt error, exiting anyway"),
                }
                break;
            }
        }
    }
    store.cancel_background();
    Ok(())
}
