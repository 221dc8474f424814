//! In-process fakes for the ledger, the wallet extension and the notifier.

use crate::{
    address::AccountAddress,
    config::SessionConfig,
    error::{
        ClientError,
        Result,
    },
    notify::{
        Notifier,
        Severity,
    },
    price_history::InMemoryPriceHistory,
    services::Services,
    store::Store,
    transport::{
        Transport,
        TxHash,
        ViewRequest,
        submit_with_wallet,
    },
    tx::{
        EntryFunction,
        Expiry,
        TransactionDescriptor,
    },
    wallets::{
        SendRequest,
        WalletCapability,
        WalletError,
    },
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

pub const TEST_MODULE_ADDRESS: AccountAddress = {
    let mut bytes = [0u8; 32];
    bytes[30] = 0xca;
    bytes[31] = 0xfe;
    AccountAddress::new(bytes)
};

pub const TEST_CHAIN_ID: u64 = 2;

#[derive(Debug, Default)]
struct WalletState {
    account: Option<AccountAddress>,
    connect_as: Option<AccountAddress>,
    response: Option<Value>,
    rejection: Option<String>,
    descriptors: Vec<TransactionDescriptor>,
    sends: Vec<SendRequest>,
}

/// Records everything it is asked to sign. Answers with a fresh hash per
/// send unless told otherwise.
#[derive(Clone, Debug, Default)]
pub struct FakeWallet {
    state: Arc<Mutex<WalletState>>,
}

impl FakeWallet {
    pub fn connected(account: AccountAddress) -> Self {
        let wallet = Self::default();
        wallet.state.lock().unwrap().account = Some(account);
        wallet
    }

    /// No account, and connecting does not produce one.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// No account until `connect` is called.
    pub fn connects_as(account: AccountAddress) -> Self {
        let wallet = Self::default();
        wallet.state.lock().unwrap().connect_as = Some(account);
        wallet
    }

    pub fn respond_with(&self, response: Value) {
        self.state.lock().unwrap().response = Some(response);
    }

    pub fn reject_with(&self, message: &str) {
        self.state.lock().unwrap().rejection = Some(message.to_string());
    }

    pub fn descriptors(&self) -> Vec<TransactionDescriptor> {
        self.state.lock().unwrap().descriptors.clone()
    }

    pub fn sends(&self) -> Vec<SendRequest> {
        self.state.lock().unwrap().sends.clone()
    }

    /// Function ids of every descriptor, in submission order.
    pub fn submitted_functions(&self) -> Vec<String> {
        self.descriptors()
            .iter()
            .map(|d| format!("{}::{}", d.module_name, d.function_name))
            .collect()
    }
}

impl WalletCapability for FakeWallet {
    async fn connect(&self) -> std::result::Result<(), WalletError> {
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.connect_as.take() {
            state.account = Some(account);
        }
        Ok(())
    }

    async fn account(&self) -> std::result::Result<Option<AccountAddress>, WalletError> {
        Ok(self.state.lock().unwrap().account)
    }

    async fn chain_id(&self) -> std::result::Result<u64, WalletError> {
        Ok(TEST_CHAIN_ID)
    }

    async fn create_raw_transaction_data(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> std::result::Result<Value, WalletError> {
        let mut state = self.state.lock().unwrap();
        state.descriptors.push(descriptor.clone());
        serde_json::to_value(descriptor).map_err(|e| WalletError::new(e.to_string()))
    }

    async fn send_transaction(
        &self,
        request: SendRequest,
    ) -> std::result::Result<Value, WalletError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.rejection {
            return Err(WalletError::new(message.clone()));
        }
        state.sends.push(request);
        let response = match &state.response {
            Some(response) => response.clone(),
            None => json!({ "hash": format!("0x{:064x}", state.sends.len()) }),
        };
        Ok(response)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    views: HashMap<String, Result<Value>>,
    reads: Vec<ViewRequest>,
}

/// A ledger whose views answer with canned JSON. Views nobody set fail
/// like an unreachable node.
#[derive(Clone, Debug, Default)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
    wallet: Option<FakeWallet>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(wallet: FakeWallet) -> Self {
        Self {
            state: Arc::default(),
            wallet: Some(wallet),
        }
    }

    pub fn set_view(&self, module: &str, function: &str, response: Value) {
        self.state
            .lock()
            .unwrap()
            .views
            .insert(function_key(module, function), Ok(response));
    }

    pub fn fail_view(&self, module: &str, function: &str, error: ClientError) {
        self.state
            .lock()
            .unwrap()
            .views
            .insert(function_key(module, function), Err(error));
    }

    pub fn reads(&self) -> Vec<ViewRequest> {
        self.state.lock().unwrap().reads.clone()
    }

    /// How many times one view was read.
    pub fn reads_of(&self, module: &str, function: &str) -> usize {
        let key = function_key(module, function);
        self.reads()
            .iter()
            .filter(|request| request.function == key)
            .count()
    }
}

fn function_key(module: &str, function: &str) -> String {
    format!("{}::{module}::{function}", TEST_MODULE_ADDRESS.to_hex_literal())
}

impl Transport for FakeLedger {
    fn module_address(&self) -> AccountAddress {
        TEST_MODULE_ADDRESS
    }

    async fn read(&self, request: ViewRequest) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        let response = state.views.get(&request.function).cloned();
        let function = request.function.clone();
        state.reads.push(request);
        response.unwrap_or_else(|| {
            Err(ClientError::NetworkFailure(format!("no view registered for {function}")))
        })
    }

    async fn submit(&self, call: EntryFunction, expiry: Expiry) -> Result<TxHash> {
        submit_with_wallet(self.wallet.as_ref(), &call, expiry).await
    }
}

#[derive(Debug, Default)]
struct NotifierState {
    alerts: Vec<(Severity, String)>,
    prompts: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
    answer: bool,
}

impl RecordingNotifier {
    /// Accepts every confirmation.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            answer: true,
        }
    }

    pub fn declining() -> Self {
        Self {
            state: Arc::default(),
            answer: false,
        }
    }

    pub fn alerts(&self) -> Vec<(Severity, String)> {
        self.state.lock().unwrap().alerts.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, severity: Severity, message: &str) {
        self.state
            .lock()
            .unwrap()
            .alerts
            .push((severity, message.to_string()));
    }

    async fn confirm(&self, title: &str, message: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .prompts
            .push(format!("{title}: {message}"));
        self.answer
    }
}

pub type TestStore = Store<FakeLedger, RecordingNotifier, InMemoryPriceHistory>;

/// A connected player wired to fakes.
pub struct TestContext {
    pub ledger: FakeLedger,
    pub wallet: FakeWallet,
    pub notifier: RecordingNotifier,
    pub prices: InMemoryPriceHistory,
    pub player: AccountAddress,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let player = AccountAddress::new([0xa1; 32]);
        let wallet = FakeWallet::connected(player);
        Self {
            ledger: FakeLedger::with_wallet(wallet.clone()),
            wallet,
            notifier,
            prices: InMemoryPriceHistory::new(),
            player,
        }
    }

    pub fn services(&self) -> Services<FakeLedger> {
        Services::new(self.ledger.clone())
    }

    pub fn store(&self, country_id: u64) -> TestStore {
        Store::new(
            self.services(),
            self.notifier.clone(),
            self.prices.clone(),
            SessionConfig::new(self.player, country_id),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn profile_record(address: AccountAddress, energy: u64, game_balance: u64) -> Value {
    json!({
        "address": address.to_hex_literal(),
        "username": "tester",
        "level": 3,
        "experience": 120,
        "energy": energy,
        "max_energy": 100,
        "strength": 14,
        "rank_points": 2,
        "native_balance": "100000000",
        "game_balance": game_balance.to_string(),
        "is_admin": false,
        "country_id": 4,
        "employer_id": { "vec": [] },
        "region_id": { "vec": ["9"] },
    })
}

pub fn item_record(category: u8, quality: u8, quantity: u64) -> Value {
    json!({
        "category": category,
        "quality": quality,
        "quantity": quantity.to_string(),
    })
}

pub fn listing_record(
    id: u64,
    seller: AccountAddress,
    item_id: u64,
    quantity: u64,
    price_per_unit: u64,
) -> Value {
    json!({
        "id": id.to_string(),
        "seller": seller.to_hex_literal(),
        "item_type": { "item_id": item_id.to_string(), "category": item_id / 10, "quality": item_id % 10 },
        "quantity": quantity.to_string(),
        "price_per_unit": price_per_unit.to_string(),
        "country_id": 4,
        "created_at": "1700000000",
    })
}

pub fn battle_record(id: u64, round: u64, is_open: bool) -> Value {
    json!({
        "id": id.to_string(),
        "region_id": "9",
        "attacker_country": "4",
        "defender_country": "7",
        "attacker_influence": "1500",
        "defender_influence": "900",
        "wall": 62,
        "round": round.to_string(),
        "is_open": is_open,
    })
}

pub fn proposal_record(id: u64, yes_votes: u64, executed: bool) -> Value {
    json!({
        "id": id.to_string(),
        "country_id": "4",
        "proposer": AccountAddress::new([0xb2; 32]).to_hex_literal(),
        "proposal_type": 0,
        "payload": "0x",
        "yes_votes": yes_votes.to_string(),
        "no_votes": "0",
        "executed": executed,
        "created_at": "1700000000",
    })
}

pub fn reward_record(id: u64, amount: u64, claimable_at: u64) -> Value {
    json!({
        "id": id.to_string(),
        "kind": 1,
        "amount": amount.to_string(),
        "claimable_at": claimable_at.to_string(),
    })
}
