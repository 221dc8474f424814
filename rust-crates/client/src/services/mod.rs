//! One service per game module.
//!
//! Reads go view call → normalizer → mapper. Each read has a `try_` form
//! that returns the error and a plain form that absorbs it into the empty
//! value. Writes validate their arguments before anything leaves the
//! process. Services never touch client state.

use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::{
        ClientError,
        Result,
    },
    model::{
        MAX_QUALITY,
        MIN_QUALITY,
    },
    transport::{
        Transport,
        TxHash,
        ViewRequest,
    },
    tx::{
        EntryFunction,
        Expiry,
    },
};
use serde_json::Value;

pub mod admin;
pub mod battle;
pub mod company;
pub mod governance;
pub mod identity;
pub mod inventory;
pub mod market;
pub mod social;
pub mod territory;
pub mod treasury;

pub use admin::AdminService;
pub use battle::BattleService;
pub use company::CompanyService;
pub use governance::GovernanceService;
pub use identity::IdentityService;
pub use inventory::InventoryService;
pub use market::MarketService;
pub use social::SocialService;
pub use territory::TerritoryService;
pub use treasury::TreasuryService;

/// Calls into one named module at the transport's module address.
#[derive(Clone, Debug)]
pub struct ModuleClient<T> {
    transport: T,
    module: &'static str,
}

impl<T: Transport> ModuleClient<T> {
    pub fn new(transport: T, module: &'static str) -> Self {
        Self { transport, module }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn function_id(&self, function: &str) -> String {
        format!(
            "{}::{}::{}",
            self.transport.module_address().to_hex_literal(),
            self.module,
            function
        )
    }

    pub async fn view(&self, function: &str, args: &[MoveArg]) -> Result<Value> {
        let request = ViewRequest::new(
            self.function_id(function),
            args.iter().map(MoveArg::to_view_json).collect(),
        );
        self.transport.read(request).await
    }

    pub async fn call(&self, function: &str, args: Vec<MoveArg>) -> Result<TxHash> {
        let call = EntryFunction::new(
            self.transport.module_address(),
            self.module,
            function,
            args,
        );
        self.transport.submit(call, Expiry::from_now()).await
    }
}

/// Every domain service over one shared transport.
#[derive(Clone, Debug)]
pub struct Services<T> {
    pub identity: IdentityService<T>,
    pub inventory: InventoryService<T>,
    pub company: CompanyService<T>,
    pub market: MarketService<T>,
    pub battle: BattleService<T>,
    pub governance: GovernanceService<T>,
    pub territory: TerritoryService<T>,
    pub treasury: TreasuryService<T>,
    pub social: SocialService<T>,
    pub admin: AdminService<T>,
}

impl<T: Transport> Services<T> {
    pub fn new(transport: T) -> Self {
        Self {
            identity: IdentityService::new(transport.clone()),
            inventory: InventoryService::new(transport.clone()),
            company: CompanyService::new(transport.clone()),
            market: MarketService::new(transport.clone()),
            battle: BattleService::new(transport.clone()),
            governance: GovernanceService::new(transport.clone()),
            territory: TerritoryService::new(transport.clone()),
            treasury: TreasuryService::new(transport.clone()),
            social: SocialService::new(transport.clone()),
            admin: AdminService::new(transport),
        }
    }
}

pub(crate) fn ensure_id(what: &str, id: u64) -> Result<()> {
    if id == 0 {
        return Err(ClientError::precondition(format!("{what} must be positive")));
    }
    Ok(())
}

pub(crate) fn ensure_amount(what: &str, amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(ClientError::precondition(format!("{what} must be non-zero")));
    }
    Ok(())
}

pub(crate) fn ensure_text(what: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ClientError::precondition(format!("{what} must not be empty")));
    }
    Ok(())
}

pub(crate) fn ensure_quality(quality: u8) -> Result<()> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(ClientError::precondition(format!(
            "quality {quality} is outside {MIN_QUALITY}..={MAX_QUALITY}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_address(what: &str, address: &AccountAddress) -> Result<()> {
    if address.is_zero() {
        return Err(ClientError::precondition(format!("{what} must not be the zero address")));
    }
    Ok(())
}
