use super::{
    ModuleClient,
    ensure_amount,
    ensure_id,
    ensure_text,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::{
        Balance,
        CompanyProfile,
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
use serde_json::Value;
use tracing::warn;

pub const MODULE: &str = "company";

pub static COMPANIES: Schema = Schema {
    name: "companies",
    columns: &[
        "id",
        "name",
        "company_type",
        "region_id",
        "owner",
        "quality",
        "funds",
        "input_stock",
        "output_stock",
        "employees",
    ],
};

/// Employee lists longer than the quality allows are cut to capacity.
pub fn map_company(row: &Row) -> CompanyProfile {
    let mut company = CompanyProfile {
        id: row.u64(&["id", "company_id"]),
        name: row.text(&["name"]),
        company_type: row.u8(&["company_type", "type", "kind"]),
        region_id: row.u64(&["region_id", "region"]),
        owner: row.address(&["owner"]),
        quality: row.quality(&["quality", "level"]),
        funds: Balance::game(row.u64(&["funds", "balance"])),
        input_stock: row.u64(&["input_stock", "raw_stock"]),
        output_stock: row.u64(&["output_stock", "product_stock"]),
        employees: row
            .list(&["employees", "workers"])
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|raw| raw.parse().ok())
            .collect(),
    };
    let capacity = company.capacity();
    if company.employees.len() > capacity {
        warn!(
            company = company.id,
            employees = company.employees.len(),
            capacity,
            "company reports more employees than its quality allows"
        );
        company.employees.truncate(capacity);
    }
    company
}

#[derive(Clone, Debug)]
pub struct CompanyService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> CompanyService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_company(&self, company_id: u64) -> Result<Option<CompanyProfile>> {
        let raw = self
            .client
            .view("get_company", &[MoveArg::U64(company_id)])
            .await?;
        map_first(&raw, &COMPANIES, map_company)
    }

    pub async fn company(&self, company_id: u64) -> Option<CompanyProfile> {
        or_empty("company::get_company", self.try_company(company_id).await)
    }

    pub async fn try_companies_by_owner(
        &self,
        owner: AccountAddress,
    ) -> Result<Vec<CompanyProfile>> {
        let raw = self
            .client
            .view("get_companies_by_owner", &[MoveArg::Address(owner)])
            .await?;
        map_rows(&raw, &COMPANIES, map_company)
    }

    pub async fn companies_by_owner(&self, owner: AccountAddress) -> Vec<CompanyProfile> {
        or_empty(
            "company::get_companies_by_owner",
            self.try_companies_by_owner(owner).await,
        )
    }

    pub async fn try_companies_in_region(
        &self,
        region_id: u64,
    ) -> Result<Vec<CompanyProfile>> {
        let raw = self
            .client
            .view("get_companies_in_region", &[MoveArg::U64(region_id)])
            .await?;
        map_rows(&raw, &COMPANIES, map_company)
    }

    pub async fn companies_in_region(&self, region_id: u64) -> Vec<CompanyProfile> {
        or_empty(
            "company::get_companies_in_region",
            self.try_companies_in_region(region_id).await,
        )
    }

    pub async fn create(&self, name: &str, company_type: u8, region_id: u64) -> Result<TxHash> {
        ensure_text("company name", name)?;
        ensure_id("region id", region_id)?;
        self.client
            .call(
                "create_company",
                vec![
                    MoveArg::Str(name.trim().to_string()),
                    MoveArg::U8(company_type),
                    MoveArg::U64(region_id),
                ],
            )
            .await
    }

    pub async fn apply_job(&self, company_id: u64) -> Result<TxHash> {
        ensure_id("company id", company_id)?;
        self.client
            .call("apply_job", vec![MoveArg::U64(company_id)])
            .await
    }

    pub async fn leave_job(&self) -> Result<TxHash> {
        self.client.call("leave_job", vec![]).await
    }

    pub async fn produce(&self, company_id: u64) -> Result<TxHash> {
        ensure_id("company id", company_id)?;
        self.client
            .call("produce", vec![MoveArg::U64(company_id)])
            .await
    }

    pub async fn deposit_funds(&self, company_id: u64, amount: u64) -> Result<TxHash> {
        ensure_id("company id", company_id)?;
        ensure_amount("deposit", amount)?;
        self.client
            .call(
                "deposit_funds",
                vec![MoveArg::U64(company_id), MoveArg::U64(amount)],
            )
            .await
    }

    pub async fn withdraw_funds(&self, company_id: u64, amount: u64) -> Result<TxHash> {
        ensure_id("company id", company_id)?;
        ensure_amount("withdrawal", amount)?;
        self.client
            .call(
                "withdraw_funds",
                vec![MoveArg::U64(company_id), MoveArg::U64(amount)],
            )
            .await
    }

    pub async fn upgrade(&self, company_id: u64) -> Result<TxHash> {
        ensure_id("company id", company_id)?;
        self.client
            .call("upgrade_company", vec![MoveArg::U64(company_id)])
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeLedger,
        FakeWallet,
    };
    use serde_json::json;

    #[tokio::test]
    async fn company__caps_employees_at_capacity() {
        // given
        let workers: Vec<String> = (1..=5).map(|n| format!("0x{n}")).collect();
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_company",
            json!({ "result": [{
                "id": "8",
                "name": "Iron Works",
                "type": 2,
                "quality": 1,
                "funds": "1050",
                "employees": workers,
            }]}),
        );
        let service = CompanyService::new(ledger);

        // when
        let company = service.company(8).await.unwrap();

        // then
        assert_eq!(company.name, "Iron Works");
        assert_eq!(company.company_type, 2);
        assert_eq!(company.funds.display, 10.5);
        assert_eq!(company.employees.len(), 3);
    }

    #[tokio::test]
    async fn companies_in_region__empty_on_malformed_payload() {
        let ledger = FakeLedger::new();
        ledger.set_view(MODULE, "get_companies_in_region", json!("nope"));
        let service = CompanyService::new(ledger);
        assert!(service.companies_in_region(1).await.is_empty());
    }

    #[tokio::test]
    async fn deposit_funds__encodes_company_and_amount() {
        // given
        let wallet = FakeWallet::connected(AccountAddress::new([3; 32]));
        let service = CompanyService::new(FakeLedger::with_wallet(wallet.clone()));

        // when
        service.deposit_funds(4, 500).await.unwrap();

        // then
        let descriptor = &wallet.descriptors()[0];
        assert_eq!(descriptor.module_name, "company");
        assert_eq!(descriptor.function_name, "deposit_funds");
        assert_eq!(descriptor.encoded_args[1], 500u64.to_le_bytes().to_vec());
    }
}
