use super::{
    ModuleClient,
    ensure_id,
};
use crate::{
    encoding::MoveArg,
    error::Result,
    model::{
        Balance,
        CountryData,
        RegionData,
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

pub const MODULE: &str = "territory";

pub static COUNTRY: Schema = Schema {
    name: "country",
    columns: &[
        "id",
        "name",
        "president",
        "treasury",
        "income_tax_bps",
        "import_tax_bps",
        "vat_bps",
        "region_count",
    ],
};

pub static REGIONS: Schema = Schema {
    name: "regions",
    columns: &[
        "id",
        "name",
        "original_owner",
        "occupier",
        "population",
        "resource_category",
    ],
};

pub fn map_country(row: &Row) -> CountryData {
    CountryData {
        id: row.u64(&["id", "country_id"]),
        name: row.text(&["name"]),
        president: row.opt_address(&["president", "leader"]),
        treasury: Balance::game(row.u64(&["treasury", "treasury_balance"])),
        income_tax_bps: row.u64(&["income_tax_bps", "income_tax"]),
        import_tax_bps: row.u64(&["import_tax_bps", "import_tax"]),
        vat_bps: row.u64(&["vat_bps", "vat"]),
        region_count: row.u64(&["region_count", "regions"]),
    }
}

/// A region nobody has taken over is occupied by its original owner.
pub fn map_region(row: &Row) -> RegionData {
    let original_owner = row.u64(&["original_owner", "owner"]);
    RegionData {
        id: row.u64(&["id", "region_id"]),
        name: row.text(&["name"]),
        original_owner,
        occupier: row
            .id(&["occupier", "current_owner"])
            .unwrap_or(original_owner),
        population: row.u64(&["population"]),
        resource_category: row.u8(&["resource_category", "resource"]),
    }
}

#[derive(Clone, Debug)]
pub struct TerritoryService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> TerritoryService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_country(&self, country_id: u64) -> Result<Option<CountryData>> {
        let raw = self
            .client
            .view("get_country", &[MoveArg::U64(country_id)])
            .await?;
        map_first(&raw, &COUNTRY, map_country)
    }

    pub async fn country(&self, country_id: u64) -> Option<CountryData> {
        or_empty("territory::get_country", self.try_country(country_id).await)
    }

    pub async fn try_region(&self, region_id: u64) -> Result<Option<RegionData>> {
        let raw = self
            .client
            .view("get_region", &[MoveArg::U64(region_id)])
            .await?;
        map_first(&raw, &REGIONS, map_region)
    }

    pub async fn region(&self, region_id: u64) -> Option<RegionData> {
        or_empty("territory::get_region", self.try_region(region_id).await)
    }

    pub async fn try_regions_of_country(&self, country_id: u64) -> Result<Vec<RegionData>> {
        let raw = self
            .client
            .view("get_regions_by_country", &[MoveArg::U64(country_id)])
            .await?;
        map_rows(&raw, &REGIONS, map_region)
    }

    pub async fn regions_of_country(&self, country_id: u64) -> Vec<RegionData> {
        or_empty(
            "territory::get_regions_by_country",
            self.try_regions_of_country(country_id).await,
        )
    }

    pub async fn travel(&self, region_id: u64) -> Result<TxHash> {
        ensure_id("region id", region_id)?;
        self.client
            .call("travel", vec![MoveArg::U64(region_id)])
            .await
    }
}
