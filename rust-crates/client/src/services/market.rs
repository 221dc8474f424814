use super::{
    ModuleClient,
    ensure_amount,
    ensure_id,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::{
        ListedItem,
        MarketListing,
        derived_item_id,
    },
    normalize::{
        Row,
        Schema,
        map_rows,
        or_empty,
    },
    transport::{
        Transport,
        TxHash,
    },
};

pub const MODULE: &str = "market";

pub static LISTINGS: Schema = Schema {
    name: "listings",
    columns: &[
        "id",
        "seller",
        "item_type",
        "quantity",
        "price_per_unit",
        "country_id",
        "created_at",
    ],
};

fn map_listed_item(row: &Row) -> ListedItem {
    let category = row.u8(&["category", "item_category"]);
    let quality = row.quality(&["quality"]);
    ListedItem {
        item_id: row
            .id(&["item_id"])
            .unwrap_or_else(|| derived_item_id(category, quality)),
        category,
        quality,
    }
}

/// The listed item arrives either nested under `item_type` or flattened
/// into the listing itself.
pub fn map_listing(row: &Row) -> MarketListing {
    let item = row
        .nested(&["item_type", "item"])
        .map(|nested| map_listed_item(&nested))
        .unwrap_or_else(|| map_listed_item(row));
    MarketListing {
        id: row.u64(&["id", "listing_id"]),
        seller: row.address(&["seller", "owner"]),
        item,
        quantity: row.u64(&["quantity", "amount"]),
        price_per_unit_atomic: row.u64(&["price_per_unit", "price", "unit_price"]),
        country_id: row.u64(&["country_id", "country"]),
        created_at: row.u64(&["created_at", "timestamp"]),
    }
}

/// Argument checks run before a listing call is built.
pub fn validate_listing(item_id: u64, quantity: u64, price_per_unit: u64) -> Result<()> {
    ensure_id("item id", item_id)?;
    ensure_amount("quantity", quantity)?;
    ensure_amount("price per unit", price_per_unit)
}

pub fn validate_purchase(listing_id: u64, quantity: u64) -> Result<()> {
    ensure_id("listing id", listing_id)?;
    ensure_amount("quantity", quantity)
}

#[derive(Clone, Debug)]
pub struct MarketService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> MarketService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_listings(&self, country_id: u64) -> Result<Vec<MarketListing>> {
        let raw = self
            .client
            .view("get_listings", &[MoveArg::U64(country_id)])
            .await?;
        let mut listings = map_rows(&raw, &LISTINGS, map_listing)?;
        listings.retain(|listing| listing.quantity > 0);
        Ok(listings)
    }

    pub async fn listings(&self, country_id: u64) -> Vec<MarketListing> {
        or_empty("market::get_listings", self.try_listings(country_id).await)
    }

    pub async fn try_listings_by_seller(
        &self,
        seller: AccountAddress,
    ) -> Result<Vec<MarketListing>> {
        let raw = self
            .client
            .view("get_listings_by_seller", &[MoveArg::Address(seller)])
            .await?;
        map_rows(&raw, &LISTINGS, map_listing)
    }

    pub async fn listings_by_seller(&self, seller: AccountAddress) -> Vec<MarketListing> {
        or_empty(
            "market::get_listings_by_seller",
            self.try_listings_by_seller(seller).await,
        )
    }

    pub async fn create_listing(
        &self,
        item_id: u64,
        quantity: u64,
        price_per_unit: u64,
    ) -> Result<TxHash> {
        validate_listing(item_id, quantity, price_per_unit)?;
        self.client
            .call(
                "create_listing",
                vec![
                    MoveArg::U64(item_id),
                    MoveArg::U64(quantity),
                    MoveArg::U64(price_per_unit),
                ],
            )
            .await
    }

    pub async fn buy_listing(&self, listing_id: u64, quantity: u64) -> Result<TxHash> {
        validate_purchase(listing_id, quantity)?;
        self.client
            .call(
                "buy_listing",
                vec![MoveArg::U64(listing_id), MoveArg::U64(quantity)],
            )
            .await
    }

    pub async fn cancel_listing(&self, listing_id: u64) -> Result<TxHash> {
        ensure_id("listing id", listing_id)?;
        self.client
            .call("cancel_listing", vec![MoveArg::U64(listing_id)])
            .await
    }
}
