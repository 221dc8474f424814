use super::{
    ModuleClient,
    ensure_address,
    ensure_amount,
    ensure_id,
};
use crate::{
    address::AccountAddress,
    encoding::MoveArg,
    error::Result,
    model::{
        InventoryItem,
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

pub const MODULE: &str = "inventory";

pub static ITEMS: Schema = Schema {
    name: "inventory",
    columns: &["item_id", "category", "quality", "quantity"],
};

pub fn map_item(row: &Row) -> InventoryItem {
    let category = row.u8(&["category", "item_category", "kind"]);
    let quality = row.quality(&["quality", "q"]);
    let item_id = row
        .id(&["item_id", "id"])
        .unwrap_or_else(|| derived_item_id(category, quality));
    InventoryItem {
        item_id,
        category,
        quality,
        quantity: row.u64(&["quantity", "amount", "qty"]),
    }
}

#[derive(Clone, Debug)]
pub struct InventoryService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> InventoryService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    /// Items with quantity zero are dropped.
    pub async fn try_items(&self, owner: AccountAddress) -> Result<Vec<InventoryItem>> {
        let raw = self
            .client
            .view("get_inventory", &[MoveArg::Address(owner)])
            .await?;
        let mut items = map_rows(&raw, &ITEMS, map_item)?;
        items.retain(|item| item.quantity > 0);
        Ok(items)
    }

    pub async fn items(&self, owner: AccountAddress) -> Vec<InventoryItem> {
        or_empty("inventory::get_inventory", self.try_items(owner).await)
    }

    pub async fn transfer_item(
        &self,
        to: AccountAddress,
        item_id: u64,
        quantity: u64,
    ) -> Result<TxHash> {
        ensure_address("recipient", &to)?;
        ensure_id("item id", item_id)?;
        ensure_amount("quantity", quantity)?;
        self.client
            .call(
                "transfer_item",
                vec![
                    MoveArg::Address(to),
                    MoveArg::U64(item_id),
                    MoveArg::U64(quantity),
                ],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeLedger;
    use serde_json::json;

    #[tokio::test]
    async fn items__drops_empty_stacks_and_derives_ids() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_inventory",
            json!([[0, 0, 31], [2, 1, 3], [9, 3, 1], [4, 0, 6]]),
        );
        let service = InventoryService::new(ledger);

        // when
        let items = service.items(AccountAddress::new([1; 32])).await;

        // then
        assert_eq!(
            items,
            vec![
                InventoryItem {
                    item_id: 25,
                    category: 2,
                    quality: 5,
                    quantity: 4,
                },
                InventoryItem {
                    item_id: 31,
                    category: 3,
                    quality: 1,
                    quantity: 6,
                },
            ]
        );
    }

    #[tokio::test]
    async fn transfer_item__rejects_zero_quantity() {
        let service = InventoryService::new(FakeLedger::new());
        let result = service
            .transfer_item(AccountAddress::new([2; 32]), 12, 0)
            .await;
        assert!(result.is_err());
    }
}
