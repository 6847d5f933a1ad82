//! Purchasable items and player inventories.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::{fixed_serde, Fixed};
use crate::stats::{stat_block, AllStats, ItemStats};

/// Integer stat bonus as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBonus {
    /// Added maximum health.
    pub max_health: i32,
    /// Added armor.
    pub armor: i32,
    /// Added magic resist.
    pub magic_resist: i32,
    /// Added physical damage.
    pub physical: i32,
    /// Added magic damage.
    pub magic: i32,
    /// Added move speed.
    pub move_speed: i32,
}

impl StatBonus {
    /// Convert into a stat layer.
    #[must_use]
    pub fn to_stats(self) -> AllStats {
        stat_block(
            self.max_health,
            self.armor,
            self.magic_resist,
            self.physical,
            self.magic,
            self.move_speed,
        )
    }
}

/// Catalog entry for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Unique item name.
    pub name: String,
    /// Price in gold before dependency discounts.
    pub cost: u32,
    /// Items consumed (and discounted) when this one is bought.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Stat bonus while held.
    #[serde(default)]
    pub bonus: StatBonus,
}

impl ItemDef {
    fn simple(name: &str, cost: u32, bonus: StatBonus) -> Self {
        Self {
            name: name.to_string(),
            cost,
            dependencies: Vec::new(),
            bonus,
        }
    }

    /// Built-in item list.
    #[must_use]
    pub fn default_catalog() -> Vec<Self> {
        vec![
            Self::simple(
                "Sword",
                350,
                StatBonus {
                    physical: 15,
                    ..StatBonus::default()
                },
            ),
            Self::simple(
                "Shield",
                350,
                StatBonus {
                    armor: 15,
                    ..StatBonus::default()
                },
            ),
            Self::simple(
                "Staff",
                350,
                StatBonus {
                    magic: 10,
                    ..StatBonus::default()
                },
            ),
            Self::simple(
                "Mega",
                10,
                StatBonus {
                    max_health: 1000,
                    physical: 1000,
                    ..StatBonus::default()
                },
            ),
        ]
    }
}

/// Look up an item by name.
pub fn find_item<'a>(catalog: &'a [ItemDef], name: &str) -> Result<&'a ItemDef> {
    catalog
        .iter()
        .find(|item| item.name == name)
        .ok_or_else(|| SimError::UnknownItem(name.to_string()))
}

/// Gold and held items of one player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Spendable gold.
    #[serde(with = "fixed_serde")]
    pub gold: Fixed,
    items: Vec<String>,
}

/// What a purchase would cost and consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasePlan {
    /// Gold charged.
    pub price: Fixed,
    /// Indices into the held item list consumed by the purchase.
    pub consumed: Vec<usize>,
}

impl Inventory {
    /// Held item names in purchase order.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Work out price and consumed dependencies for buying `item`.
    ///
    /// Each listed dependency consumes at most one matching held item; owned
    /// dependencies free their slot and discount their cost.
    pub fn plan_purchase(
        &self,
        item: &ItemDef,
        catalog: &[ItemDef],
        capacity: usize,
    ) -> Result<PurchasePlan> {
        let mut consumed: Vec<usize> = Vec::new();
        let mut discount = 0_u32;
        for dep in &item.dependencies {
            let owned = self
                .items
                .iter()
                .enumerate()
                .find(|(idx, name)| *name == dep && !consumed.contains(idx));
            if let Some((idx, _)) = owned {
                consumed.push(idx);
                discount += find_item(catalog, dep)?.cost;
            }
        }

        let held_after = self.items.len() - consumed.len();
        if held_after >= capacity {
            return Err(SimError::InventoryFull {
                held: self.items.len(),
                capacity,
            });
        }

        let price = Fixed::from_num(item.cost.saturating_sub(discount));
        if price > self.gold {
            return Err(SimError::InsufficientGold {
                required: price,
                available: self.gold,
            });
        }

        consumed.sort_unstable();
        Ok(PurchasePlan { price, consumed })
    }

    /// Apply a validated plan.
    pub fn commit(&mut self, item: &ItemDef, plan: PurchasePlan) {
        for idx in plan.consumed.into_iter().rev() {
            self.items.remove(idx);
        }
        self.gold -= plan.price;
        self.items.push(item.name.clone());
    }

    /// Combined stat bonus of held items. Names missing from the catalog contribute nothing.
    #[must_use]
    pub fn item_stats(&self, catalog: &[ItemDef]) -> ItemStats {
        let bonuses: Vec<AllStats> = self
            .items
            .iter()
            .filter_map(|name| find_item(catalog, name).ok())
            .map(|def| def.bonus.to_stats())
            .collect();
        ItemStats::from_bonuses(&bonuses)
    }
}
