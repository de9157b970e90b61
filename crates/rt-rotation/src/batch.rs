//! Craft batch sizing (spec §4.4 "Batch size").

use rt_core::inventory_reserve;

/// `batchSize = min(goalRemaining, floor(usableSpace / materialsPerCraft))`,
/// `usableSpace = inventoryCapacity - inventoryCount - reserve`.
pub fn batch_size(
    goal_remaining: u32,
    inventory_capacity: u32,
    inventory_count: u32,
    materials_per_craft: u32,
) -> u32 {
    if materials_per_craft == 0 {
        return 0;
    }
    let reserve = inventory_reserve(inventory_capacity);
    let usable = inventory_capacity
        .saturating_sub(inventory_count)
        .saturating_sub(reserve);
    goal_remaining.min(usable / materials_per_craft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_spec_example() {
        assert_eq!(batch_size(100, 20, 0, 3), 4);
    }

    #[test]
    fn goal_remaining_can_be_the_binding_constraint() {
        assert_eq!(batch_size(2, 20, 0, 3), 2);
    }

    #[test]
    fn zero_usable_space_yields_zero_batch() {
        assert_eq!(batch_size(100, 20, 20, 3), 0);
    }
}
