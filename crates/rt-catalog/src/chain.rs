//! Recipe-chain resolution: turning "I need N of `item_code`" into a
//! finite, ordered sequence of `PlanStep`s a skill rotation can work
//! through one step at a time.
//!
//! A chain is a restartable walk over a fixed structure (here, the
//! catalog's craft graph) rather than a mutable in-place plan.
//! Resolving the same request twice always yields the same steps, so
//! a rotation can drop a partially-worked chain and rebuild it from
//! scratch without bookkeeping.

use crate::Catalog;
use rt_core::PlanStep;

/// Resolves the production chain for `quantity` of `item_code`, deepest
/// dependency first, ending with the requested item itself.
///
/// Each craftable item contributes one `Craft` step preceded by the
/// resolved chain for each of its materials (scaled to the quantity
/// needed); a raw item contributes a single `Gather`, `Fight`, or `Bank`
/// leaf depending on how the catalog says it's obtained. The catalog's
/// craft graph is assumed acyclic (spec glossary "production plan": a
/// finite sequence), so no cycle guard is needed.
pub fn resolve_chain(catalog: &Catalog, item_code: &str, quantity: u32) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    resolve_into(catalog, item_code, quantity, &mut steps);
    steps
}

fn resolve_into(catalog: &Catalog, item_code: &str, quantity: u32, steps: &mut Vec<PlanStep>) {
    if quantity == 0 {
        return;
    }
    let Some(item) = catalog.item(item_code) else {
        // Unknown item: nothing more we can say about its origin.
        steps.push(PlanStep::Bank {
            item_code: item_code.to_string(),
            quantity,
        });
        return;
    };

    if let Some(recipe) = &item.craft {
        let crafts_needed = div_ceil(quantity, recipe.quantity.max(1));
        for material in &recipe.materials {
            let needed = material.quantity * crafts_needed;
            resolve_into(catalog, &material.code, needed, steps);
        }
        steps.push(PlanStep::Craft {
            item_code: item_code.to_string(),
            recipe_code: item_code.to_string(),
            quantity: crafts_needed * recipe.quantity,
        });
        return;
    }

    match &item.obtained {
        crate::Obtained::Resource(resource_code) => steps.push(PlanStep::Gather {
            item_code: item_code.to_string(),
            resource_code: resource_code.clone(),
            quantity,
        }),
        crate::Obtained::Monster(monster_code) => steps.push(PlanStep::Fight {
            item_code: item_code.to_string(),
            monster_code: monster_code.clone(),
            quantity,
        }),
        crate::Obtained::None => steps.push(PlanStep::Bank {
            item_code: item_code.to_string(),
            quantity,
        }),
    }
}

fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Item, Obtained, Recipe, Resource};
    use rt_core::{ItemStack, Skill};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Item {
                    code: "copper_ore".into(),
                    name: "Copper Ore".into(),
                    level: 1,
                    equip_slot: None,
                    craft: None,
                    obtained: Obtained::Resource("copper_rocks".into()),
                },
                Item {
                    code: "copper".into(),
                    name: "Copper".into(),
                    level: 1,
                    equip_slot: None,
                    craft: Some(Recipe {
                        skill: Skill::Mining,
                        level: 1,
                        quantity: 1,
                        materials: vec![ItemStack {
                            code: "copper_ore".into(),
                            quantity: 8,
                        }],
                    }),
                    obtained: Obtained::None,
                },
                Item {
                    code: "copper_dagger".into(),
                    name: "Copper Dagger".into(),
                    level: 1,
                    equip_slot: Some(rt_core::Slot::Weapon),
                    craft: Some(Recipe {
                        skill: Skill::Weaponcrafting,
                        level: 1,
                        quantity: 1,
                        materials: vec![ItemStack {
                            code: "copper".into(),
                            quantity: 6,
                        }],
                    }),
                    obtained: Obtained::None,
                },
            ],
            vec![],
            vec![Resource {
                code: "copper_rocks".into(),
                level: 1,
                skill: Skill::Mining,
                drops: vec!["copper_ore".into()],
            }],
            vec![],
        )
    }

    #[test]
    fn single_level_recipe_gathers_then_crafts() {
        let steps = resolve_chain(&catalog(), "copper", 2);
        assert_eq!(
            steps,
            vec![
                PlanStep::Gather {
                    item_code: "copper_ore".into(),
                    resource_code: "copper_rocks".into(),
                    quantity: 16,
                },
                PlanStep::Craft {
                    item_code: "copper".into(),
                    recipe_code: "copper".into(),
                    quantity: 2,
                },
            ]
        );
    }

    #[test]
    fn nested_recipe_resolves_full_depth_in_order() {
        let steps = resolve_chain(&catalog(), "copper_dagger", 1);
        assert_eq!(
            steps,
            vec![
                PlanStep::Gather {
                    item_code: "copper_ore".into(),
                    resource_code: "copper_rocks".into(),
                    quantity: 48,
                },
                PlanStep::Craft {
                    item_code: "copper".into(),
                    recipe_code: "copper".into(),
                    quantity: 6,
                },
                PlanStep::Craft {
                    item_code: "copper_dagger".into(),
                    recipe_code: "copper_dagger".into(),
                    quantity: 1,
                },
            ]
        );
    }

    #[test]
    fn unknown_item_falls_back_to_bank_leaf() {
        let steps = resolve_chain(&catalog(), "tasks_coin", 3);
        assert_eq!(
            steps,
            vec![PlanStep::Bank {
                item_code: "tasks_coin".into(),
                quantity: 3,
            }]
        );
    }

    #[test]
    fn resolving_twice_is_deterministic() {
        let cat = catalog();
        assert_eq!(
            resolve_chain(&cat, "copper_dagger", 1),
            resolve_chain(&cat, "copper_dagger", 1)
        );
    }
}
