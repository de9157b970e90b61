//! Process entrypoint: loads a characters config, starts the
//! `RuntimeManager`, and serves the control endpoints (spec §4.8, §6).
//! The REST API client, gear optimizer, and catalog data loader are
//! all out of scope (spec §1); the placeholders below are the seams a
//! real deployment plugs into.

use actix_web::{App, HttpServer};
use async_trait::async_trait;
use clap::Parser;
use rt_core::{ActionResult, BankDetails, CharacterState, Clock, GameApi, GameApiError, ItemStack, Position, Slot, SystemClock};
use rt_gear::{GearOptimizer, NoToolCatalog, OptimizeRecord};
use rt_runtime::{GameApiFactory, RuntimeManager};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "retinue", about = "Multi-character automation bot core")]
struct Cli {
    /// Path to the characters config file (spec §6).
    #[arg(long, default_value = "./characters.json")]
    config: std::path::PathBuf,

    /// Address the control HTTP server binds to.
    #[arg(long, default_value = "127.0.0.1:8089")]
    bind: String,
}

/// Stands in for the out-of-scope REST API client: every action
/// returns an error so a misconfigured deployment fails loudly at the
/// first dispatch rather than silently no-opping. Integrators swap
/// this `GameApiFactory` impl for one backed by a real HTTP client.
struct UnimplementedGameApi;

#[async_trait]
impl GameApi for UnimplementedGameApi {
    async fn refresh_character(&self, name: &str) -> Result<CharacterState, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn move_to(&self, name: &str, _pos: Position) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn fight(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn gather(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn craft(&self, name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn equip(&self, name: &str, _item_code: &str, _slot: Slot, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn unequip(&self, name: &str, _slot: Slot) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn withdraw_bank(&self, name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn deposit_bank(&self, name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn withdraw_gold(&self, name: &str, _amount: u64) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn deposit_gold(&self, name: &str, _amount: u64) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn npc_buy(&self, name: &str, _npc_code: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn accept_task(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn complete_task(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn cancel_task(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn task_trade(&self, name: &str, _item_code: &str, _quantity: u32) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn task_exchange(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn buy_bank_expansion(&self, name: &str) -> Result<ActionResult, GameApiError> {
        Err(unimplemented_error(name))
    }
    async fn get_bank_details(&self) -> Result<BankDetails, GameApiError> {
        Err(unimplemented_error("<account>"))
    }
    async fn get_bank_items(&self) -> Result<Vec<ItemStack>, GameApiError> {
        Err(unimplemented_error("<account>"))
    }
}

fn unimplemented_error(name: &str) -> GameApiError {
    GameApiError::new(0, format!("no GameApi client configured for '{name}'; the REST client is out of scope"))
}

struct UnimplementedGameApiFactory;

impl GameApiFactory for UnimplementedGameApiFactory {
    fn api_for(&self, _character_name: &str) -> Arc<dyn GameApi> {
        Arc::new(UnimplementedGameApi)
    }
}

/// No loadout search performed; a real deployment supplies a
/// `GearOptimizer` backed by the actual (out-of-scope) search.
struct UnimplementedGearOptimizer;

#[async_trait]
impl GearOptimizer for UnimplementedGearOptimizer {
    async fn optimize(&self, _char_name: &str, _monster_code: &str, _monster_level: u32) -> Option<OptimizeRecord> {
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    rt_runtime::logging::init_logging().expect("initialize logger");
    log::info!("starting retinue runtime, config={:?}", cli.config);

    // Game-data catalog loading is out of scope (spec §1); a real
    // deployment builds this from the game's item/monster/resource
    // dumps before constructing the manager.
    let catalog = Arc::new(rt_catalog::Catalog::default());
    let optimizer: Arc<dyn GearOptimizer> = Arc::new(UnimplementedGearOptimizer);
    let tools: Arc<dyn rt_gear::ToolCatalog> = Arc::new(NoToolCatalog);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let api_factory: Arc<dyn GameApiFactory> = Arc::new(UnimplementedGameApiFactory);

    let manager = Arc::new(RuntimeManager::new(cli.config, catalog, optimizer, tools, api_factory, clock));
    manager.start().await?;

    let server_manager = manager.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(actix_web::web::Data::new(server_manager.clone()))
            .configure(rt_runtime::control::configure)
    })
    .bind(&cli.bind)?
    .run()
    .await?;

    manager.stop(10_000).await?;
    Ok(())
}
