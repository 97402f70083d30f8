//! A house persisted under a data directory.

use crate::chain::LocalChain;
use crate::config::HouseConfig;
use crate::error::{HouseError, Result};
use crate::events::EmittedEvent;
use crate::house::House;
use crate::oracle::{BlockHashEntropy, EntropyOracle};
use crate::payments::{PaymentLog, Transfer};
use crate::storage::{HouseStore, Storage};
use crate::types::{Address, CallContext};
use chrono::Utc;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const DB_FILE: &str = "house.db";

pub struct HouseManager {
    data_dir: PathBuf,
    storage: Storage,
    house: House,
    chain: LocalChain,
}

impl HouseManager {
    /// Creates a new, empty house in `data_dir`.
    pub async fn create(data_dir: &Path, config: HouseConfig) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(HouseError::config(format!(
                "House already initialized at {}",
                data_dir.display()
            )));
        }
        config.validate()?;

        let storage = Storage::new(&data_dir.join(DB_FILE)).await?;
        let house = House::new(config.clone())?;
        let chain = LocalChain::genesis(Utc::now());
        HouseStore::new(&storage)
            .save(&house, &chain, &[], &[])
            .await?;
        config.save(&config_path)?;

        tracing::info!(
            "Created house owned by {} in {}",
            config.owner,
            data_dir.display()
        );
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            storage,
            house,
            chain,
        })
    }

    pub async fn open(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(HouseError::config(format!(
                "No house found at {}",
                data_dir.display()
            )));
        }
        let config = HouseConfig::load(&config_path)?;

        let storage = Storage::new(&data_dir.join(DB_FILE)).await?;
        let store = HouseStore::new(&storage);
        let state = store
            .load_state(config.history_capacity)
            .await?
            .ok_or_else(|| HouseError::config("House database is empty"))?;
        let chain = store
            .load_chain()
            .await?
            .unwrap_or_else(|| LocalChain::genesis(Utc::now()));

        let house = House::restore(
            config,
            state,
            Box::new(EntropyOracle::new(BlockHashEntropy)),
            PaymentLog::new(),
        )?;

        tracing::debug!(
            "Opened house at block {} with {} games",
            chain.height(),
            house.total_games()
        );
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            storage,
            house,
            chain,
        })
    }

    /// Runs one operation by `caller` in the next block and persists the result.
    /// A failed operation, or one that cannot be saved, advances nothing and
    /// writes nothing.
    pub async fn execute<R>(
        &mut self,
        caller: &Address,
        op: impl FnOnce(&mut House, &CallContext) -> Result<R>,
    ) -> Result<R> {
        let mut chain = self.chain.clone();
        let ctx = CallContext::new(caller.clone(), chain.next_block(Utc::now()));
        let snapshot = self.house.snapshot();

        let result = op(&mut self.house, &ctx)?;

        let events = self.house.drain_events();
        let transfers = self.house.payments_mut().drain();
        if let Err(e) = HouseStore::new(&self.storage)
            .save(&self.house, &chain, &events, &transfers)
            .await
        {
            tracing::error!(
                "Failed to save block {}, rolling back: {}",
                ctx.block.height,
                e
            );
            self.house.rollback(snapshot);
            return Err(e);
        }
        self.chain = chain;

        Ok(result)
    }

    pub fn house(&self) -> &House {
        &self.house
    }

    pub fn chain(&self) -> &LocalChain {
        &self.chain
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<EmittedEvent>> {
        HouseStore::new(&self.storage).recent_events(limit).await
    }

    pub async fn transfers_to(&self, recipient: &Address) -> Result<Vec<Transfer>> {
        HouseStore::new(&self.storage).transfers_to(recipient).await
    }
}

impl std::fmt::Debug for HouseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HouseManager")
            .field("data_dir", &self.data_dir)
            .field("height", &self.chain.height())
            .field("house", &self.house)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_move, generate_salt};
    use crate::game::Move;
    use crate::types::Amount;
    use tempfile::tempdir;

    fn addr(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        HouseManager::create(dir.path(), HouseConfig::new(addr(0xff)))
            .await
            .unwrap();
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("house.db").exists());

        let err = HouseManager::create(dir.path(), HouseConfig::new(addr(0xff)))
            .await
            .unwrap_err();
        assert!(matches!(err, HouseError::Config(_)));
    }

    #[tokio::test]
    async fn test_open_missing_house() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            HouseManager::open(dir.path()).await,
            Err(HouseError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_operations_survive_reopen() {
        let dir = tempdir().unwrap();
        let owner = addr(0xff);
        let player = addr(1);

        {
            let mut manager = HouseManager::create(dir.path(), HouseConfig::new(owner.clone()))
                .await
                .unwrap();
            manager
                .execute(&owner, |house, ctx| house.deposit(ctx, Amount::from_whole(10)))
                .await
                .unwrap();
            manager
                .execute(&player, |house, ctx| {
                    house.commit_move(
                        ctx,
                        commit_move(Move::Rock, &generate_salt()),
                        Amount::from_whole(1),
                    )
                })
                .await
                .unwrap();
            assert_eq!(manager.chain().height(), 2);
        }

        let mut manager = HouseManager::open(dir.path()).await.unwrap();
        assert_eq!(manager.chain().height(), 2);
        assert!(manager.house().current_game(&player).is_some());
        assert_eq!(
            manager.house().reserved_house_liquidity(),
            Amount::from_whole(2)
        );

        // rejected operations leave the chain where it was
        let err = manager
            .execute(&player, |house, ctx| house.withdraw(ctx, Amount::from_whole(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, HouseError::NotOwner));
        assert_eq!(manager.chain().height(), 2);

        let game = manager
            .execute(&player, |house, ctx| house.forfeit_current_game(ctx))
            .await
            .unwrap();
        assert_eq!(game.reveal_block, 3);
        assert_eq!(manager.recent_events(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unsaved_operation_is_rolled_back() {
        let dir = tempdir().unwrap();
        let owner = addr(0xff);
        let player = addr(1);

        let mut manager = HouseManager::create(dir.path(), HouseConfig::new(owner.clone()))
            .await
            .unwrap();
        manager
            .execute(&owner, |house, ctx| house.deposit(ctx, Amount::from_whole(10)))
            .await
            .unwrap();
        let stats = manager.house().stats();

        manager
            .storage
            .get_connection()
            .await
            .execute("DROP TABLE events", [])
            .unwrap();

        let err = manager
            .execute(&player, |house, ctx| {
                house.commit_move(
                    ctx,
                    commit_move(Move::Rock, &generate_salt()),
                    Amount::from_whole(1),
                )
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HouseError::Storage(_)));
        assert_eq!(manager.chain().height(), 1);
        assert_eq!(manager.house().stats(), stats);
        assert!(manager.house().current_game(&player).is_none());

        let err = manager
            .execute(&owner, |house, ctx| house.deposit(ctx, Amount::from_whole(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, HouseError::Storage(_)));
        assert_eq!(manager.house().house_balance(), Amount::from_whole(10));
        drop(manager);

        // nothing from the failed calls reached the database either
        let manager = HouseManager::open(dir.path()).await.unwrap();
        assert_eq!(manager.chain().height(), 1);
        assert_eq!(manager.house().stats(), stats);
        assert!(manager.house().current_game(&player).is_none());
        assert_eq!(manager.house().total_games(), 0);
    }
}
