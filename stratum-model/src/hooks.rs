use crate::EntityRef;
use async_trait::async_trait;

/// Optional lifecycle callbacks for an entity type.
///
/// Hooks run sequentially, in input order, once per entity in a batch. A
/// hook error aborts the remaining entities of that batch.
///
/// Bookkeeping the lifecycle always performs (clearing the "new" flag and
/// the change-tracking baseline after a save) happens before `after_save`
/// is invoked, so hooks observe the saved state.
#[async_trait]
pub trait EntityHooks: Send + Sync {
    async fn before_save(&self, entity: &EntityRef) -> anyhow::Result<()> {
        let _ = entity;
        Ok(())
    }

    async fn after_save(&self, entity: &EntityRef) -> anyhow::Result<()> {
        let _ = entity;
        Ok(())
    }

    async fn before_delete(&self, entity: &EntityRef) -> anyhow::Result<()> {
        let _ = entity;
        Ok(())
    }

    async fn after_delete(&self, entity: &EntityRef) -> anyhow::Result<()> {
        let _ = entity;
        Ok(())
    }

    /// Called after an entity's attributes were loaded or found.
    async fn after_load(&self, entity: &EntityRef) -> anyhow::Result<()> {
        let _ = entity;
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}
