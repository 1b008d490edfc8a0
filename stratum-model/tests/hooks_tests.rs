use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use stratum_model::{AttributeOptions, Entity, EntityHooks, EntityRef, EntityType, NoHooks};

struct Recorder(Mutex<Vec<String>>);

#[async_trait]
impl EntityHooks for Recorder {
    async fn before_save(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(format!("before_save {entity}"));
        Ok(())
    }

    async fn after_load(&self, entity: &EntityRef) -> anyhow::Result<()> {
        anyhow::ensure!(!entity.is_new(), "{entity} was never stored");
        self.0.lock().unwrap().push(format!("after_load {entity}"));
        Ok(())
    }
}

#[tokio::test]
async fn default_hooks_do_nothing() {
    let movie_type = EntityType::document("Movie").build().unwrap();
    let movie = Entity::new(&movie_type);

    assert!(movie_type.hooks().before_save(&movie).await.is_ok());
    assert!(NoHooks.after_delete(&movie).await.is_ok());
}

#[tokio::test]
async fn type_hooks_are_overridable() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let movie_type = EntityType::document("Movie")
        .attribute("title", AttributeOptions::new())
        .hooks(recorder.clone())
        .build()
        .unwrap();
    let movie = Entity::new(&movie_type);

    movie_type.hooks().before_save(&movie).await.unwrap();
    assert!(movie_type.hooks().after_load(&movie).await.is_err());
    movie_type.hooks().after_save(&movie).await.unwrap();

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![format!("before_save {movie}")]
    );
}
