//! Suspending facade over `Repository`.
//!
//! Each call moves onto tokio's blocking pool. A handle owns its session and
//! every operation borrows it exclusively, so a unit of work is never shared
//! between concurrent tasks; concurrent callers open one handle each.
//! Dropping a returned future abandons the wait; the engine call still runs
//! to the end.

use crate::model::entity::Entity;
use crate::model::key::KeyValue;
use crate::query::options::QueryOptions;
use crate::query::predicate::Predicate;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::repository::Repository;
use std::sync::{Arc, Mutex};

/// Suspending handle over one owned `Repository`.
pub struct AsyncRepository {
    inner: Arc<Mutex<Repository>>,
}

impl AsyncRepository {
    pub fn new(repository: Repository) -> Self {
        Self {
            inner: Arc::new(Mutex::new(repository)),
        }
    }

    /// Runs `op` against the session on the blocking pool.
    pub async fn run<T, F>(&mut self, op: F) -> RepoResult<T>
    where
        F: FnOnce(&mut Repository) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut repository = inner
                .lock()
                .map_err(|_| RepoError::Session("repository lock poisoned".to_string()))?;
            op(&mut repository)
        })
        .await
        .map_err(|err| RepoError::Session(format!("blocking task failed: {err}")))?
    }

    /// Inserts `entity` and returns it with its audit stamps filled.
    pub async fn add<E: Entity + Send>(&mut self, mut entity: E) -> RepoResult<E> {
        self.run(move |repo| repo.add(&mut entity).map(|()| entity))
            .await
    }

    pub async fn add_range<E: Entity + Send>(
        &mut self,
        mut entities: Vec<E>,
    ) -> RepoResult<Vec<E>> {
        self.run(move |repo| repo.add_range(&mut entities).map(|()| entities))
            .await
    }

    pub async fn update<E: Entity + Send>(&mut self, mut entity: E) -> RepoResult<E> {
        self.run(move |repo| repo.update(&mut entity).map(|()| entity))
            .await
    }

    pub async fn update_range<E: Entity + Send>(
        &mut self,
        mut entities: Vec<E>,
    ) -> RepoResult<Vec<E>> {
        self.run(move |repo| repo.update_range(&mut entities).map(|()| entities))
            .await
    }

    pub async fn replace<E: Entity + Send>(&mut self, mut entity: E) -> RepoResult<E> {
        self.run(move |repo| repo.replace(&mut entity).map(|()| entity))
            .await
    }

    pub async fn replace_range<E: Entity + Send>(
        &mut self,
        mut entities: Vec<E>,
    ) -> RepoResult<Vec<E>> {
        self.run(move |repo| repo.replace_range(&mut entities).map(|()| entities))
            .await
    }

    pub async fn soft_delete<E: Entity + Send>(&mut self, mut entity: E) -> RepoResult<E> {
        self.run(move |repo| repo.soft_delete(&mut entity).map(|()| entity))
            .await
    }

    pub async fn soft_delete_by_id<E: Entity + Send>(
        &mut self,
        id: impl Into<KeyValue>,
    ) -> RepoResult<E> {
        let id = id.into();
        self.run(move |repo| repo.soft_delete_by_id::<E>(id)).await
    }

    pub async fn hard_delete<E: Entity + Send>(&mut self, entity: E) -> RepoResult<()> {
        self.run(move |repo| repo.hard_delete(&entity)).await
    }

    pub async fn hard_delete_by_id<E: Entity>(
        &mut self,
        id: impl Into<KeyValue>,
    ) -> RepoResult<()> {
        let id = id.into();
        self.run(move |repo| repo.hard_delete_by_id::<E>(id)).await
    }

    pub async fn find_by_id<E: Entity + Send>(
        &mut self,
        id: impl Into<KeyValue>,
        options: QueryOptions,
    ) -> RepoResult<Option<E>> {
        let id = id.into();
        self.run(move |repo| repo.find_by_id::<E>(id, &options))
            .await
    }

    pub async fn get_by_id<E: Entity + Send>(
        &mut self,
        id: impl Into<KeyValue>,
        options: QueryOptions,
    ) -> RepoResult<E> {
        let id = id.into();
        self.run(move |repo| repo.get_by_id::<E>(id, &options))
            .await
    }

    pub async fn find_by_id_projected<E, P, F>(
        &mut self,
        id: impl Into<KeyValue>,
        options: QueryOptions,
        project: F,
    ) -> RepoResult<Option<P>>
    where
        E: Entity,
        P: Send + 'static,
        F: FnOnce(E) -> P + Send + 'static,
    {
        let id = id.into();
        self.run(move |repo| repo.find_by_id_projected::<E, P>(id, &options, project))
            .await
    }

    pub async fn query<E: Entity + Send>(&mut self, options: QueryOptions) -> RepoResult<Vec<E>> {
        self.run(move |repo| repo.query::<E>(&options)).await
    }

    pub async fn query_projected<E, P, F>(
        &mut self,
        options: QueryOptions,
        project: F,
    ) -> RepoResult<Vec<P>>
    where
        E: Entity,
        P: Send + 'static,
        F: FnMut(E) -> P + Send + 'static,
    {
        self.run(move |repo| repo.query_projected::<E, P>(&options, project))
            .await
    }

    pub async fn find_first<E: Entity + Send>(
        &mut self,
        options: QueryOptions,
    ) -> RepoResult<Option<E>> {
        self.run(move |repo| repo.find_first::<E>(&options)).await
    }

    pub async fn any<E: Entity>(&mut self, options: QueryOptions) -> RepoResult<bool> {
        self.run(move |repo| repo.any::<E>(&options)).await
    }

    pub async fn count<E: Entity>(&mut self, options: QueryOptions) -> RepoResult<u64> {
        self.run(move |repo| repo.count::<E>(&options)).await
    }

    pub async fn key_predicate<E: Entity>(
        &mut self,
        id: impl Into<KeyValue>,
    ) -> RepoResult<Predicate> {
        let id = id.into();
        self.run(move |repo| repo.key_predicate::<E>(id)).await
    }

    pub async fn commit(&mut self) -> RepoResult<()> {
        self.run(|repo| repo.commit()).await
    }

    pub async fn rollback(&mut self) -> RepoResult<()> {
        self.run(|repo| repo.rollback()).await
    }
}
