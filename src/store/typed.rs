use crate::model::{Filter, Record, Row};
use crate::store::traits::{RecordStore, RelationStore};
use anyhow::Result;
use std::fmt;
use std::marker::PhantomData;

pub async fn find_one<T: Record, S: RecordStore + ?Sized>(
    store: &S,
    filter: &Filter,
) -> Result<Option<T>> {
    store
        .find_one(T::ENTITY, filter)
        .await?
        .map(T::from_row)
        .transpose()
}

pub async fn find_all<T: Record, S: RecordStore + ?Sized>(
    store: &S,
    filter: &Filter,
) -> Result<Vec<T>> {
    store
        .find_all(T::ENTITY, filter)
        .await?
        .into_iter()
        .map(T::from_row)
        .collect()
}

pub async fn count<T: Record, S: RecordStore + ?Sized>(store: &S, filter: &Filter) -> Result<i64> {
    store.count(T::ENTITY, filter).await
}

pub async fn create<T: Record, S: RecordStore + ?Sized>(store: &S, values: Row) -> Result<T> {
    T::from_row(store.create(T::ENTITY, values).await?)
}

/// Typed find-or-create; the flag is true when the record was created
pub async fn find_or_create<T: Record, S: RecordStore + ?Sized>(
    store: &S,
    key: Row,
    defaults: Row,
) -> Result<(T, bool)> {
    let (row, created) = store.find_or_create(T::ENTITY, key, defaults).await?;
    Ok((T::from_row(row)?, created))
}

/// Typed handle on a declared relationship from `S` records to `T` records,
/// exposing the same get/add/count/has accessors for every relationship kind.
pub struct Relation<S, T> {
    name: &'static str,
    _records: PhantomData<fn() -> (S, T)>,
}

impl<S, T> Relation<S, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _records: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S, T> Clone for Relation<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for Relation<S, T> {}

impl<S, T> fmt::Debug for Relation<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Relation").field(&self.name).finish()
    }
}

impl<S: Record, T: Record> Relation<S, T> {
    pub async fn get<St: RelationStore + ?Sized>(&self, store: &St, source: &S) -> Result<Vec<T>> {
        store
            .get_related(self.name, source.id())
            .await?
            .into_iter()
            .map(T::from_row)
            .collect()
    }

    /// The related record of a singular relationship (belongs-to, has-one)
    pub async fn get_one<St: RelationStore + ?Sized>(
        &self,
        store: &St,
        source: &S,
    ) -> Result<Option<T>> {
        Ok(self.get(store, source).await?.into_iter().next())
    }

    pub async fn add<St: RelationStore + ?Sized>(
        &self,
        store: &St,
        source: &S,
        target: &T,
    ) -> Result<()> {
        store.add_related(self.name, source.id(), target.id()).await
    }

    pub async fn add_all<St: RelationStore + ?Sized>(
        &self,
        store: &St,
        source: &S,
        targets: &[T],
    ) -> Result<()> {
        for target in targets {
            self.add(store, source, target).await?;
        }
        Ok(())
    }

    pub async fn count<St: RelationStore + ?Sized>(&self, store: &St, source: &S) -> Result<i64> {
        store.count_related(self.name, source.id()).await
    }

    pub async fn has<St: RelationStore + ?Sized>(
        &self,
        store: &St,
        source: &S,
        target: &T,
    ) -> Result<bool> {
        store.has_related(self.name, source.id(), target.id()).await
    }

    /// Eager fetch: the first source matching `filter` with its related records
    pub async fn find_with<St: RelationStore + ?Sized>(
        &self,
        store: &St,
        filter: &Filter,
    ) -> Result<Option<(S, Vec<T>)>> {
        let Some((parent, related)) = store.find_with_related(S::ENTITY, filter, self.name).await?
        else {
            return Ok(None);
        };
        let related = related
            .into_iter()
            .map(T::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((S::from_row(parent)?, related)))
    }
}
