use async_trait::async_trait;
use entity::employees::{self, Entity as Employees};
use platform_db::DbPool;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, TryIntoModel,
};

/// Persistence contract required by [`crate::EmployeeService`].
///
/// The service receives an implementation through its constructor; nothing
/// in the domain layer touches the database directly.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Persist a new or modified record. Inserts when the id is unset and
    /// returns the row with its assigned id; updates otherwise.
    async fn save(&self, record: employees::ActiveModel) -> Result<employees::Model, DbErr>;

    /// All records, order unspecified.
    async fn find_all(&self) -> Result<Vec<employees::Model>, DbErr>;

    async fn find_by_id(&self, id: i64) -> Result<Option<employees::Model>, DbErr>;

    /// Exact match on the stored (trimmed) name.
    async fn exists_by_name(&self, name: &str) -> Result<bool, DbErr>;

    async fn exists_by_id(&self, id: i64) -> Result<bool, DbErr>;

    async fn delete_by_id(&self, id: i64) -> Result<(), DbErr>;
}

/// sea-orm implementation of [`EmployeeStore`] over a shared pool.
pub struct SeaOrmStore {
    pool: DbPool,
}

impl SeaOrmStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeStore for SeaOrmStore {
    async fn save(&self, record: employees::ActiveModel) -> Result<employees::Model, DbErr> {
        record.save(&self.pool).await?.try_into_model()
    }

    async fn find_all(&self) -> Result<Vec<employees::Model>, DbErr> {
        Employees::find().all(&self.pool).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<employees::Model>, DbErr> {
        Employees::find_by_id(id).one(&self.pool).await
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool, DbErr> {
        Employees::find()
            .filter(employees::Column::Name.eq(name))
            .count(&self.pool)
            .await
            .map(|count| count > 0)
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool, DbErr> {
        Employees::find_by_id(id)
            .count(&self.pool)
            .await
            .map(|count| count > 0)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), DbErr> {
        Employees::delete_by_id(id).exec(&self.pool).await.map(|_| ())
    }
}
