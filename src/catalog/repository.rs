//! Persistence of catalog records.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::query::{Page, PageRequest, SearchCriteria};
use super::record::{ImageryRecord, NewImageryRecord};
use crate::db::entities::{imagery, Imagery};

/// Catalog of converted artifacts. Append-only: there is no update or delete.
#[async_trait]
pub trait ImageryRepository: Send + Sync {
    /// Persist a record; identity and `created_at` are assigned here.
    async fn save(&self, record: NewImageryRecord) -> Result<ImageryRecord, DbErr>;

    /// Highest sequence recorded for a base name, if any.
    async fn max_sequence(&self, base_name: &str) -> Result<Option<i32>, DbErr>;

    /// Filtered, sorted page plus the total size of the filtered set.
    async fn search(&self, criteria: &SearchCriteria, request: &PageRequest) -> Result<Page<ImageryRecord>, DbErr>;
}

pub struct SqlImageryRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlImageryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl ImageryRepository for SqlImageryRepository {
    async fn save(&self, record: NewImageryRecord) -> Result<ImageryRecord, DbErr> {
        let model = imagery::ActiveModel {
            id: NotSet,
            original_name: Set(record.original_name),
            base_name: Set(record.base_name),
            cog_name: Set(record.cog_name),
            width: Set(record.width),
            height: Set(record.height),
            band_count: Set(record.band_count),
            projection: Set(record.projection),
            storage_path: Set(record.storage_path),
            sequence: Set(record.sequence),
            file_size: Set(record.file_size),
            created_at: Set(unix_now()),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::debug!("Catalog record {} saved for {}", model.id, model.cog_name);
        Ok(model.into())
    }

    async fn max_sequence(&self, base_name: &str) -> Result<Option<i32>, DbErr> {
        let max: Option<Option<i32>> = Imagery::find()
            .select_only()
            .column_as(Expr::col(imagery::Column::Sequence).max(), "max_sequence")
            .filter(imagery::Column::BaseName.eq(base_name))
            .into_tuple()
            .one(self.db.as_ref())
            .await?;
        Ok(max.flatten())
    }

    async fn search(&self, criteria: &SearchCriteria, request: &PageRequest) -> Result<Page<ImageryRecord>, DbErr> {
        let condition = criteria.condition();

        let total = Imagery::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await?;

        let mut query = Imagery::find().filter(condition);
        for (key, direction) in request.sort.resolved() {
            query = query.order_by(key.column(), direction.order());
        }

        let models = query
            .offset(request.offset())
            .limit(request.size)
            .all(self.db.as_ref())
            .await?;

        let content = models.into_iter().map(ImageryRecord::from).collect();
        Ok(Page::new(content, total, request))
    }
}
