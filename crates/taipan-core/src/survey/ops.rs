//! Survey operations.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use jiff::Timestamp;
use log::{info, warn};
use tokio::{
    sync::Semaphore,
    task::{self, JoinError, JoinSet},
};

use super::Survey;
use crate::{
    assemble::{self, AssembledTile},
    db::Database,
    error::{Result, TaipanError},
    ingest,
    models::{
        Field, IngestReport, NewTile, PositionReport, ReconcileReport, SurveySummary, Tile,
        VersionRecord,
    },
    positions,
    query::Expr,
    reconcile::{self, ReconcileOptions},
};

fn join_error(e: JoinError) -> TaipanError {
    TaipanError::Configuration {
        message: format!("Task join error: {e}"),
    }
}

/// Records one finished chunk; only the first failure is kept.
fn collect<R>(
    joined: std::result::Result<Result<R>, JoinError>,
    results: &mut Vec<R>,
    failure: &mut Option<TaipanError>,
) {
    match joined.map_err(join_error).and_then(|r| r) {
        Ok(result) => results.push(result),
        Err(e) => {
            warn!("Chunk failed: {e}");
            if failure.is_none() {
                *failure = Some(e);
            }
        }
    }
}

impl Survey {
    /// Runs `work` on the blocking pool against a fresh connection.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let config = self.config.clone();

        task::spawn_blocking(move || {
            let db = Database::open_with(&db_path, &config)?;
            work(&db)
        })
        .await
        .map_err(join_error)?
    }

    /// Runs `work` over `chunk_size` slices of `field_ids`, at most
    /// `workers` at a time, each on its own connection.
    ///
    /// After the first failure no further chunk is started; chunks already
    /// running are awaited and the failure is returned.
    async fn dispatch_chunks<R, F>(
        &self,
        field_ids: &[i64],
        chunk_size: usize,
        work: F,
    ) -> Result<Vec<R>>
    where
        R: Send + 'static,
        F: Fn(&Database, &[i64]) -> Result<R> + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut results = Vec::new();
        let mut failure = None;

        for chunk in field_ids.chunks(chunk_size.max(1)) {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| TaipanError::Configuration {
                    message: format!("Worker pool closed: {e}"),
                })?;
            while let Some(joined) = tasks.try_join_next() {
                collect(joined, &mut results, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let work = Arc::clone(&work);
            let chunk = chunk.to_vec();
            let db_path = self.db_path.clone();
            let config = self.config.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let db = Database::open_with(&db_path, &config)?;
                work(&db, &chunk)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            collect(joined, &mut results, &mut failure);
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }

    /// Applies pending migrations and returns the versions recorded.
    pub async fn migrate(&self) -> Result<Vec<VersionRecord>> {
        self.run_blocking(|db| db.migrate()).await
    }

    /// Applied schema versions, oldest first.
    pub async fn versions(&self) -> Result<Vec<VersionRecord>> {
        self.run_blocking(|db| db.applied_versions()).await
    }

    pub async fn current_version(&self) -> Result<Option<String>> {
        self.run_blocking(|db| db.current_version()).await
    }

    pub async fn summary(&self) -> Result<SurveySummary> {
        self.run_blocking(|db| db.survey_summary()).await
    }

    /// Loads a catalogue file in one of the registered formats.
    pub async fn ingest<P: AsRef<Path>>(&self, format: &str, path: P) -> Result<IngestReport> {
        let format = format.to_string();
        let path = PathBuf::from(path.as_ref());
        self.run_blocking(move |db| ingest::load_catalogue(db, &format, &path))
            .await
    }

    pub async fn fields(&self, filter: Option<Expr>) -> Result<Vec<Field>> {
        self.run_blocking(move |db| db.read_fields(filter)).await
    }

    /// Activates or deactivates fields, returning the rows changed.
    pub async fn set_fields_active(&self, field_ids: &[i64], active: bool) -> Result<usize> {
        let field_ids = field_ids.to_vec();
        self.run_blocking(move |db| db.set_fields_active(&field_ids, active))
            .await
    }

    /// Computes field membership for the given fields, or every active field.
    pub async fn compute_positions(&self, field_ids: Option<&[i64]>) -> Result<PositionReport> {
        let requested = field_ids.map(<[i64]>::to_vec);
        let field_ids = self
            .run_blocking(move |db| match requested {
                Some(ids) => Ok(ids),
                None => Ok(db.read_active_fields()?.iter().map(|f| f.field_id).collect()),
            })
            .await?;

        let geometry = Arc::clone(&self.geometry);
        let chunks = self
            .dispatch_chunks(&field_ids, self.config.chunk_size, move |db, chunk| {
                positions::position_fields(db, geometry.as_ref(), chunk)
            })
            .await?;

        let mut report = PositionReport::default();
        for chunk in &chunks {
            report.merge(chunk);
        }
        info!(
            "Membership pass over {} fields inserted {} rows",
            report.fields, report.rows_inserted
        );
        Ok(report)
    }

    /// Recomputes membership of targets whose positions changed.
    pub async fn refresh_positions(&self, target_ids: &[i64]) -> Result<PositionReport> {
        let target_ids = target_ids.to_vec();
        let geometry = Arc::clone(&self.geometry);
        self.run_blocking(move |db| {
            positions::refresh_target_positions(db, geometry.as_ref(), &target_ids)
        })
        .await
    }

    /// Recomputes the `tiling_info` counters of the given fields, or of every
    /// field, with chunks spread over the worker pool.
    pub async fn reconcile(
        &self,
        field_ids: Option<&[i64]>,
        options: ReconcileOptions,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            requested: field_ids.map(<[i64]>::to_vec).unwrap_or_default(),
            ..ReconcileReport::default()
        };
        let requested = field_ids.map(<[i64]>::to_vec);
        let geometry = Arc::clone(&self.geometry);
        let planned = self
            .run_blocking(move |db| {
                reconcile::plan_fields(db, geometry.as_ref(), requested.as_deref(), &options)
            })
            .await?;

        let Some(resolved) = planned else {
            report.skipped = true;
            return Ok(report);
        };
        report.resolved = resolved.len();

        let unobserved_only = options.unobserved_only;
        let chunks = self
            .dispatch_chunks(&resolved, options.chunk_size, move |db, chunk| {
                reconcile::reconcile_chunk(db, chunk, unobserved_only)
            })
            .await?;
        for chunk in &chunks {
            report.merge(chunk);
        }
        info!(
            "Reconciled {} fields in {} chunks, {} rows updated",
            report.resolved, report.chunks, report.rows_updated
        );
        Ok(report)
    }

    /// Tiles matching `filter` with their fibre maps resolved.
    pub async fn assemble_tiles(&self, filter: Option<Expr>) -> Result<Vec<AssembledTile>> {
        self.run_blocking(move |db| assemble::assemble_tiles(db, filter))
            .await
    }

    /// Stores newly configured tiles with their fibre assignments.
    pub async fn insert_tiles(&self, tiles: Vec<NewTile>) -> Result<Vec<Tile>> {
        self.run_blocking(move |db| db.insert_tiles(&tiles)).await
    }

    pub async fn queue_tiles(&self, tile_pks: &[i64]) -> Result<usize> {
        let tile_pks = tile_pks.to_vec();
        self.run_blocking(move |db| db.queue_tiles(&tile_pks)).await
    }

    /// Marks tiles observed at `date_obs` and takes them off the queue.
    pub async fn observe_tiles(&self, tile_pks: &[i64], date_obs: Timestamp) -> Result<usize> {
        let tile_pks = tile_pks.to_vec();
        self.run_blocking(move |db| db.observe_tiles(&tile_pks, date_obs))
            .await
    }

    /// Records a completed visit of science targets. See
    /// [`Database::make_science_repeat_inc`].
    pub async fn complete_science_visits(
        &self,
        target_ids: &[i64],
        set_done: bool,
        success: bool,
    ) -> Result<usize> {
        let target_ids = target_ids.to_vec();
        self.run_blocking(move |db| db.make_science_repeat_inc(&target_ids, set_done, success))
            .await
    }
}
