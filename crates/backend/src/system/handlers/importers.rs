use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use contracts::system::importers::response::{
    ImporterDetailResponse, ImporterListResponse, RunProgressListResponse, StartRunResponse,
};
use contracts::system::importers::{RunKind, RunProgress};

use crate::system::importers::{ImportError, ImportSystem};

/// Статус ответа для ошибки импорта
fn status_for(error: &ImportError) -> StatusCode {
    match error {
        ImportError::ImporterNotFound(_) => StatusCode::NOT_FOUND,
        ImportError::AlreadyRunning(_) => StatusCode::CONFLICT,
        ImportError::Hook { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(context: &str, error: ImportError) -> StatusCode {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("{}: {}", context, error);
    } else {
        tracing::warn!("{}: {}", context, error);
    }
    status
}

/// GET /api/importers
pub async fn list_importers(
    State(system): State<ImportSystem>,
) -> Result<Json<ImporterListResponse>, StatusCode> {
    let importers = system
        .list_overviews()
        .await
        .map_err(|e| reject("Failed to list importers", e))?;
    Ok(Json(ImporterListResponse { importers }))
}

/// GET /api/importers/:id
pub async fn get_importer(
    State(system): State<ImportSystem>,
    Path(id): Path<String>,
) -> Result<Json<ImporterDetailResponse>, StatusCode> {
    system
        .detail(&id)
        .await
        .map(Json)
        .map_err(|e| reject(&format!("Failed to get importer {}", id), e))
}

/// POST /api/importers/:id/import
pub async fn start_import(
    State(system): State<ImportSystem>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<StartRunResponse>), StatusCode> {
    start(system, id, RunKind::Import).await
}

/// POST /api/importers/:id/remove
pub async fn start_removal(
    State(system): State<ImportSystem>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<StartRunResponse>), StatusCode> {
    start(system, id, RunKind::Remove).await
}

async fn start(
    system: ImportSystem,
    id: String,
    kind: RunKind,
) -> Result<(StatusCode, Json<StartRunResponse>), StatusCode> {
    let session_id = system
        .driver
        .spawn(&id, kind)
        .await
        .map_err(|e| reject(&format!("Failed to start {} run of {}", kind.as_str(), id), e))?;

    tracing::info!("Started {} run {} of importer {}", kind.as_str(), session_id, id);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            session_id,
            importer_id: id,
            kind,
            message: format!("{} run started", kind.as_str()),
        }),
    ))
}

/// GET /api/importers/runs
pub async fn list_runs(State(system): State<ImportSystem>) -> Json<RunProgressListResponse> {
    Json(RunProgressListResponse {
        sessions: system.tracker().list(),
    })
}

/// GET /api/importers/runs/:session_id
pub async fn get_run(
    State(system): State<ImportSystem>,
    Path(session_id): Path<String>,
) -> Result<Json<RunProgress>, StatusCode> {
    system
        .tracker()
        .get_progress(&session_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::importers::testing::ListImporter;
    use crate::system::importers::{ImporterRegistry, MemoryKeyValueStore};
    use contracts::system::importers::RunStatus;
    use std::sync::Arc;

    fn system() -> ImportSystem {
        let mut registry = ImporterRegistry::new();
        registry.register(ListImporter::new("abc", &["a", "b", "c"]));
        let (system, _receiver) =
            ImportSystem::new(registry, Arc::new(MemoryKeyValueStore::new()), 3);
        system
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&ImportError::ImporterNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ImportError::AlreadyRunning("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ImportError::Store(anyhow::anyhow!("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_unknown_importer_is_404() {
        let system = system();
        let err = get_importer(State(system.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);

        let err = start_import(State(system), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_import_and_poll_progress() {
        let system = system();
        let (status, Json(response)) = start_import(State(system.clone()), Path("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.kind, RunKind::Import);

        let mut progress = None;
        for _ in 0..100 {
            let Json(p) = get_run(State(system.clone()), Path(response.session_id.clone()))
                .await
                .unwrap();
            if p.status == RunStatus::Completed {
                progress = Some(p);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let progress = progress.expect("run did not complete");
        assert_eq!(progress.processed, 3);

        let Json(runs) = list_runs(State(system.clone())).await;
        assert_eq!(runs.sessions.len(), 1);

        let Json(list) = list_importers(State(system)).await.unwrap();
        assert_eq!(list.importers.len(), 1);
        assert!(list.importers[0].last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_start_is_409() {
        let system = system();
        let _run = system.driver.begin("abc", RunKind::Import).await.unwrap();
        let err = start_import(State(system), Path("abc".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let err = get_run(State(system()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }
}
