pub mod core;
pub mod models;
pub mod platform;

use crate::core::asset_store::SqliteAssetStore;
use crate::core::comparison::Side;
use crate::core::config::Config;
use crate::core::database::Database;
use crate::core::geometry::JOINT_ANGLES;
use crate::core::liveness::SessionStats;
use crate::core::pose_estimator::PoseEstimatorAdapter;
use crate::core::session::{SessionOrchestrator, SessionSettings, SessionView, UploadBatch};
use crate::models::asset::AssetSummary;
use crate::models::pose::{AngleMode, JointAngleSpec};
use crate::platform::pose::{BridgeEstimator, DefaultMediaPipe};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides `default_filter`.
/// Calling again is a no-op.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// Application state
pub struct AppState {
    pub config: Mutex<Config>,
    pub session: Arc<SessionOrchestrator>,
}

impl AppState {
    /// Open the database and wire the session to the configured estimator and camera
    pub async fn init(config: Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        config
            .validate()
            .map_err(|e| format!("Invalid configuration: {}", e))?;
        let db = Database::init(&config.database_path()).await?;
        let store = Arc::new(SqliteAssetStore::new(Arc::new(db)));

        let estimator = Arc::new(BridgeEstimator::<DefaultMediaPipe>::new(
            &config.estimator_config(),
        ));
        let adapter = Arc::new(PoseEstimatorAdapter::new(
            estimator,
            config.estimator_config(),
        ));
        let capture = crate::platform::capture::default_capture(&config);

        let session = SessionOrchestrator::new(
            adapter,
            store,
            capture,
            SessionSettings::from_config(&config),
        );
        tracing::info!(data_dir = %config.data_dir.display(), "Application state initialized");

        Ok(Self {
            config: Mutex::new(config),
            session: Arc::new(session),
        })
    }
}

// Configuration commands
pub fn get_config(state: &AppState) -> Result<Config, String> {
    let config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;
    Ok(config.clone())
}

/// Validate and persist a new configuration. Session settings take effect on next start.
pub fn update_config(new_config: Config, state: &AppState) -> Result<(), String> {
    new_config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    new_config
        .save()
        .map_err(|e| format!("Failed to save configuration: {}", e))?;

    let mut config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;
    *config = new_config;

    Ok(())
}

pub fn reset_config(state: &AppState) -> Result<Config, String> {
    let default_config =
        Config::reset().map_err(|e| format!("Failed to reset configuration: {}", e))?;

    let mut config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;
    *config = default_config.clone();

    Ok(default_config)
}

// Mode commands
pub async fn start_live(state: &AppState) -> Result<SessionView, String> {
    state.session.enter_live().await;
    Ok(state.session.view().await)
}

pub async fn stop_live(state: &AppState) -> Result<(), String> {
    state
        .session
        .stop_live()
        .await
        .map_err(|e| format!("Failed to stop camera: {}", e))
}

pub async fn open_gallery(state: &AppState) -> Result<SessionView, String> {
    state.session.enter_browsing().await;
    Ok(state.session.view().await)
}

pub async fn open_comparison(state: &AppState) -> Result<SessionView, String> {
    state.session.enter_comparing().await;
    Ok(state.session.view().await)
}

pub async fn get_session_view(state: &AppState) -> Result<SessionView, String> {
    Ok(state.session.view().await)
}

pub fn get_session_stats(state: &AppState) -> Result<SessionStats, String> {
    Ok(state.session.stats())
}

// Gallery commands
pub async fn select_asset(asset_id: String, state: &AppState) -> Result<(), String> {
    state
        .session
        .select_asset(&asset_id)
        .await
        .map(|_| ())
        .map_err(|e| format!("Failed to select asset: {}", e))
}

pub async fn analyze_upload(bytes: Vec<u8>, name: String, state: &AppState) -> Result<(), String> {
    state
        .session
        .analyze_upload(bytes, &name)
        .await
        .map(|_| ())
        .map_err(|e| format!("Failed to analyze image: {}", e))
}

pub async fn add_asset(
    bytes: Vec<u8>,
    name: String,
    state: &AppState,
) -> Result<AssetSummary, String> {
    state
        .session
        .add_asset(bytes, &name)
        .await
        .map_err(|e| format!("Failed to add asset: {}", e))
}

/// Save several `(bytes, name)` files; non-images are skipped and counted
pub async fn add_assets(
    files: Vec<(Vec<u8>, String)>,
    state: &AppState,
) -> Result<UploadBatch, String> {
    state
        .session
        .add_assets(files)
        .await
        .map_err(|e| format!("Failed to upload assets: {}", e))
}

pub async fn delete_asset(asset_id: String, state: &AppState) -> Result<(), String> {
    state
        .session
        .delete_asset(&asset_id)
        .await
        .map_err(|e| format!("Failed to delete asset: {}", e))
}

// Comparison commands
pub async fn compare_pick(side: String, asset_id: String, state: &AppState) -> Result<(), String> {
    let side = Side::from_string(&side).map_err(|e| format!("Invalid side: {}", e))?;
    state
        .session
        .compare_pick(side, &asset_id)
        .await
        .map(|_| ())
        .map_err(|e| format!("Failed to load comparison side: {}", e))
}

pub async fn compare_upload(
    side: String,
    bytes: Vec<u8>,
    name: String,
    state: &AppState,
) -> Result<(), String> {
    let side = Side::from_string(&side).map_err(|e| format!("Invalid side: {}", e))?;
    state
        .session
        .compare_upload(side, bytes, &name)
        .await
        .map(|_| ())
        .map_err(|e| format!("Failed to load comparison side: {}", e))
}

// Angle commands
pub async fn set_angle_mode(mode: String, state: &AppState) -> Result<(), String> {
    let mode = AngleMode::from_string(&mode).map_err(|e| format!("Invalid angle mode: {}", e))?;
    state.session.set_angle_mode(mode).await;
    Ok(())
}

pub fn get_angle_catalog() -> Vec<JointAngleSpec> {
    JOINT_ANGLES.to_vec()
}

// Snapshot commands
pub async fn save_snapshot(state: &AppState) -> Result<String, String> {
    state
        .session
        .save_snapshot()
        .await
        .map(|path| path.display().to_string())
        .map_err(|e| format!("Failed to save snapshot: {}", e))
}

pub async fn shutdown(state: &AppState) {
    state.session.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::png_bytes;
    use crate::core::session::ModeView;

    fn test_config(name: &str) -> Config {
        let data_dir = std::env::temp_dir().join(format!("posekit_test_app_{}", name));
        let _ = std::fs::remove_dir_all(&data_dir);
        Config {
            snapshot_dir: data_dir.join("snapshots"),
            data_dir,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_app_state_end_to_end() {
        let config = test_config("e2e");
        let data_dir = config.data_dir.clone();
        let state = AppState::init(config).await.expect("Failed to init app state");

        // No camera configured: live start reports the error and stays usable
        match start_live(&state).await.unwrap().mode {
            ModeView::Live { error, .. } => assert!(error.is_some()),
            other => panic!("unexpected mode {:?}", other),
        }

        open_gallery(&state).await.unwrap();
        let added = add_asset(png_bytes(8, 8), "pose.png".to_string(), &state)
            .await
            .unwrap();
        select_asset(added.id.clone(), &state).await.unwrap();

        let batch = add_assets(
            vec![
                (png_bytes(4, 4), "side.png".to_string()),
                (b"readme".to_vec(), "readme.md".to_string()),
            ],
            &state,
        )
        .await
        .unwrap();
        assert_eq!((batch.added.len(), batch.skipped), (1, 1));

        // Default backend has no model, so a notice is shown
        let view = get_session_view(&state).await.unwrap();
        assert!(view.notice.is_some());

        assert!(set_angle_mode("3d".to_string(), &state).await.is_ok());
        assert!(set_angle_mode("4d".to_string(), &state).await.is_err());
        assert!(compare_pick("c".to_string(), added.id.clone(), &state).await.is_err());

        delete_asset(added.id, &state).await.unwrap();
        shutdown(&state).await;

        let _ = std::fs::remove_dir_all(&data_dir);
    }

    #[tokio::test]
    async fn test_app_state_rejects_invalid_config() {
        let config = Config {
            replay_fps: 0,
            ..test_config("invalid")
        };
        let data_dir = config.data_dir.clone();

        let err = AppState::init(config).await.err().expect("init should fail");
        assert!(err.to_string().contains("replay FPS"));
        assert!(!data_dir.join("posekit.db").exists());
    }

    #[test]
    fn test_angle_catalog() {
        let catalog = get_angle_catalog();
        assert_eq!(catalog.len(), 10);
        assert!(catalog.iter().all(|spec| !spec.description.is_empty()));
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        init_logging("info");
    }
}
