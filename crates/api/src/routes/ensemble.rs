//! Ensemble metadata route

use axum::{extract::State, Json};
use ensemble::EnsembleInfo;

use crate::SharedState;

/// Models, datasets and weights of the served ensemble
pub async fn get_info(State(state): State<SharedState>) -> Json<EnsembleInfo> {
    Json(state.engine.info())
}
