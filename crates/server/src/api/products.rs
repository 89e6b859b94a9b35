//! Product and variation mapping API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use crmsync_core::{CatalogError, EntityType, MappingNamespace, ProductMapping};
use tracing::info;

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct MappingErrorResponse {
    pub error: String,
}

type MappingError = (StatusCode, Json<MappingErrorResponse>);

fn storage_error(e: CatalogError) -> MappingError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MappingErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn not_found(namespace: MappingNamespace, id: u64) -> MappingError {
    (
        StatusCode::NOT_FOUND,
        Json(MappingErrorResponse {
            error: format!("No mapping stored for {} {}", namespace.as_str(), id),
        }),
    )
}

/// Reject mappings whose entity type lacks the ids it needs.
fn validate_mapping(mapping: &ProductMapping) -> Result<(), MappingError> {
    let problem = match mapping.entity_type {
        EntityType::Membership if mapping.membership_type_id.is_none() => {
            Some("membership mapping requires membership_type_id")
        }
        EntityType::Participant
            if mapping.event_id.is_none() || mapping.participant_role_id.is_none() =>
        {
            Some("participant mapping requires event_id and participant_role_id")
        }
        _ if mapping.financial_type_id == Some(0) => Some("financial_type_id must not be 0"),
        _ => None,
    };

    match problem {
        Some(reason) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(MappingErrorResponse {
                error: reason.to_string(),
            }),
        )),
        None => Ok(()),
    }
}

fn get(
    state: &AppState,
    namespace: MappingNamespace,
    id: u64,
) -> Result<Json<ProductMapping>, MappingError> {
    state
        .catalog()
        .mapping(namespace, id)
        .map_err(storage_error)?
        .map(Json)
        .ok_or_else(|| not_found(namespace, id))
}

fn put(
    state: &AppState,
    namespace: MappingNamespace,
    id: u64,
    mapping: ProductMapping,
) -> Result<Json<ProductMapping>, MappingError> {
    validate_mapping(&mapping)?;
    state
        .catalog()
        .upsert(namespace, id, &mapping)
        .map_err(storage_error)?;
    info!(
        namespace = namespace.as_str(),
        id,
        entity_type = mapping.entity_type.as_str(),
        "Mapping stored"
    );
    Ok(Json(mapping))
}

fn delete(state: &AppState, namespace: MappingNamespace, id: u64) -> Result<StatusCode, MappingError> {
    if state
        .catalog()
        .remove(namespace, id)
        .map_err(storage_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(namespace, id))
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_product_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ProductMapping>, MappingError> {
    get(&state, MappingNamespace::Product, id)
}

pub async fn put_product_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(mapping): Json<ProductMapping>,
) -> Result<Json<ProductMapping>, MappingError> {
    put(&state, MappingNamespace::Product, id, mapping)
}

pub async fn delete_product_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, MappingError> {
    delete(&state, MappingNamespace::Product, id)
}

pub async fn get_variation_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ProductMapping>, MappingError> {
    get(&state, MappingNamespace::Variation, id)
}

pub async fn put_variation_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(mapping): Json<ProductMapping>,
) -> Result<Json<ProductMapping>, MappingError> {
    put(&state, MappingNamespace::Variation, id, mapping)
}

pub async fn delete_variation_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, MappingError> {
    delete(&state, MappingNamespace::Variation, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_mapping() {
        assert!(validate_mapping(&ProductMapping::contribution(5, 3)).is_ok());
        assert!(validate_mapping(&ProductMapping::excluded()).is_ok());
        assert!(validate_mapping(&ProductMapping::membership(2, 8, 7)).is_ok());

        let incomplete = ProductMapping {
            entity_type: EntityType::Participant,
            event_id: Some(4),
            ..Default::default()
        };
        let (status, _) = validate_mapping(&incomplete).unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let zero = ProductMapping {
            financial_type_id: Some(0),
            ..ProductMapping::contribution(5, 3)
        };
        assert!(validate_mapping(&zero).is_err());
    }
}
