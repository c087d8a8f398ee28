//! Cell encodings for the two tables. MessagePack records with a leading
//! format byte so later layouts can coexist with old rows.

use crate::error::EngineError;
use crate::model::value::validate_fields;
use crate::model::{Entity, FieldMap, Id, MvccEntity, MvccLogEntry, Stage, Status};
use crate::version::Version;
use serde::{Deserialize, Serialize};

const FORMAT_V1: u8 = 1;

#[derive(Serialize, Deserialize)]
struct EntityRecord {
    format: u8,
    status: Status,
    cleared: bool,
    payload: Option<FieldMap>,
}

#[derive(Serialize, Deserialize)]
struct StageRecord {
    format: u8,
    stage: Stage,
}

pub fn encode_entity(entity: &MvccEntity) -> Result<Vec<u8>, EngineError> {
    let record = EntityRecord {
        format: FORMAT_V1,
        status: entity.status(),
        cleared: entity.is_cleared(),
        payload: entity.payload().map(|p| p.fields().clone()),
    };
    rmp_serde::to_vec(&record).map_err(|e| EngineError::Encode(e.to_string()))
}

pub fn decode_entity(id: &Id, version: Version, bytes: &[u8]) -> Result<MvccEntity, EngineError> {
    let entity = decode_entity_unchecked(id, version, bytes)?;
    check_payload(&entity)?;
    Ok(entity)
}

/// Decodes the record layout only. Payload values are not validated; call
/// [`check_payload`] before handing the row to a reader.
pub(crate) fn decode_entity_unchecked(
    id: &Id,
    version: Version,
    bytes: &[u8],
) -> Result<MvccEntity, EngineError> {
    let record: EntityRecord =
        rmp_serde::from_slice(bytes).map_err(|e| EngineError::Decode(e.to_string()))?;
    if record.format != FORMAT_V1 {
        return Err(EngineError::Decode(format!(
            "unsupported entity record format {}",
            record.format
        )));
    }
    if record.cleared {
        return Ok(MvccEntity::cleared(id.clone(), version, record.status));
    }
    let payload = record
        .payload
        .map(|fields| Entity::from_fields(id.clone(), fields));
    Ok(MvccEntity::new(id.clone(), version, record.status, payload))
}

pub(crate) fn check_payload(entity: &MvccEntity) -> Result<(), EngineError> {
    match entity.payload() {
        Some(payload) => validate_fields(payload.fields()).map_err(|e| {
            EngineError::MalformedPayload(format!("version {}: {e}", entity.version()))
        }),
        None => Ok(()),
    }
}

pub fn encode_stage(entry: &MvccLogEntry) -> Result<Vec<u8>, EngineError> {
    let record = StageRecord {
        format: FORMAT_V1,
        stage: entry.stage(),
    };
    rmp_serde::to_vec(&record).map_err(|e| EngineError::Encode(e.to_string()))
}

pub fn decode_stage(id: &Id, version: Version, bytes: &[u8]) -> Result<MvccLogEntry, EngineError> {
    let record: StageRecord =
        rmp_serde::from_slice(bytes).map_err(|e| EngineError::Decode(e.to_string()))?;
    if record.format != FORMAT_V1 {
        return Err(EngineError::Decode(format!(
            "unsupported stage record format {}",
            record.format
        )));
    }
    Ok(MvccLogEntry::new(id.clone(), version, record.stage))
}

/// Encoded size of a payload, as checked against `max_entity_size`.
pub fn payload_size(fields: &FieldMap) -> Result<usize, EngineError> {
    rmp_serde::to_vec(fields)
        .map(|bytes| bytes.len())
        .map_err(|e| EngineError::Encode(e.to_string()))
}
