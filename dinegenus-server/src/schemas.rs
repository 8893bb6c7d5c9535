use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use dinegenus_collab::{Coordinates, Location, RoomMetadata};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::{ServerError, ServerResult};

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(nested)]
    pub location: LocationSchema,
    /// The owner's display name in the room
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationSchema {
    #[validate(length(min = 1, max = 256))]
    pub address: String,
    #[validate(length(max = 128))]
    pub name: Option<String>,
    pub coordinates: CoordinatesSchema,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatesSchema {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRoomSchema {
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    #[validate(length(min = 1, max = 64))]
    pub participant_key: String,
    /// Opaque to the server
    #[schema(value_type = Object)]
    pub vote_data: Value,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VotingStatusSchema {
    /// One of `waiting`, `active` or `completed`
    #[validate(length(min = 1, max = 16))]
    pub status: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Where the previous page ended
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

impl NewRoomSchema {
    pub fn into_metadata(self) -> ServerResult<RoomMetadata> {
        let LocationSchema {
            address,
            name,
            coordinates,
        } = self.location;

        if !(-90.0..=90.0).contains(&coordinates.lat) || !(-180.0..=180.0).contains(&coordinates.lng)
        {
            return Err(ServerError::Invalid(format!(
                "({}, {}) are not valid coordinates",
                coordinates.lat, coordinates.lng
            )));
        }

        Ok(RoomMetadata {
            location: Location {
                address,
                name,
                coordinates: Coordinates {
                    lat: coordinates.lat,
                    lng: coordinates.lng,
                },
            },
            name: self.name,
            display_name: self.display_name,
        })
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_room_validation() {
        let valid: NewRoomSchema = serde_json::from_value(json!({
            "name": "Lunch",
            "displayName": "Ada",
            "location": {
                "address": "1 Main St",
                "coordinates": { "lat": 25.0, "lng": 121.5 }
            }
        }))
        .unwrap();

        assert!(valid.validate().is_ok());

        let metadata = valid.into_metadata().unwrap();
        assert_eq!(metadata.location.coordinates.lng, 121.5);
        assert_eq!(metadata.location.name, None);

        let out_of_range: NewRoomSchema = serde_json::from_value(json!({
            "name": "Lunch",
            "displayName": "Ada",
            "location": {
                "address": "1 Main St",
                "coordinates": { "lat": 125.0, "lng": 0.0 }
            }
        }))
        .unwrap();

        assert!(out_of_range.validate().is_ok());
        assert!(matches!(
            out_of_range.into_metadata(),
            Err(ServerError::Invalid(_))
        ));

        let nameless: NewRoomSchema = serde_json::from_value(json!({
            "name": "",
            "displayName": "Ada",
            "location": {
                "address": "1 Main St",
                "coordinates": { "lat": 0.0, "lng": 0.0 }
            }
        }))
        .unwrap();

        assert!(nameless.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = serde_json::from_value::<JoinRoomSchema>(json!({
            "displayName": "Ada",
            "isOwner": true
        }));

        assert!(result.is_err());
    }
}
