use serde::{Deserialize, Serialize};
use tunemate_core::Profile;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpsertProfileRequest {
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(url)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: String,
    pub display_name: String,
    pub profile_image: Option<String>,
}

impl UpsertProfileRequest {
    pub fn into_profile(self, user_id: String) -> Profile {
        Profile {
            user_id,
            display_name: self.display_name,
            profile_image: self.profile_image,
        }
    }
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            display_name: p.display_name,
            profile_image: p.profile_image,
        }
    }
}
