use crate::entities::user_entity as users;
use crate::error::AppResult;
use crate::utils::{generate_numeric_suffix, username_stem};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// Unique username derived from an email address, e.g. `budi.santoso042`.
pub async fn generate_unique_username<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<String> {
    let stem = username_stem(email);

    loop {
        let candidate = format!("{}{}", stem, generate_numeric_suffix());

        let exists = users::Entity::find()
            .filter(users::Column::Username.eq(candidate.as_str()))
            .count(db)
            .await?;

        if exists == 0 {
            return Ok(candidate);
        }
    }
}
