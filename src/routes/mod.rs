mod admin;
mod arithmetic;
pub mod auth;
mod calculations;
mod health_check;
pub mod profile;

pub use admin::{
    list_all_tokens, list_tokens_for_user, list_users, list_users_with_token_counts,
    revoke_all_tokens_for_user, revoke_token_by_string, set_user_role,
};
pub use arithmetic::{add, divide, multiply, subtract};
pub use auth::{login, logout, refresh, register};
pub use calculations::{
    create_calculation, delete_calculation, list_calculations, patch_calculation,
    read_calculation, update_calculation,
};
pub use health_check::health_check;
pub use profile::{
    change_password, get_current_user, list_my_tokens, revoke_my_token,
    revoke_my_token_by_string, update_profile,
};
