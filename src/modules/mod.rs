pub mod auth;
pub mod books;
pub mod trades;
pub mod users;

use bookswap_kernel::ModuleRegistry;

use crate::state::AppState;

/// Register every application module with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) {
    registry.register_core(users::create_module(state.clone()));
    registry.register_core(auth::create_module(state.clone()));
    registry.register_custom(books::create_module(state.clone()));
    registry.register_custom(trades::create_module(state.clone()));
}
