pub mod app_config;
pub mod checkout_file;
pub mod checkout_store;
pub mod http_backend;
pub mod session_file;

pub use checkout_file::FileCheckoutPersistence;
pub use checkout_store::CheckoutStore;
pub use http_backend::HttpBackend;
pub use session_file::FileSessionStore;
