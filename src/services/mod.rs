pub mod api;
pub mod auth;
pub mod resolver;
pub mod vendor;

pub use api::RequestGateway;
pub use auth::{AuthHeaderProvider, Credentials};
pub use resolver::{DataOrigin, FallbackChain, FallbackSource, Resolved, Selector};
pub use vendor::VendorDataService;
