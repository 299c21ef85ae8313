pub mod classify;
pub mod client;
pub mod driver;
pub mod error;
pub mod extract;
pub mod interstitial;
pub mod paging;
pub mod reconcile;
pub mod scan;
pub mod search;
pub mod select;
pub mod sink;
pub mod source;
pub mod template;
pub mod types;

pub use classify::Classifier;
pub use client::{extract_origin, ReplayClient};
pub use driver::{DriverConfig, ListingDriver, QueryOutcome, StopReason, Strategy};
pub use error::ScraperError;
pub use search::search_url;
pub use sink::DedupSink;
pub use source::{
    CancelFlag, HtmlPageSource, ListingSink, RenderingSource, RequestExecutor, SnapshotSource,
};
pub use template::{ApiTemplate, CapturedTemplate, TemplateSlot};
pub use types::{
    CandidateCollection, InterceptedResponse, PageSnapshot, ReplayResponse, RequestDescriptor,
};
