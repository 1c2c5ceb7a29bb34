pub mod bill;
pub mod loaders;
pub mod response;
pub mod result;

pub use bill::{BillInfo, LineItem, ProcessingStatus};
pub use loaders::{load_all_images, load_image, media_type_for_path};
pub use response::{generate_request_id, BatchResponse, BillResponse};
pub use result::{BatchErrorEntry, BatchResult, BillResult};
