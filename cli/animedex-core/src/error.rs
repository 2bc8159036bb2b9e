use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("page {page} does not exist, pick a page between 1 and {last_page}")]
    PageOutOfRange { page: u32, last_page: u32 },
}
