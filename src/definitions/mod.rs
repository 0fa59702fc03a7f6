pub mod error_code;
pub mod helpers;
pub mod identity;

pub use error_code::ErrorCode;
pub use identity::{
    Address, DocumentType, Gender, Identity, SpecialOrganisation, SpecialStatus, ValidityPeriod,
};
